//! World management - chunks, generation, the cell automaton and entity physics

pub mod biome;
pub mod ca_update;
mod chunk;
mod coords;
mod dimension;
mod entity_physics;
pub mod generation;
mod grid;
pub mod render_view;
pub mod rng_trait;
pub mod scheduler;
pub mod stats;
pub mod terrain;
#[allow(clippy::module_inception)]
mod world;

pub use yellowcopper_simulation::{CHUNK_CELLS, CHUNK_WIDTH, Cell, cell_flags};

/// Loaded chunks of one dimension
pub type ChunkMap = ahash::HashMap<ChunkCoord, Chunk>;

pub use ca_update::{CellBehavior, CellularAutomataUpdater};
pub use chunk::Chunk;
pub use coords::{
    COORD_EPSILON, ChunkCoord, chunk_of, local_to_world, world_pos_of_chunk, world_to_local,
};
pub use dimension::{Dimension, DimensionId};
pub use entity_physics::{EntityPhysicsSystem, max_solid_overlap};
pub use generation::{GeneratedChunk, SpawnRequest, WorldGenerator};
pub use grid::CellGrid;
pub use render_view::CellWindow;
pub use rng_trait::WorldRng;
pub use scheduler::{ChunkScheduler, Claim, WorkSet};
pub use stats::{NoopStats, SimStats, TickStats};
pub use world::{DebugFlags, World};
