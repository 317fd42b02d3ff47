//! Dimensions: independent world layers with their own chunks and indices

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Cell, Chunk, ChunkCoord, ChunkMap, world_to_local};
use crate::entity::{Components, Entity, EntityId};

/// Identifies a dimension; each one has a fixed terrain style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DimensionId {
    /// Biome terrain with vegetation and creatures
    Overworld,
    /// Open water below sea level, air above
    Waterworld,
}

/// Chunk map plus the entity index sets of one dimension
#[derive(Debug)]
pub struct Dimension {
    id: DimensionId,
    chunks: ChunkMap,
    entities: BTreeSet<EntityId>,
    kinetic: BTreeSet<EntityId>,
    health: BTreeSet<EntityId>,
    ai: BTreeSet<EntityId>,
    /// Render order: ascending z depth, ties by id
    render: BTreeSet<(i8, EntityId)>,
}

impl Dimension {
    pub fn new(id: DimensionId) -> Self {
        Self {
            id,
            chunks: ChunkMap::default(),
            entities: BTreeSet::new(),
            kinetic: BTreeSet::new(),
            health: BTreeSet::new(),
            ai: BTreeSet::new(),
            render: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> DimensionId {
        self.id
    }

    pub fn chunks(&self) -> &ChunkMap {
        &self.chunks
    }

    pub(crate) fn chunks_mut(&mut self) -> &mut ChunkMap {
        &mut self.chunks
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Store a chunk under its own coordinate, replacing any previous one
    pub fn insert_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.coord(), chunk);
    }

    /// Cell at integer world coordinates, `None` if its chunk is not loaded
    pub fn cell_at_world_pos(&self, world_x: i64, world_y: i64) -> Option<Cell> {
        let (coord, x, y) = world_to_local(world_x, world_y);
        self.chunks.get(&coord).map(|chunk| chunk.get_cell(x, y))
    }

    /// Overwrite a cell; returns false if its chunk is not loaded
    pub fn set_cell_at(&mut self, world_x: i64, world_y: i64, cell: Cell) -> bool {
        let (coord, x, y) = world_to_local(world_x, world_y);
        match self.chunks.get_mut(&coord) {
            Some(chunk) => {
                chunk.set_cell(x, y, cell);
                true
            }
            None => false,
        }
    }

    /// Add `id` to the general index and every set its components require
    pub(crate) fn register_entity(&mut self, id: EntityId, entity: &Entity) {
        self.entities.insert(id);
        if entity.components.contains(Components::KINETIC) {
            self.kinetic.insert(id);
        }
        if entity.components.contains(Components::HEALTH) {
            self.health.insert(id);
        }
        if entity.components.contains(Components::AI) {
            self.ai.insert(id);
        }
        if entity.components.contains(Components::RENDER) {
            self.render.insert((entity.z_depth, id));
        }
    }

    /// Remove `id` from every index set
    pub(crate) fn unregister_entity(&mut self, id: EntityId, entity: &Entity) {
        self.entities.remove(&id);
        self.kinetic.remove(&id);
        self.health.remove(&id);
        self.ai.remove(&id);
        self.render.remove(&(entity.z_depth, id));
    }

    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.entities
    }

    pub fn kinetic(&self) -> &BTreeSet<EntityId> {
        &self.kinetic
    }

    pub fn health(&self) -> &BTreeSet<EntityId> {
        &self.health
    }

    pub fn ai(&self) -> &BTreeSet<EntityId> {
        &self.ai
    }

    /// Render-indexed entities, ascending z depth
    pub fn render_order(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.render.iter().map(|&(_, id)| id)
    }
}
