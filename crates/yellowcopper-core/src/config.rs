//! Simulation configuration - serializable parameters for a world session
//!
//! Every tunable of the generator, automaton scheduler and entity physics
//! lives here. Presets are stored as RON. The seed is NOT part of the
//! config: same config + different seed = different world.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::world::{CHUNK_WIDTH, DimensionId};

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Worker threads used by the automaton phase
    pub threads: usize,
    /// How active chunks are distributed across workers
    pub schedule: ScheduleStrategy,
    /// Chunk radius around the player stepped by the automaton
    pub sim_radius: i32,
    /// Chunk radius around the player kept generated
    pub load_radius: i32,
    /// Size of the entity id space (id 0 is reserved)
    pub max_entities: u32,
    /// Dimensions created at startup
    pub dimensions: Vec<DimensionId>,
    pub physics: PhysicsParams,
    pub movement: MovementParams,
    pub terrain: TerrainParams,
    pub biomes: BiomeBands,
    pub vegetation: VegetationParams,
}

/// Work distribution for the automaton phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStrategy {
    /// Shared queue, workers skip chunks next to one already in flight
    WorkSet,
    /// Four parity classes run one after another, each fully parallel
    Checkerboard,
}

/// Entity integration and collision parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    /// Downward velocity change per tick
    pub gravity: f32,
    /// Gravity stops once vertical velocity falls to this value
    pub terminal_velocity: f32,
    /// Largest push-out applied for a single overlapping cell
    pub max_correction: f64,
    /// Overlap considered resolved
    pub overlap_epsilon: f64,
    /// Cells at or above this solidity block entities
    pub collision_solidity: i32,
}

/// Acceleration applied by the movement input glue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementParams {
    pub walk_acceleration: f32,
    pub swim_acceleration: f32,
    /// Upward acceleration of a jump started on the ground
    pub jump_acceleration: f32,
    /// Input never pushes acceleration beyond this magnitude per axis
    pub acceleration_limit: f32,
}

/// Terrain height generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Bisection depth of the midpoint displacement
    pub max_depth: u16,
    /// Spacing of hashed anchor heights in cells
    pub randomness_range: i64,
    /// Height span of the surface band in cells
    pub cell_range: i32,
    /// World y of the bottom of the surface band
    pub surface_min: i64,
    /// World y of the sea surface
    pub sea_level: i64,
    /// Base thickness of the soil layer below the surface
    pub soil_depth: i64,
    /// Hashed extra soil thickness, `0..soil_jitter`
    pub soil_jitter: i64,
}

/// Biome boundaries in chunk x coordinates, west to east
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeBands {
    /// Chunks west of this are ocean
    pub ocean_end: i32,
    /// First desert chunk
    pub desert_start: i32,
    /// First tundra chunk
    pub tundra_start: i32,
}

/// Decoration and creature spawn rates per surface column
///
/// A column spawns when its hash modulo `column_modulus` is below the rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationParams {
    pub column_modulus: u16,
    pub tree_rate: u16,
    pub shrub_rate: u16,
    pub cactus_rate: u16,
    pub creature_rate: u16,
    /// World x column that always hosts the landmark creature
    pub landmark_x: i64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            schedule: ScheduleStrategy::WorkSet,
            sim_radius: 6,
            load_radius: 8,
            max_entities: 100_000,
            dimensions: vec![DimensionId::Overworld, DimensionId::Waterworld],
            physics: PhysicsParams::default(),
            movement: MovementParams::default(),
            terrain: TerrainParams::default(),
            biomes: BiomeBands::default(),
            vegetation: VegetationParams::default(),
        }
    }
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravity: 0.43,
            terminal_velocity: -300.0,
            max_correction: 0.95,
            overlap_epsilon: 1e-3,
            collision_solidity: 200,
        }
    }
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            walk_acceleration: 0.4,
            swim_acceleration: 0.025,
            jump_acceleration: 4.5,
            acceleration_limit: 1.0,
        }
    }
}

impl Default for TerrainParams {
    fn default() -> Self {
        let width = CHUNK_WIDTH as i64;
        Self {
            max_depth: 64,
            randomness_range: width * 64,
            cell_range: 12 * CHUNK_WIDTH as i32,
            surface_min: -5 * width,
            sea_level: 0,
            soil_depth: 40,
            soil_jitter: 25,
        }
    }
}

impl Default for BiomeBands {
    fn default() -> Self {
        Self {
            ocean_end: -16,
            desert_start: 24,
            tundra_start: 48,
        }
    }
}

impl Default for VegetationParams {
    fn default() -> Self {
        Self {
            column_modulus: 1500,
            tree_rate: 15,
            shrub_rate: 60,
            cactus_rate: 10,
            creature_rate: 2,
            landmark_x: 250,
        }
    }
}

impl SimConfig {
    /// Parse a RON preset and validate it
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Load a RON preset from disk
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_ron_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    /// Check invariants the simulation relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }
        if self.sim_radius < 0 || self.load_radius < self.sim_radius {
            return Err(ConfigError::InvalidRadius {
                sim: self.sim_radius,
                load: self.load_radius,
            });
        }
        if self.max_entities < 2 {
            return Err(ConfigError::InvalidPoolSize(self.max_entities));
        }
        if self.dimensions.is_empty() {
            return Err(ConfigError::NoDimensions);
        }
        let terrain = &self.terrain;
        if terrain.randomness_range < 2 {
            return Err(ConfigError::InvalidTerrain("randomness_range must be at least 2"));
        }
        if terrain.cell_range <= 0 || terrain.cell_range > u16::MAX as i32 {
            return Err(ConfigError::InvalidTerrain("cell_range must fit in 1..=65535"));
        }
        if terrain.soil_jitter <= 0 || terrain.soil_depth < 0 {
            return Err(ConfigError::InvalidTerrain("soil depth must be non-negative with positive jitter"));
        }
        let bands = &self.biomes;
        if !(bands.ocean_end <= bands.desert_start && bands.desert_start <= bands.tundra_start) {
            return Err(ConfigError::InvalidTerrain("biome bands must be ordered west to east"));
        }
        if self.vegetation.column_modulus == 0 {
            return Err(ConfigError::InvalidTerrain("column_modulus must be non-zero"));
        }
        if self.physics.max_correction <= 0.0 {
            return Err(ConfigError::InvalidPhysics("max_correction must be positive"));
        }
        Ok(())
    }
}
