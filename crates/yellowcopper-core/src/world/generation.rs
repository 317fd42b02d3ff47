//! Chunk generation: terrain fill per dimension plus decoration spawn requests

use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use yellowcopper_simulation::MaterialTable;

use super::biome::{Biome, ColumnProfile, Palette};
use super::terrain::{TerrainSampler, cell_hash, column_hash};
use super::{CHUNK_WIDTH, Cell, Chunk, ChunkCoord, DimensionId, local_to_world};
use crate::config::{BiomeBands, SimConfig, TerrainParams, VegetationParams};
use crate::entity::Archetype;
use crate::error::WorldError;

const SOIL_SALT: u64 = 0x50_11;
const SPAWN_SALT: u64 = 0x5_9A_A7;
const FLIP_SALT: u64 = 0xF1_19;

/// Entity placement proposed by the generator
///
/// The world tries `candidates` in order and places the first one whose
/// spacing rule allows it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub candidates: SmallVec<[Archetype; 2]>,
    /// World x of the column
    pub x: f64,
    /// World y the entity stands on (top of the surface cell)
    pub ground_y: f64,
}

/// A freshly generated chunk and the entities it asks for
#[derive(Debug)]
pub struct GeneratedChunk {
    pub chunk: Chunk,
    pub spawns: Vec<SpawnRequest>,
}

/// Deterministic chunk generator for one world seed
///
/// Owns the terrain height session, so heights computed for one chunk are
/// reused by its neighbours.
pub struct WorldGenerator {
    seed: u32,
    terrain: TerrainParams,
    biomes: BiomeBands,
    vegetation: VegetationParams,
    materials: Arc<MaterialTable>,
    palette: Palette,
    sampler: TerrainSampler,
}

impl WorldGenerator {
    /// Fails if the material table lacks one of the generated materials
    /// or the terrain parameters are out of range
    pub fn new(
        seed: u32,
        config: &SimConfig,
        materials: Arc<MaterialTable>,
    ) -> Result<Self, WorldError> {
        let palette = Palette::resolve(&materials)?;
        let sampler = TerrainSampler::from_params(seed, &config.terrain)?;
        Ok(Self {
            seed,
            terrain: config.terrain.clone(),
            biomes: config.biomes.clone(),
            vegetation: config.vegetation.clone(),
            materials,
            palette,
            sampler,
        })
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn sampler(&self) -> &TerrainSampler {
        &self.sampler
    }

    /// Biome of the chunk column containing `world_x`
    pub fn biome_at(&self, world_x: i64) -> Biome {
        Biome::select(world_x.div_euclid(CHUNK_WIDTH as i64) as i32, &self.biomes)
    }

    /// World y of the topmost ground cell of column `world_x` in the overworld
    pub fn surface_y(&mut self, world_x: i64) -> i64 {
        let height = self.sampler.surface_height(world_x, self.terrain.max_depth) as i64;
        self.terrain.surface_min + height
            - self.biome_at(world_x).surface_drop(self.terrain.cell_range)
    }

    pub fn generate_chunk(&mut self, dimension: DimensionId, coord: ChunkCoord) -> GeneratedChunk {
        let mut chunk = Chunk::new(coord);
        let spawns = match dimension {
            DimensionId::Overworld => self.fill_overworld(&mut chunk),
            DimensionId::Waterworld => {
                self.fill_waterworld(&mut chunk);
                Vec::new()
            }
        };
        chunk.retag_homogeneous();
        log::trace!(
            "Generated {dimension:?} chunk {coord:?} ({} spawn requests)",
            spawns.len()
        );
        GeneratedChunk { chunk, spawns }
    }

    fn fill_overworld(&mut self, chunk: &mut Chunk) -> Vec<SpawnRequest> {
        let coord = chunk.coord();
        let biome = Biome::select(coord.x, &self.biomes);
        let (_, base_y) = local_to_world(coord, 0, 0);
        let top_y = base_y + CHUNK_WIDTH as i64;
        let mut spawns = Vec::new();

        for x in 0..CHUNK_WIDTH {
            let (world_x, _) = local_to_world(coord, x, 0);
            let surface = self.surface_y(world_x);
            let jitter = if self.terrain.soil_jitter > 0 {
                column_hash(world_x, self.seed, SOIL_SALT) as i64 % self.terrain.soil_jitter
            } else {
                0
            };
            let column = ColumnProfile {
                surface,
                soil_depth: self.terrain.soil_depth + jitter,
                sea_level: self.terrain.sea_level,
            };

            for y in 0..CHUNK_WIDTH {
                let world_y = base_y + y as i64;
                let material = biome.material_at(world_y, &column, &self.palette);
                let color = self
                    .materials
                    .get(material)
                    .shade(cell_hash(world_x, world_y, self.seed));
                chunk.set_cell(x, y, Cell::new(material, color));
            }

            if (base_y..top_y).contains(&surface)
                && let Some(request) = self.spawn_at(biome, world_x, surface)
            {
                spawns.push(request);
            }
        }
        spawns
    }

    /// Decoration or creature proposed for a surface column
    fn spawn_at(&self, biome: Biome, world_x: i64, surface: i64) -> Option<SpawnRequest> {
        let candidates = if world_x == self.vegetation.landmark_x {
            smallvec![Archetype::Hermit]
        } else if surface < self.terrain.sea_level || self.vegetation.column_modulus == 0 {
            return None;
        } else {
            let roll = column_hash(world_x, self.seed, SPAWN_SALT) % self.vegetation.column_modulus;
            let flip = column_hash(world_x, self.seed, FLIP_SALT) & 1 == 1;
            biome.spawn_candidates(roll, flip, &self.vegetation)
        };

        if candidates.is_empty() {
            return None;
        }
        Some(SpawnRequest {
            candidates,
            x: world_x as f64,
            ground_y: (surface + 1) as f64,
        })
    }

    fn fill_waterworld(&self, chunk: &mut Chunk) {
        let coord = chunk.coord();
        for y in 0..CHUNK_WIDTH {
            for x in 0..CHUNK_WIDTH {
                let (world_x, world_y) = local_to_world(coord, x, y);
                let material = if world_y > self.terrain.sea_level {
                    self.palette.air
                } else {
                    self.palette.water
                };
                let color = self
                    .materials
                    .get(material)
                    .shade(cell_hash(world_x, world_y, self.seed));
                chunk.set_cell(x, y, Cell::new(material, color));
            }
        }
    }
}
