//! Biome bands and per-biome cell filling / spawn tables

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use yellowcopper_simulation::{MaterialTable, TableError};

use crate::config::{BiomeBands, VegetationParams};
use crate::entity::Archetype;

/// Thickness of dirt between the soil layer and stone
pub const DIRT_DEPTH: i64 = 192;

/// Surface biome, chosen by chunk x from west to east
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    Ocean,
    Forest,
    Desert,
    Tundra,
}

impl Biome {
    /// Biome of a chunk column
    pub fn select(chunk_x: i32, bands: &BiomeBands) -> Self {
        if chunk_x < bands.ocean_end {
            Biome::Ocean
        } else if chunk_x < bands.desert_start {
            Biome::Forest
        } else if chunk_x < bands.tundra_start {
            Biome::Desert
        } else {
            Biome::Tundra
        }
    }

    /// How far this biome sinks the shared surface curve
    pub fn surface_drop(self, cell_range: i32) -> i64 {
        match self {
            Biome::Ocean => cell_range as i64,
            _ => 0,
        }
    }

    /// Material of the cell at world height `y` in a column
    pub fn material_at(self, y: i64, column: &ColumnProfile, palette: &Palette) -> u16 {
        if y > column.surface {
            return if y <= column.sea_level {
                palette.water
            } else {
                palette.air
            };
        }

        let depth = column.surface - y;
        if depth < column.soil_depth {
            // Anything under water gets a sand floor
            if column.surface < column.sea_level {
                return palette.sand;
            }
            match self {
                Biome::Ocean | Biome::Desert => palette.sand,
                Biome::Forest => palette.grass,
                Biome::Tundra => palette.snow,
            }
        } else if depth < column.soil_depth + DIRT_DEPTH {
            palette.dirt
        } else {
            palette.stone
        }
    }

    /// Archetypes to try, in order, for a surface column with spawn `roll`
    ///
    /// `roll` is the column hash modulo `column_modulus`; `flip` picks the
    /// order of the bush/grass pair.
    pub fn spawn_candidates(
        self,
        roll: u16,
        flip: bool,
        vegetation: &VegetationParams,
    ) -> SmallVec<[Archetype; 2]> {
        let mut threshold = 0;
        let mut band = |rate: u16| {
            let hit = roll >= threshold && roll < threshold.saturating_add(rate);
            threshold = threshold.saturating_add(rate);
            hit
        };

        match self {
            Biome::Ocean => SmallVec::new(),
            Biome::Forest => {
                if band(vegetation.tree_rate) {
                    smallvec![Archetype::Tree]
                } else if band(vegetation.shrub_rate) {
                    if flip {
                        smallvec![Archetype::Grass, Archetype::Bush]
                    } else {
                        smallvec![Archetype::Bush, Archetype::Grass]
                    }
                } else if band(vegetation.creature_rate) {
                    smallvec![Archetype::Critter]
                } else {
                    SmallVec::new()
                }
            }
            Biome::Desert => {
                if band(vegetation.cactus_rate) {
                    smallvec![Archetype::Cactus]
                } else if band(vegetation.creature_rate) {
                    smallvec![Archetype::Critter]
                } else {
                    SmallVec::new()
                }
            }
            Biome::Tundra => {
                if band(vegetation.tree_rate / 2) {
                    smallvec![Archetype::Tree]
                } else if band(vegetation.creature_rate) {
                    smallvec![Archetype::Critter]
                } else {
                    SmallVec::new()
                }
            }
        }
    }
}

/// Heights describing one world column
#[derive(Debug, Clone, Copy)]
pub struct ColumnProfile {
    /// World y of the topmost ground cell
    pub surface: i64,
    /// Thickness of the soil layer
    pub soil_depth: i64,
    pub sea_level: i64,
}

/// Material ids the generator places, resolved by name from the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub air: u16,
    pub dirt: u16,
    pub grass: u16,
    pub sand: u16,
    pub water: u16,
    pub snow: u16,
    pub stone: u16,
}

impl Palette {
    /// Resolve the generator's materials; fails if the table lacks one
    pub fn resolve(materials: &MaterialTable) -> Result<Self, TableError> {
        Ok(Self {
            air: materials.require("air")?,
            dirt: materials.require("dirt")?,
            grass: materials.require("grass")?,
            sand: materials.require("sand")?,
            water: materials.require("water")?,
            snow: materials.require("snow")?,
            stone: materials.require("stone")?,
        })
    }
}
