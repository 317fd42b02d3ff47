//! Material definitions and the read-only property table

use serde::{Deserialize, Serialize};

use crate::TableError;

/// Maximum number of rows a material table may hold
pub const MATERIAL_TABLE_CAPACITY: usize = 1000;

/// Built-in material IDs
pub struct MaterialId;

impl MaterialId {
    pub const AIR: u16 = 0;
    pub const DIRT: u16 = 1;
    pub const GRASS: u16 = 2;
    pub const SAND: u16 = 3;
    pub const WATER: u16 = 4;
    pub const GOLD: u16 = 5;
    pub const SNOW: u16 = 6;
    pub const STEAM: u16 = 7;
    pub const LAVA: u16 = 8;
    pub const STONE: u16 = 9;
    pub const BRIAR: u16 = 10;
}

/// How a material is stepped by the cellular automaton
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialState {
    /// Never visited (solids and the empty medium)
    Static,
    /// Falls, piles up diagonally (sand, gold)
    Powder,
    /// Falls, then spreads sideways (water, lava)
    Liquid,
    /// Rises, then spreads sideways (steam)
    Gas,
}

impl MaterialState {
    /// Whether the automaton ever moves cells in this state
    pub fn is_mobile(self) -> bool {
        !matches!(self, MaterialState::Static)
    }
}

/// When a hazard deals its damage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardKind {
    /// Every tick the entity touches the material
    Continuous,
    /// Only on the first tick of a contact streak
    OneShot,
}

/// Contact damage dealt to entities with health
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub damage: f32,
    pub kind: HazardKind,
}

/// Phase change applied to a liquid resting on a hot material
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sublimation {
    /// Passive heat of the material below must exceed this
    pub threshold: i32,
    /// Material the liquid turns into
    pub product: u16,
}

/// Definition of a material's properties
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialDef {
    pub id: u16,
    pub name: String,
    pub state: MaterialState,

    /// Base color (RGBA)
    pub color: [u8; 4],
    /// Per-channel random brightening applied when a cell is generated
    pub color_jitter: [u8; 3],

    /// Displacement order: a mover only enters cells with lower solidity
    pub solidity: i32,
    /// Velocity scale for entities standing in or on this material
    pub friction: f32,
    /// Lateral search bound for liquids and gases
    pub viscosity: u16,

    /// Heat radiated to the cell above
    pub passive_heat: i32,
    pub sublimation: Option<Sublimation>,
    pub hazard: Option<Hazard>,
}

impl Default for MaterialDef {
    fn default() -> Self {
        Self {
            id: 0,
            name: "unknown".to_string(),
            state: MaterialState::Static,
            color: [255, 0, 255, 255], // Magenta for missing materials
            color_jitter: [0, 0, 0],
            solidity: 1000,
            friction: 0.7,
            viscosity: 1,
            passive_heat: 0,
            sublimation: None,
            hazard: None,
        }
    }
}

impl MaterialDef {
    /// Color of one generated cell, brightened by `noise` within the jitter range
    pub fn shade(&self, noise: u16) -> [u8; 4] {
        let mut color = self.color;
        for (channel, jitter) in color.iter_mut().take(3).zip(self.color_jitter) {
            if jitter > 0 {
                let offset = (noise % (jitter as u16 + 1)) as u8;
                *channel = channel.saturating_add(offset);
            }
        }
        color
    }
}

/// Immutable material property table, indexed by material id
///
/// Built once at startup, then shared read-only (usually behind an `Arc`).
#[derive(Debug, Clone)]
pub struct MaterialTable {
    materials: Vec<MaterialDef>,
}

impl MaterialTable {
    /// Table with the built-in materials
    pub fn builtin() -> Self {
        // Rows are listed densely in id order
        Self {
            materials: builtin_defs(),
        }
    }

    /// Validate externally loaded definitions and build a table
    ///
    /// Ids must be unique and cover `0..len` (0 being the empty medium).
    pub fn from_defs(mut defs: Vec<MaterialDef>) -> Result<Self, TableError> {
        if defs.is_empty() {
            return Err(TableError::Empty);
        }
        if defs.len() > MATERIAL_TABLE_CAPACITY {
            return Err(TableError::TooLarge {
                len: defs.len(),
                capacity: MATERIAL_TABLE_CAPACITY,
            });
        }

        defs.sort_by_key(|def| def.id);
        for (index, def) in defs.iter().enumerate() {
            if index > 0 && defs[index - 1].id == def.id {
                return Err(TableError::DuplicateId(def.id));
            }
            if def.id as usize != index {
                return Err(TableError::MissingId(index as u16));
            }
        }

        if defs[MaterialId::AIR as usize].state != MaterialState::Static {
            return Err(TableError::MobileEmptyMedium);
        }

        for def in &defs {
            if matches!(def.state, MaterialState::Liquid | MaterialState::Gas) && def.viscosity == 0
            {
                return Err(TableError::ZeroViscosity(def.name.clone()));
            }
            if let Some(sublimation) = def.sublimation
                && sublimation.product as usize >= defs.len()
            {
                return Err(TableError::DanglingProduct {
                    material: def.name.clone(),
                    product: sublimation.product,
                });
            }
        }

        log::debug!("Material table built with {} materials", defs.len());
        Ok(Self { materials: defs })
    }

    /// Get a material's properties; unknown ids fall back to the empty medium
    pub fn get(&self, id: u16) -> &MaterialDef {
        self.materials
            .get(id as usize)
            .unwrap_or(&self.materials[0])
    }

    /// Get color for a material
    pub fn get_color(&self, id: u16) -> [u8; 4] {
        self.get(id).color
    }

    /// Look up a material id by name
    pub fn find(&self, name: &str) -> Option<u16> {
        self.materials
            .iter()
            .find(|def| def.name == name)
            .map(|def| def.id)
    }

    /// Look up a material id by name, failing if the table lacks it
    pub fn require(&self, name: &str) -> Result<u16, TableError> {
        self.find(name)
            .ok_or_else(|| TableError::MissingMaterial(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialDef> {
        self.materials.iter()
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_defs() -> Vec<MaterialDef> {
    vec![
        // Empty medium
        MaterialDef {
            id: MaterialId::AIR,
            name: "air".to_string(),
            color: [255, 255, 255, 0],
            solidity: -100,
            friction: 0.8,
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::DIRT,
            name: "dirt".to_string(),
            color: [99, 80, 79, 255],
            color_jitter: [12, 0, 0],
            ..Default::default()
        },
        // Soil layer on forest surfaces
        MaterialDef {
            id: MaterialId::GRASS,
            name: "grass".to_string(),
            color: [8, 94, 11, 255],
            color_jitter: [0, 10, 0],
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::SAND,
            name: "sand".to_string(),
            state: MaterialState::Powder,
            color: [214, 185, 105, 255],
            color_jitter: [8, 8, 8],
            solidity: 220,
            friction: 0.6,
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::WATER,
            name: "water".to_string(),
            state: MaterialState::Liquid,
            color: [0, 0, 255, 200],
            solidity: 50,
            friction: 0.9,
            viscosity: 8,
            sublimation: Some(Sublimation {
                threshold: 100,
                product: MaterialId::STEAM,
            }),
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::GOLD,
            name: "gold".to_string(),
            state: MaterialState::Powder,
            color: [237, 220, 43, 255],
            color_jitter: [18, 20, 12],
            solidity: 255,
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::SNOW,
            name: "snow".to_string(),
            color: [236, 240, 250, 255],
            color_jitter: [6, 6, 4],
            solidity: 200,
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::STEAM,
            name: "steam".to_string(),
            state: MaterialState::Gas,
            color: [200, 200, 200, 120],
            solidity: -150,
            friction: 0.8,
            viscosity: 4,
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::LAVA,
            name: "lava".to_string(),
            state: MaterialState::Liquid,
            color: [255, 80, 0, 255],
            color_jitter: [0, 30, 0],
            solidity: 60,
            friction: 0.5,
            viscosity: 2,
            passive_heat: 1200,
            hazard: Some(Hazard {
                damage: 1.5,
                kind: HazardKind::Continuous,
            }),
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::STONE,
            name: "stone".to_string(),
            color: [110, 110, 118, 255],
            color_jitter: [10, 10, 10],
            ..Default::default()
        },
        MaterialDef {
            id: MaterialId::BRIAR,
            name: "briar".to_string(),
            color: [70, 52, 30, 255],
            hazard: Some(Hazard {
                damage: 10.0,
                kind: HazardKind::OneShot,
            }),
            ..Default::default()
        },
    ]
}
