//! Cell types and constants
//!
//! Foundational types for the cell grid.

use crate::MaterialId;
use serde::{Deserialize, Serialize};

/// Width of a chunk in cells (64x64)
pub const CHUNK_WIDTH: usize = 64;

/// Total cells in a chunk
pub const CHUNK_CELLS: usize = CHUNK_WIDTH * CHUNK_WIDTH;

/// A single cell in the world
///
/// `material_id` is the row of the material table describing this cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub material_id: u16,
    /// Render color (RGBA)
    pub color: [u8; 4],
    /// State flags (moved this tick)
    pub flags: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self::AIR
    }
}

impl Cell {
    pub const AIR: Cell = Cell {
        material_id: MaterialId::AIR,
        color: [255, 255, 255, 0],
        flags: 0,
    };

    pub fn new(material_id: u16, color: [u8; 4]) -> Self {
        Self {
            material_id,
            color,
            flags: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.material_id == MaterialId::AIR
    }

    pub fn is_updated(&self) -> bool {
        self.flags & cell_flags::UPDATED != 0
    }
}

/// Flag bits for cell state
pub mod cell_flags {
    pub const UPDATED: u8 = 1 << 0; // Already moved this tick
}
