//! Cell and material data for Yellow Copper
//!
//! This crate provides the foundational data types for the cell world:
//! - Material definitions (MaterialId, MaterialDef, MaterialTable)
//! - Material states and contact hazards (MaterialState, Hazard)
//! - Cell types (Cell, cell_flags, CHUNK_WIDTH)

mod cell;
mod error;
mod materials;

pub use cell::{CHUNK_CELLS, CHUNK_WIDTH, Cell, cell_flags};
pub use error::TableError;
pub use materials::{
    Hazard, HazardKind, MATERIAL_TABLE_CAPACITY, MaterialDef, MaterialId, MaterialState,
    MaterialTable, Sublimation,
};
