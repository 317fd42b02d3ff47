//! Material table validation errors

use thiserror::Error;

/// Reasons a material table is rejected at startup
#[derive(Debug, Error)]
pub enum TableError {
    #[error("material table is empty")]
    Empty,

    #[error("material table has {len} rows, capacity is {capacity}")]
    TooLarge { len: usize, capacity: usize },

    #[error("material id {0} is defined twice")]
    DuplicateId(u16),

    #[error("material id {0} is missing, ids must be contiguous from 0")]
    MissingId(u16),

    #[error("material 0 is the empty medium and must be static")]
    MobileEmptyMedium,

    #[error("fluid material `{0}` needs a viscosity of at least 1")]
    ZeroViscosity(String),

    #[error("required material `{0}` is missing from the table")]
    MissingMaterial(String),

    #[error("material `{material}` sublimates into unknown id {product}")]
    DanglingProduct { material: String, product: u16 },
}
