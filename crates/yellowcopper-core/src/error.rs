//! Error types for world setup and entity bookkeeping

use thiserror::Error;
use yellowcopper_simulation::TableError;

use crate::entity::{Archetype, EntityId};
use crate::world::DimensionId;

/// Failures returned by world and registry operations
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("entity pool exhausted, all {capacity} ids are live")]
    EntityPoolFull { capacity: u32 },

    #[error("dimension {0:?} does not exist in this world")]
    UnknownDimension(DimensionId),

    #[error("entity {0} is not alive")]
    StaleEntity(EntityId),

    #[error("entity {id} lives in {lives_in:?}, not {given:?}")]
    WrongDimension {
        id: EntityId,
        lives_in: DimensionId,
        given: DimensionId,
    },

    #[error("archetype {0:?} is missing from the archetype table")]
    MissingArchetype(Archetype),

    #[error("archetype {archetype:?} is invalid: {reason}")]
    InvalidArchetype {
        archetype: Archetype,
        reason: &'static str,
    },

    #[error("invalid material table: {0}")]
    Table(#[from] TableError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start automaton workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Rejected simulation configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("worker thread count must be at least 1")]
    InvalidThreads,

    #[error("simulation radius {sim} must be non-negative and within load radius {load}")]
    InvalidRadius { sim: i32, load: i32 },

    #[error("entity pool of {0} ids leaves no usable id")]
    InvalidPoolSize(u32),

    #[error("at least one dimension must be enabled")]
    NoDimensions,

    #[error("invalid terrain parameters: {0}")]
    InvalidTerrain(&'static str),

    #[error("invalid physics parameters: {0}")]
    InvalidPhysics(&'static str),

    #[error("failed to parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
