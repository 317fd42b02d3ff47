pub mod config;
pub mod entity;
pub mod error;
pub mod world;

pub use config::SimConfig;
pub use error::{ConfigError, WorldError};
pub use world::{DebugFlags, DimensionId, World};
