//! Entities: records, archetype templates, id registry and per-tick systems

pub mod ai;
mod archetype;
#[allow(clippy::module_inception)]
mod entity;
pub mod health;
pub mod input;
mod registry;

pub use ai::AiSystem;
pub use archetype::{Archetype, ArchetypeDef, ArchetypeTable};
pub use entity::{
    AiKind, Animation, BoundingBox, Components, ContactState, Entity, EntityStatus,
};
pub use health::{HealthOutcome, HealthSystem};
pub use input::InputState;
pub use registry::{EntityId, EntityRegistry};
