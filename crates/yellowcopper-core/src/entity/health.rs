//! Health bookkeeping: death and the deathless clamp

use super::{Entity, EntityStatus};

/// What the world should do with an entity after its health update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Alive,
    /// Health ran out; the entity is flagged `DEAD`
    Died,
}

/// Health system - applies death rules once per tick
pub struct HealthSystem;

impl HealthSystem {
    /// Flag entities whose health ran out
    ///
    /// Deathless entities (and any entity while `force_deathless` is set)
    /// are clamped to 1 health instead.
    pub fn update(entity: &mut Entity, force_deathless: bool) -> HealthOutcome {
        if entity.health > 0.0 {
            return HealthOutcome::Alive;
        }
        if force_deathless || entity.status.contains(EntityStatus::DEATHLESS) {
            entity.health = 1.0;
            return HealthOutcome::Alive;
        }
        entity.status.insert(EntityStatus::DEAD);
        HealthOutcome::Died
    }
}
