//! Creature AI: wander toward random columns

use super::{AiKind, Entity};
use crate::world::WorldRng;

/// Farthest a new wander target lies from the creature, in cells
pub const WANDER_RANGE: u32 = 48;

/// Horizontal acceleration while walking to a target
pub const WANDER_ACCELERATION: f32 = 0.1;

/// Within this distance the target counts as reached
const ARRIVAL_DISTANCE: f64 = 2.0;

/// AI system - sets creature acceleration from its behavior
pub struct AiSystem;

impl AiSystem {
    pub fn update(entity: &mut Entity, rng: &mut dyn WorldRng) {
        match entity.ai {
            AiKind::None => {}
            AiKind::Wander => Self::wander(entity, rng),
        }
    }

    fn wander(entity: &mut Entity, rng: &mut dyn WorldRng) {
        let x = entity.center().x;
        let target = match entity.wander_target {
            Some(target) if (target - x).abs() > ARRIVAL_DISTANCE => target,
            _ => {
                let offset = rng.gen_below(2 * WANDER_RANGE + 1) as f64 - WANDER_RANGE as f64;
                let target = x + offset;
                entity.wander_target = Some(target);
                target
            }
        };

        if (target - x).abs() <= ARRIVAL_DISTANCE {
            entity.acceleration.x = 0.0;
            return;
        }
        let direction = (target - x).signum() as f32;
        entity.acceleration.x = direction * WANDER_ACCELERATION;
        entity.animation.flipped = direction < 0.0;
    }
}
