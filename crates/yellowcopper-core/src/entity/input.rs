//! Player input state and its translation into acceleration

use crate::config::MovementParams;
use crate::entity::{Entity, EntityStatus};

/// Movement keys held this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    /// Jump on ground, swim up in liquid
    pub w_pressed: bool,
    pub a_pressed: bool,
    pub s_pressed: bool,
    pub d_pressed: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        !(self.w_pressed || self.a_pressed || self.s_pressed || self.d_pressed)
    }

    /// Add this tick's movement to the entity's acceleration
    ///
    /// Swimming uses the weaker swim constant. Jumping only works from the
    /// ground and out of liquid. No key pushes acceleration past
    /// `acceleration_limit` (vertical limits are offset by `gravity`).
    pub fn apply(&self, entity: &mut Entity, movement: &MovementParams, gravity: f32) {
        let limit = movement.acceleration_limit;
        let submerged = entity.is_submerged();
        let step = if submerged {
            movement.swim_acceleration
        } else {
            movement.walk_acceleration
        };
        let acceleration = &mut entity.acceleration;

        if self.w_pressed {
            if entity.status.contains(EntityStatus::GROUNDED)
                && !submerged
                && acceleration.y < limit + gravity
            {
                acceleration.y += movement.jump_acceleration;
            }
            if submerged && acceleration.y < limit {
                acceleration.y += movement.swim_acceleration;
            }
        }
        if self.a_pressed {
            if acceleration.x > -limit {
                acceleration.x -= step;
            }
            entity.animation.flipped = true;
        }
        if self.s_pressed && acceleration.y > -limit - gravity {
            acceleration.y -= step;
        }
        if self.d_pressed {
            if acceleration.x < limit {
                acceleration.x += step;
            }
            entity.animation.flipped = false;
        }
    }
}
