//! The entity record and its small component types

use bitflags::bitflags;
use glam::{DVec2, Vec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::Archetype;
use crate::world::DimensionId;

bitflags! {
    /// Per-tick and lifetime status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityStatus: u8 {
        /// Standing on a solid cell
        const GROUNDED = 1 << 0;
        /// Overlapping a liquid cell
        const SUBMERGED = 1 << 1;
        /// Animation frames advance every tick
        const ANIMATED = 1 << 2;
        /// Health ran out this tick
        const DEAD = 1 << 3;
        /// Health never drops below 1
        const DEATHLESS = 1 << 4;
    }
}

bitflags! {
    /// Dimension index sets an entity is registered in
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Components: u8 {
        const KINETIC = 1 << 0;
        const RENDER = 1 << 1;
        const HEALTH = 1 << 2;
        const AI = 1 << 3;
    }
}

/// Axis-aligned box relative to the entity's top-left corner (y up)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Offset right from the entity position
    pub offset_x: f64,
    /// Offset down from the entity position
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn sized(width: f64, height: f64) -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            width,
            height,
        }
    }

    /// World-space `(min, max)` corners for an entity at `position`
    pub fn world_bounds(&self, position: DVec2) -> (DVec2, DVec2) {
        let left = position.x + self.offset_x;
        let top = position.y - self.offset_y;
        (
            DVec2::new(left, top - self.height),
            DVec2::new(left + self.width, top),
        )
    }
}

/// Sprite-sheet animation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Animation {
    /// Width of one frame in the sheet
    pub frame_width: u16,
    pub frames: u16,
    pub frame: u16,
    /// Ticks each frame is shown
    pub delay: u16,
    pub timer: u16,
    /// Draw mirrored horizontally
    pub flipped: bool,
}

impl Animation {
    /// Advance the timer by one tick, wrapping frames
    pub fn advance(&mut self) {
        if self.frames <= 1 {
            return;
        }
        self.timer += 1;
        if self.timer >= self.delay.max(1) {
            self.timer = 0;
            self.frame = (self.frame + 1) % self.frames;
        }
    }

    /// Horizontal offset of the current frame in the sheet
    pub fn frame_offset(&self) -> u32 {
        self.frame as u32 * self.frame_width as u32
    }
}

/// Behavior driving an entity's own acceleration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AiKind {
    #[default]
    None,
    /// Walk toward a random target column, pick a new one on arrival
    Wander,
}

/// Materials an entity touched during the last collision pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactState {
    /// Solid material under the feet
    pub ground: Option<u16>,
    /// Liquid the entity is submerged in
    pub liquid: Option<u16>,
    /// Hazard materials touched, deduplicated
    pub hazards: SmallVec<[u16; 4]>,
}

/// A simulated entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub archetype: Archetype,
    pub dimension: DimensionId,
    pub components: Components,

    /// Top-left corner of the body box
    pub position: DVec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub camera_offset: Vec2,
    pub status: EntityStatus,

    pub body: BoundingBox,
    pub head: Option<BoundingBox>,
    pub texture: u16,
    pub animation: Animation,
    pub z_depth: i8,

    pub health: f32,
    pub max_health: f32,
    pub respawn: DVec2,
    /// Upward velocity added every tick while submerged
    pub buoyancy: f32,

    pub ai: AiKind,
    pub wander_target: Option<f64>,

    pub contact: ContactState,
}

impl Entity {
    pub fn is_grounded(&self) -> bool {
        self.status.contains(EntityStatus::GROUNDED)
    }

    pub fn is_submerged(&self) -> bool {
        self.status.contains(EntityStatus::SUBMERGED)
    }

    pub fn is_dead(&self) -> bool {
        self.status.contains(EntityStatus::DEAD)
    }

    /// World-space `(min, max)` of the body box
    pub fn body_bounds(&self) -> (DVec2, DVec2) {
        self.body.world_bounds(self.position)
    }

    /// Center of the body box
    pub fn center(&self) -> DVec2 {
        let (min, max) = self.body_bounds();
        (min + max) * 0.5
    }

    /// Return to the respawn point with full health
    pub fn respawn(&mut self) {
        self.position = self.respawn;
        self.velocity = Vec2::ZERO;
        self.acceleration = Vec2::ZERO;
        self.health = self.max_health;
        self.status.remove(EntityStatus::DEAD);
        self.contact = ContactState::default();
    }
}
