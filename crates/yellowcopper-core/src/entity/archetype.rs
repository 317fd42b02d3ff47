//! Entity archetypes: templates copied into new entities

use glam::{DVec2, Vec2};
use serde::{Deserialize, Serialize};

use super::{AiKind, Animation, BoundingBox, Components, ContactState, Entity, EntityStatus};
use crate::config::PhysicsParams;
use crate::error::WorldError;
use crate::world::DimensionId;

/// Kinds of entity the world can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    Player,
    Tree,
    Bush,
    Grass,
    Cactus,
    /// Small wandering creature
    Critter,
    /// Animated landmark creature placed at a fixed column
    Hermit,
}

impl Archetype {
    pub const ALL: [Archetype; 7] = [
        Archetype::Player,
        Archetype::Tree,
        Archetype::Bush,
        Archetype::Grass,
        Archetype::Cactus,
        Archetype::Critter,
        Archetype::Hermit,
    ];
}

/// Template stats for one archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeDef {
    pub archetype: Archetype,
    pub body: BoundingBox,
    pub head: Option<BoundingBox>,
    pub texture: u16,
    pub z_depth: i8,
    pub max_health: f32,
    pub buoyancy: f32,
    pub camera_offset: Vec2,
    /// Present for entities with more than one frame
    pub animation: Option<Animation>,
    pub ai: AiKind,
    pub deathless: bool,
    /// Generation skips a spawn closer than this to one of the same kind
    pub min_spacing: f64,

    pub kinetic: bool,
    pub render: bool,
    pub health: bool,
}

impl ArchetypeDef {
    fn decoration(archetype: Archetype, width: f64, height: f64, min_spacing: f64) -> Self {
        Self {
            archetype,
            body: BoundingBox::sized(width, height),
            head: None,
            texture: archetype as u16,
            z_depth: -10,
            max_health: 0.0,
            buoyancy: 0.0,
            camera_offset: Vec2::ZERO,
            animation: None,
            ai: AiKind::None,
            deathless: true,
            min_spacing,
            kinetic: false,
            render: true,
            health: false,
        }
    }

    /// Index sets this archetype registers into
    pub fn components(&self) -> Components {
        let mut components = Components::empty();
        components.set(Components::KINETIC, self.kinetic);
        components.set(Components::RENDER, self.render);
        components.set(Components::HEALTH, self.health);
        components.set(Components::AI, self.ai != AiKind::None);
        components
    }

    /// A fresh entity whose top-left corner is `position`
    pub fn instantiate(&self, dimension: DimensionId, position: DVec2) -> Entity {
        let mut status = EntityStatus::empty();
        status.set(EntityStatus::ANIMATED, self.animation.is_some());
        status.set(EntityStatus::DEATHLESS, self.deathless);

        Entity {
            archetype: self.archetype,
            dimension,
            components: self.components(),
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            camera_offset: self.camera_offset,
            status,
            body: self.body,
            head: self.head,
            texture: self.texture,
            animation: self.animation.unwrap_or_default(),
            z_depth: self.z_depth,
            health: self.max_health,
            max_health: self.max_health,
            respawn: position,
            buoyancy: self.buoyancy,
            ai: self.ai,
            wander_target: None,
            contact: ContactState::default(),
        }
    }

    /// Top-left position that puts the body's bottom edge on `ground_y`,
    /// centered on column `x`
    pub fn standing_position(&self, x: f64, ground_y: f64) -> DVec2 {
        DVec2::new(
            x - self.body.width / 2.0 - self.body.offset_x,
            ground_y + self.body.height + self.body.offset_y,
        )
    }
}

/// Every archetype's template, complete and validated
#[derive(Debug, Clone)]
pub struct ArchetypeTable {
    defs: Vec<ArchetypeDef>,
}

impl ArchetypeTable {
    /// Built-in templates tuned for `physics`
    pub fn builtin(physics: &PhysicsParams) -> Self {
        let player = ArchetypeDef {
            archetype: Archetype::Player,
            body: BoundingBox::sized(11.0, 29.0),
            head: Some(BoundingBox {
                offset_x: 2.0,
                offset_y: 0.0,
                width: 7.0,
                height: 8.0,
            }),
            texture: Archetype::Player as u16,
            z_depth: 9,
            max_health: 100.0,
            // Sinks very slowly when idle in water
            buoyancy: physics.gravity - 0.01,
            camera_offset: Vec2::new(0.0, -20.0),
            animation: None,
            ai: AiKind::None,
            deathless: false,
            min_spacing: 0.0,
            kinetic: true,
            render: true,
            health: true,
        };
        let critter = ArchetypeDef {
            archetype: Archetype::Critter,
            body: BoundingBox::sized(9.0, 7.0),
            head: None,
            texture: Archetype::Critter as u16,
            z_depth: 5,
            max_health: 20.0,
            buoyancy: physics.gravity + 0.02,
            camera_offset: Vec2::ZERO,
            animation: Some(Animation {
                frame_width: 9,
                frames: 2,
                delay: 12,
                ..Default::default()
            }),
            ai: AiKind::Wander,
            deathless: false,
            min_spacing: 200.0,
            kinetic: true,
            render: true,
            health: true,
        };
        let hermit = ArchetypeDef {
            archetype: Archetype::Hermit,
            body: BoundingBox::sized(25.0, 40.0),
            head: None,
            texture: Archetype::Hermit as u16,
            z_depth: 10,
            max_health: 0.0,
            buoyancy: 0.0,
            camera_offset: Vec2::ZERO,
            animation: Some(Animation {
                frame_width: 25,
                frames: 2,
                delay: 20,
                ..Default::default()
            }),
            ai: AiKind::None,
            deathless: true,
            min_spacing: 0.0,
            kinetic: true,
            render: true,
            health: false,
        };

        Self {
            defs: vec![
                player,
                ArchetypeDef::decoration(Archetype::Tree, 40.0, 85.0, 100.0),
                ArchetypeDef::decoration(Archetype::Bush, 20.0, 14.0, 15.0),
                ArchetypeDef::decoration(Archetype::Grass, 10.0, 6.0, 10.0),
                ArchetypeDef::decoration(Archetype::Cactus, 12.0, 30.0, 60.0),
                critter,
                hermit,
            ],
        }
    }

    /// Validate externally loaded templates
    ///
    /// Every archetype needs exactly one template with a non-empty body.
    pub fn from_defs(mut defs: Vec<ArchetypeDef>) -> Result<Self, WorldError> {
        defs.sort_by_key(|def| def.archetype);
        if let Some(pair) = defs.windows(2).find(|pair| pair[0].archetype == pair[1].archetype) {
            return Err(WorldError::InvalidArchetype {
                archetype: pair[0].archetype,
                reason: "duplicate template",
            });
        }
        for archetype in Archetype::ALL {
            let def = defs
                .iter()
                .find(|def| def.archetype == archetype)
                .ok_or(WorldError::MissingArchetype(archetype))?;
            if def.body.width <= 0.0 || def.body.height <= 0.0 {
                return Err(WorldError::InvalidArchetype {
                    archetype,
                    reason: "body box must have positive size",
                });
            }
            if def.kinetic && !def.render {
                return Err(WorldError::InvalidArchetype {
                    archetype,
                    reason: "kinetic entities must be rendered",
                });
            }
        }
        // Sorted, unique and complete, so `get` can index by discriminant
        debug_assert_eq!(defs.len(), Archetype::ALL.len());
        Ok(Self { defs })
    }

    pub fn get(&self, archetype: Archetype) -> &ArchetypeDef {
        // Both constructors keep one def per archetype, sorted by archetype
        &self.defs[archetype as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArchetypeDef> {
        self.defs.iter()
    }
}
