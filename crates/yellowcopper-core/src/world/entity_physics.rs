//! Entity physics system - friction, buoyancy, gravity, cell collision
//!
//! Collision is a soft solver: each overlapping solid cell pushes the body
//! out along its shallower axis by at most `max_correction`, and whatever
//! overlap remains is left for the next tick.

use glam::DVec2;
use yellowcopper_simulation::{HazardKind, MaterialDef, MaterialId, MaterialState, MaterialTable};

use super::Dimension;
use crate::config::PhysicsParams;
use crate::entity::{Components, Entity, EntityStatus};

/// Entity physics system - integrates kinetics and resolves cell contacts
pub struct EntityPhysicsSystem;

impl EntityPhysicsSystem {
    /// Friction of the medium the entity occupied after the last resolve
    pub fn medium_friction(entity: &Entity, materials: &MaterialTable) -> f32 {
        let medium = if entity.is_submerged() {
            entity.contact.liquid
        } else if entity.is_grounded() {
            entity.contact.ground
        } else {
            None
        };
        materials.get(medium.unwrap_or(MaterialId::AIR)).friction
    }

    /// Advance acceleration, velocity and position by one tick
    pub fn integrate(entity: &mut Entity, materials: &MaterialTable, params: &PhysicsParams) {
        let friction = Self::medium_friction(entity, materials);
        entity.acceleration *= friction;
        entity.velocity *= friction;

        if entity.is_submerged() {
            entity.velocity.y += entity.buoyancy;
        }

        entity.velocity += entity.acceleration;
        if entity.velocity.y > params.terminal_velocity {
            entity.velocity.y -= params.gravity;
        }

        entity.position += entity.velocity.as_dvec2();
    }

    /// Resolve overlaps with the cells around the body and update contact
    /// flags; returns the hazard damage dealt this tick
    pub fn resolve(
        entity: &mut Entity,
        dimension: &Dimension,
        materials: &MaterialTable,
        params: &PhysicsParams,
    ) -> f32 {
        let previous_hazards = std::mem::take(&mut entity.contact.hazards);
        entity.contact.ground = None;
        entity.contact.liquid = None;
        entity.status.remove(EntityStatus::GROUNDED | EntityStatus::SUBMERGED);

        // One cell beyond the body in every direction
        let (min, max) = entity.body_bounds();
        let (x0, x1) = (min.x.floor() as i64 - 1, max.x.floor() as i64 + 1);
        let (y0, y1) = (min.y.floor() as i64 - 1, max.y.floor() as i64 + 1);

        let mut damage = 0.0;
        for cell_y in y0..=y1 {
            for cell_x in x0..=x1 {
                let Some(cell) = dimension.cell_at_world_pos(cell_x, cell_y) else {
                    continue;
                };
                let cell_min = DVec2::new(cell_x as f64, cell_y as f64);
                if !touches(entity, cell_min) {
                    continue;
                }

                let def = materials.get(cell.material_id);
                damage += Self::touch_hazard(entity, def, &previous_hazards);

                if def.state == MaterialState::Liquid {
                    entity.status.insert(EntityStatus::SUBMERGED);
                    entity.contact.liquid.get_or_insert(def.id);
                } else if def.solidity >= params.collision_solidity {
                    Self::push_out(entity, def, cell_min, params);
                }
            }
        }

        if damage > 0.0 {
            entity.health -= damage;
            log::trace!(
                "{:?} took {damage} hazard damage, {} left",
                entity.archetype,
                entity.health
            );
        }
        damage
    }

    /// Record contact with a hazard material; damage is dealt at most once
    /// per material per tick
    fn touch_hazard(entity: &mut Entity, def: &MaterialDef, previous: &[u16]) -> f32 {
        let Some(hazard) = def.hazard else {
            return 0.0;
        };
        if entity.contact.hazards.contains(&def.id) {
            return 0.0;
        }
        entity.contact.hazards.push(def.id);

        if !entity.components.contains(Components::HEALTH) {
            return 0.0;
        }
        match hazard.kind {
            HazardKind::Continuous => hazard.damage,
            HazardKind::OneShot if !previous.contains(&def.id) => hazard.damage,
            HazardKind::OneShot => 0.0,
        }
    }

    /// Push the body out of one solid cell along the shallower axis
    fn push_out(entity: &mut Entity, def: &MaterialDef, cell_min: DVec2, params: &PhysicsParams) {
        let (min, max) = entity.body_bounds();
        let cell_max = cell_min + DVec2::ONE;
        let center = (min + max) * 0.5;
        let cell_center = cell_min + DVec2::splat(0.5);

        let overlap_x = max.x.min(cell_max.x) - min.x.max(cell_min.x);
        let overlap_y = max.y.min(cell_max.y) - min.y.max(cell_min.y);

        if overlap_x < overlap_y {
            let push = overlap_x.min(params.max_correction);
            if center.x < cell_center.x {
                entity.position.x -= push;
                entity.velocity.x = entity.velocity.x.min(0.0);
            } else {
                entity.position.x += push;
                entity.velocity.x = entity.velocity.x.max(0.0);
            }
        } else {
            let push = overlap_y.min(params.max_correction);
            if center.y > cell_center.y {
                entity.position.y += push;
                entity.velocity.y = entity.velocity.y.max(0.0);
                entity.status.insert(EntityStatus::GROUNDED);
                entity.contact.ground = Some(def.id);
            } else {
                entity.position.y -= push;
                entity.velocity.y = entity.velocity.y.min(0.0);
            }
        }
    }
}

/// Whether the body overlaps or touches the unit cell at `cell_min`
fn touches(entity: &Entity, cell_min: DVec2) -> bool {
    let (min, max) = entity.body_bounds();
    let cell_max = cell_min + DVec2::ONE;
    max.x >= cell_min.x && cell_max.x >= min.x && max.y >= cell_min.y && cell_max.y >= min.y
}

/// Largest overlap between the body and any loaded cell at or above
/// `collision_solidity`
pub fn max_solid_overlap(
    entity: &Entity,
    dimension: &Dimension,
    materials: &MaterialTable,
    params: &PhysicsParams,
) -> f64 {
    let (min, max) = entity.body_bounds();
    let mut worst: f64 = 0.0;
    for cell_y in min.y.floor() as i64..=max.y.floor() as i64 {
        for cell_x in min.x.floor() as i64..=max.x.floor() as i64 {
            let Some(cell) = dimension.cell_at_world_pos(cell_x, cell_y) else {
                continue;
            };
            if materials.get(cell.material_id).solidity < params.collision_solidity {
                continue;
            }
            let overlap_x = max.x.min(cell_x as f64 + 1.0) - min.x.max(cell_x as f64);
            let overlap_y = max.y.min(cell_y as f64 + 1.0) - min.y.max(cell_y as f64);
            if overlap_x > 0.0 && overlap_y > 0.0 {
                worst = worst.max(overlap_x.min(overlap_y));
            }
        }
    }
    worst
}
