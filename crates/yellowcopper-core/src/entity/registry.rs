//! Entity id pool and generational slot storage
//!
//! Ids pack a slot index (low 32 bits) and a generation (high 32 bits).
//! Index 0 is reserved as "none". Free indices are found by linear probe
//! from a rolling cursor; freeing a slot bumps its generation so stale ids
//! held elsewhere stop resolving.

use glam::DVec2;
use std::cmp::Ordering;
use std::fmt;

use super::{ArchetypeDef, Entity};
use crate::error::WorldError;
use crate::world::Dimension;

/// Generational entity identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// The reserved "no entity" id
    pub const NONE: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.index() == 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NONE
    }
}

// Ordered by slot index first so index sets iterate in allocation order
impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index(), self.generation()).cmp(&(other.index(), other.generation()))
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Free,
    /// Handed out by `allocate_id`, not yet populated
    Reserved,
    Live(Box<Entity>),
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Owner of every entity across all dimensions
#[derive(Debug)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    /// Size of the id space, index 0 included
    capacity: u32,
    cursor: u32,
    live: usize,
}

impl EntityRegistry {
    /// Registry with ids `1..capacity`
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: Vec::new(),
            capacity: capacity.max(2),
            cursor: 1,
            live: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn is_free(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_none_or(|slot| matches!(slot.state, SlotState::Free))
    }

    /// Reserve the next free id after the cursor
    ///
    /// Fails with `EntityPoolFull` once a whole cycle finds nothing free.
    pub fn allocate_id(&mut self) -> Result<EntityId, WorldError> {
        for _ in 1..self.capacity {
            let index = self.cursor;
            self.cursor += 1;
            if self.cursor >= self.capacity {
                self.cursor = 1;
            }

            if self.is_free(index) {
                if index as usize >= self.slots.len() {
                    self.slots.resize_with(index as usize + 1, Slot::default);
                }
                let slot = &mut self.slots[index as usize];
                slot.state = SlotState::Reserved;
                return Ok(EntityId::new(index, slot.generation));
            }
        }
        Err(WorldError::EntityPoolFull {
            capacity: self.capacity - 1,
        })
    }

    /// Return a reserved (never populated) id to the pool
    pub fn release(&mut self, id: EntityId) {
        if let Some(slot) = self.slots.get_mut(id.index() as usize)
            && slot.generation == id.generation()
            && matches!(slot.state, SlotState::Reserved)
        {
            slot.state = SlotState::Free;
        }
    }

    /// Copy `def` into a new entity at `position` and register it in
    /// `dimension`'s index sets
    pub fn create(
        &mut self,
        def: &ArchetypeDef,
        dimension: &mut Dimension,
        position: DVec2,
    ) -> Result<EntityId, WorldError> {
        let id = self.allocate_id()?;
        let entity = def.instantiate(dimension.id(), position);
        dimension.register_entity(id, &entity);
        self.slots[id.index() as usize].state = SlotState::Live(Box::new(entity));
        self.live += 1;
        log::trace!("Created {:?} {} in {:?}", def.archetype, id, dimension.id());
        Ok(id)
    }

    /// Remove an entity from every index set of `dimension` and free its id
    pub fn destroy(
        &mut self,
        id: EntityId,
        dimension: &mut Dimension,
    ) -> Result<Entity, WorldError> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .ok_or(WorldError::StaleEntity(id))?;
        let SlotState::Live(live) = &slot.state else {
            return Err(WorldError::StaleEntity(id));
        };
        if live.dimension != dimension.id() {
            return Err(WorldError::WrongDimension {
                id,
                lives_in: live.dimension,
                given: dimension.id(),
            });
        }
        let SlotState::Live(entity) = std::mem::take(&mut slot.state) else {
            return Err(WorldError::StaleEntity(id));
        };

        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        dimension.unregister_entity(id, &entity);
        log::trace!("Destroyed {:?} {}", entity.archetype, id);
        Ok(*entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let slot = self.slots.get(id.index() as usize)?;
        match &slot.state {
            SlotState::Live(entity) if slot.generation == id.generation() => Some(&**entity),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        match &mut slot.state {
            SlotState::Live(entity) if slot.generation == id.generation() => Some(&mut **entity),
            _ => None,
        }
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Iterate live entities in slot order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.state {
                SlotState::Live(entity) => {
                    Some((EntityId::new(index as u32, slot.generation), &**entity))
                }
                _ => None,
            })
    }
}
