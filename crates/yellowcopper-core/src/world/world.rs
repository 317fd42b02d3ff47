//! World driver: owns dimensions, entities and the per-tick pipeline

use bitflags::bitflags;
use glam::{DVec2, Vec2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::collections::BTreeMap;
use std::sync::Arc;
use yellowcopper_simulation::MaterialTable;

use super::generation::{SpawnRequest, WorldGenerator};
use super::terrain::cell_hash;
use super::{
    Cell, CellWindow, ChunkCoord, ChunkScheduler, Dimension, DimensionId, EntityPhysicsSystem,
    TickStats, chunk_of,
};
use crate::config::SimConfig;
use crate::entity::{
    AiSystem, Archetype, ArchetypeTable, Entity, EntityId, EntityRegistry, EntityStatus,
    HealthOutcome, HealthSystem, InputState,
};
use crate::error::WorldError;

const AI_SALT: u64 = 0xA1_5EED;

bitflags! {
    /// Developer toggles flipped by the input glue
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DebugFlags: u8 {
        /// Mark chunk corners in the renderer window
        const SHOW_CHUNK_CORNERS = 1 << 0;
        /// Skip the automaton phase
        const FREEZE_CELLS = 1 << 1;
        /// The player cannot die
        const DEATHLESS_PLAYER = 1 << 2;
    }
}

/// The simulated world
pub struct World {
    seed: u32,
    config: SimConfig,
    materials: Arc<MaterialTable>,
    archetypes: ArchetypeTable,
    generator: WorldGenerator,
    scheduler: ChunkScheduler,
    registry: EntityRegistry,
    dimensions: BTreeMap<DimensionId, Dimension>,
    /// Dimension the player lives in; the only one that is ticked
    active: DimensionId,
    player: EntityId,
    /// Player chunk at the last chunk-loading pass
    last_load_chunk: Option<ChunkCoord>,
    debug: DebugFlags,
    ticks: u64,
    rng: Xoshiro256StarStar,
    last_stats: TickStats,
}

impl World {
    /// Build a world, place the player and generate the chunks around it
    ///
    /// A missing seed is drawn at random. Any configuration or table
    /// problem is reported here, before the first tick.
    pub fn new(
        seed: Option<u32>,
        config: SimConfig,
        materials: Arc<MaterialTable>,
        archetypes: ArchetypeTable,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let seed = seed.unwrap_or_else(rand::random);

        let generator = WorldGenerator::new(seed, &config, Arc::clone(&materials))?;
        let scheduler = ChunkScheduler::new(config.threads, config.schedule)?;
        let dimensions = config
            .dimensions
            .iter()
            .map(|&id| (id, Dimension::new(id)))
            .collect::<BTreeMap<_, _>>();
        let active = config
            .dimensions
            .first()
            .copied()
            .ok_or(crate::error::ConfigError::NoDimensions)?;

        let mut world = Self {
            seed,
            registry: EntityRegistry::new(config.max_entities),
            config,
            materials,
            archetypes,
            generator,
            scheduler,
            dimensions,
            active,
            player: EntityId::NONE,
            last_load_chunk: None,
            debug: DebugFlags::empty(),
            ticks: 0,
            rng: Xoshiro256StarStar::seed_from_u64(seed as u64 ^ AI_SALT),
            last_stats: TickStats::default(),
        };

        world.player = world.spawn_player()?;
        world.load_around_player()?;
        log::info!(
            "World created: seed {seed}, {} dimensions, {} chunks loaded around the player",
            world.dimensions.len(),
            world.dimension(active).map_or(0, |dim| dim.chunks().len())
        );
        Ok(world)
    }

    fn spawn_player(&mut self) -> Result<EntityId, WorldError> {
        let ground_y = match self.active {
            DimensionId::Overworld => self.generator.surface_y(0) + 1,
            DimensionId::Waterworld => self.config.terrain.sea_level + 1,
        };
        let def = self.archetypes.get(Archetype::Player);
        let position = def.standing_position(0.0, ground_y as f64);
        let dimension = self
            .dimensions
            .get_mut(&self.active)
            .ok_or(WorldError::UnknownDimension(self.active))?;
        let id = self.registry.create(def, dimension, position)?;
        log::info!("Player {id} starts at ({}, {})", position.x, position.y);
        Ok(id)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn materials(&self) -> &Arc<MaterialTable> {
        &self.materials
    }

    pub fn archetypes(&self) -> &ArchetypeTable {
        &self.archetypes
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn active_dimension(&self) -> DimensionId {
        self.active
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.get(id)
    }

    pub fn player_entity(&self) -> Option<&Entity> {
        self.registry.get(self.player)
    }

    pub fn dimension(&self, id: DimensionId) -> Option<&Dimension> {
        self.dimensions.get(&id)
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Automaton counters of the last tick
    pub fn last_stats(&self) -> TickStats {
        self.last_stats
    }

    /// Add to an entity's acceleration
    pub fn apply_acceleration(&mut self, id: EntityId, delta: Vec2) -> Result<(), WorldError> {
        let entity = self
            .registry
            .get_mut(id)
            .ok_or(WorldError::StaleEntity(id))?;
        entity.acceleration += delta;
        Ok(())
    }

    /// Translate held movement keys into player acceleration
    pub fn apply_input(&mut self, input: &InputState) {
        if let Some(player) = self.registry.get_mut(self.player) {
            input.apply(player, &self.config.movement, self.config.physics.gravity);
        }
    }

    pub fn toggle_debug(&mut self, flags: DebugFlags) {
        self.debug.toggle(flags);
        log::info!("Debug flags now {:?}", self.debug);
    }

    /// Overwrite one cell with `material`, shaded like generated cells
    ///
    /// Returns false if the cell's chunk is not loaded.
    pub fn set_cell_at(
        &mut self,
        dimension: DimensionId,
        world_x: i64,
        world_y: i64,
        material: u16,
    ) -> Result<bool, WorldError> {
        let def = self.materials.get(material);
        let cell = Cell::new(def.id, def.shade(cell_hash(world_x, world_y, self.seed)));
        let dim = self
            .dimensions
            .get_mut(&dimension)
            .ok_or(WorldError::UnknownDimension(dimension))?;
        let written = dim.set_cell_at(world_x, world_y, cell);
        log::trace!("Set ({world_x}, {world_y}) in {dimension:?} to {}", def.name);
        Ok(written)
    }

    /// Cell colors and materials around `center` for the renderer
    pub fn cell_window(
        &self,
        dimension: DimensionId,
        center: ChunkCoord,
        radius: i32,
    ) -> Result<CellWindow, WorldError> {
        let dim = self
            .dimensions
            .get(&dimension)
            .ok_or(WorldError::UnknownDimension(dimension))?;
        let mut window = CellWindow::capture(dim, center, radius);
        if self.debug.contains(DebugFlags::SHOW_CHUNK_CORNERS) {
            window.mark_chunk_corners();
        }
        Ok(window)
    }

    /// Render-indexed entities of a dimension, ascending z depth
    pub fn render_order(
        &self,
        dimension: DimensionId,
    ) -> Result<impl Iterator<Item = EntityId> + '_, WorldError> {
        self.dimensions
            .get(&dimension)
            .map(Dimension::render_order)
            .ok_or(WorldError::UnknownDimension(dimension))
    }

    /// Create an entity from its archetype template
    pub fn spawn(
        &mut self,
        archetype: Archetype,
        dimension: DimensionId,
        position: DVec2,
    ) -> Result<EntityId, WorldError> {
        let dim = self
            .dimensions
            .get_mut(&dimension)
            .ok_or(WorldError::UnknownDimension(dimension))?;
        self.registry
            .create(self.archetypes.get(archetype), dim, position)
    }

    /// Remove an entity from its dimension and free its id
    pub fn destroy(&mut self, id: EntityId) -> Result<Entity, WorldError> {
        let dimension = self
            .registry
            .get(id)
            .ok_or(WorldError::StaleEntity(id))?
            .dimension;
        let dim = self
            .dimensions
            .get_mut(&dimension)
            .ok_or(WorldError::UnknownDimension(dimension))?;
        self.registry.destroy(id, dim)
    }

    /// Generate every missing chunk in the square of `radius` around
    /// `center` and place the entities they request
    ///
    /// Returns the number of chunks generated.
    pub fn load_chunks_square(
        &mut self,
        dimension: DimensionId,
        center: ChunkCoord,
        radius: i32,
    ) -> Result<usize, WorldError> {
        let dim = self
            .dimensions
            .get_mut(&dimension)
            .ok_or(WorldError::UnknownDimension(dimension))?;

        let mut generated = 0;
        let mut spawned = 0;
        for coord in center.square(radius) {
            if dim.is_loaded(coord) {
                continue;
            }
            let chunk = self.generator.generate_chunk(dimension, coord);
            dim.insert_chunk(chunk.chunk);
            generated += 1;
            for request in &chunk.spawns {
                if place_spawn(&mut self.registry, &self.archetypes, dim, request) {
                    spawned += 1;
                }
            }
        }

        if generated > 0 {
            log::info!(
                "Loaded {generated} chunks around {center:?} in {dimension:?}, {spawned} entities spawned"
            );
        }
        Ok(generated)
    }

    /// Reload chunks when the player has moved to another chunk
    fn load_around_player(&mut self) -> Result<(), WorldError> {
        let Some(player) = self.registry.get(self.player) else {
            return Ok(());
        };
        let center = chunk_of(player.position.x, player.position.y);
        if self.last_load_chunk == Some(center) {
            return Ok(());
        }
        self.load_chunks_square(self.active, center, self.config.load_radius)?;
        self.last_load_chunk = Some(center);
        Ok(())
    }

    /// Run one simulation tick
    ///
    /// AI, physics, health, chunk loading, then the automaton over the
    /// chunks within `sim_radius` of the player, then animation.
    pub fn tick(&mut self) -> Result<TickStats, WorldError> {
        self.ticks += 1;

        self.update_ai()?;
        self.update_physics()?;
        self.update_health()?;
        self.load_around_player()?;

        let stats = if self.debug.contains(DebugFlags::FREEZE_CELLS) {
            TickStats::default()
        } else {
            self.update_cells()?
        };

        self.advance_animations()?;

        self.last_stats = stats;
        log::debug!(
            "Tick {}: {} chunks stepped, {} cells moved, {} phase changes",
            self.ticks,
            stats.chunks_processed,
            stats.cells_moved,
            stats.phase_changes
        );
        Ok(stats)
    }

    fn update_ai(&mut self) -> Result<(), WorldError> {
        let dim = self
            .dimensions
            .get(&self.active)
            .ok_or(WorldError::UnknownDimension(self.active))?;
        for &id in dim.ai() {
            if let Some(entity) = self.registry.get_mut(id) {
                AiSystem::update(entity, &mut self.rng);
            }
        }
        Ok(())
    }

    fn update_physics(&mut self) -> Result<(), WorldError> {
        let dim = self
            .dimensions
            .get(&self.active)
            .ok_or(WorldError::UnknownDimension(self.active))?;
        let physics = &self.config.physics;

        // Move everything first, then resolve against the cells
        for &id in dim.kinetic() {
            if let Some(entity) = self.registry.get_mut(id) {
                EntityPhysicsSystem::integrate(entity, &self.materials, physics);
            }
        }
        for &id in dim.kinetic() {
            if let Some(entity) = self.registry.get_mut(id) {
                EntityPhysicsSystem::resolve(entity, dim, &self.materials, physics);
            }
        }
        Ok(())
    }

    fn update_health(&mut self) -> Result<(), WorldError> {
        let deathless_player = self.debug.contains(DebugFlags::DEATHLESS_PLAYER);
        let dim = self
            .dimensions
            .get_mut(&self.active)
            .ok_or(WorldError::UnknownDimension(self.active))?;

        let mut dead = Vec::new();
        for &id in dim.health() {
            if let Some(entity) = self.registry.get_mut(id) {
                let forced = deathless_player && id == self.player;
                if HealthSystem::update(entity, forced) == HealthOutcome::Died {
                    dead.push(id);
                }
            }
        }

        for id in dead {
            if id == self.player {
                if let Some(player) = self.registry.get_mut(id) {
                    player.respawn();
                    log::info!(
                        "Player died, respawned at ({}, {})",
                        player.position.x,
                        player.position.y
                    );
                }
            } else {
                let entity = self.registry.destroy(id, dim)?;
                log::debug!("{:?} {id} died", entity.archetype);
            }
        }
        Ok(())
    }

    fn update_cells(&mut self) -> Result<TickStats, WorldError> {
        let Some(center) = self
            .registry
            .get(self.player)
            .map(|player| chunk_of(player.position.x, player.position.y))
        else {
            return Ok(TickStats::default());
        };
        let active: Vec<ChunkCoord> = center.square(self.config.sim_radius).collect();
        let tick_seed = ((self.seed as u64) << 32) ^ self.ticks;

        let dim = self
            .dimensions
            .get_mut(&self.active)
            .ok_or(WorldError::UnknownDimension(self.active))?;
        Ok(self
            .scheduler
            .run(dim.chunks_mut(), &active, &self.materials, tick_seed))
    }

    fn advance_animations(&mut self) -> Result<(), WorldError> {
        let dim = self
            .dimensions
            .get(&self.active)
            .ok_or(WorldError::UnknownDimension(self.active))?;
        for &id in dim.entities() {
            if let Some(entity) = self.registry.get_mut(id)
                && entity.status.contains(EntityStatus::ANIMATED)
            {
                entity.animation.advance();
            }
        }
        Ok(())
    }
}

/// Place the first candidate of `request` that keeps its archetype's
/// spacing; returns whether anything was created
fn place_spawn(
    registry: &mut EntityRegistry,
    archetypes: &ArchetypeTable,
    dimension: &mut Dimension,
    request: &SpawnRequest,
) -> bool {
    for &archetype in &request.candidates {
        let def = archetypes.get(archetype);
        let position = def.standing_position(request.x, request.ground_y);
        let crowded = dimension.entities().iter().any(|&id| {
            registry.get(id).is_some_and(|other| {
                other.archetype == archetype
                    && (other.position.x - position.x).abs() < def.min_spacing
            })
        });
        if crowded {
            continue;
        }

        return match registry.create(def, dimension, position) {
            Ok(_) => true,
            Err(err) => {
                log::warn!("Skipped {archetype:?} spawn at x {}: {err}", request.x);
                false
            }
        };
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PhysicsParams, ScheduleStrategy};
    use smallvec::smallvec;
    use yellowcopper_simulation::MaterialId;

    fn small_config() -> SimConfig {
        SimConfig {
            threads: 2,
            sim_radius: 1,
            load_radius: 2,
            max_entities: 1_000,
            ..SimConfig::default()
        }
    }

    fn world(seed: u32) -> World {
        let config = small_config();
        let archetypes = ArchetypeTable::builtin(&config.physics);
        World::new(Some(seed), config, Arc::new(MaterialTable::builtin()), archetypes).unwrap()
    }

    #[test]
    fn test_new_world_places_player_and_loads_chunks() {
        let world = world(0);
        let player = world.player_entity().unwrap();
        assert_eq!(player.archetype, Archetype::Player);

        let center = chunk_of(player.position.x, player.position.y);
        let dim = world.dimension(DimensionId::Overworld).unwrap();
        for coord in center.square(2) {
            assert!(dim.is_loaded(coord), "{coord:?} not loaded");
        }
        assert!(dim.kinetic().contains(&world.player()));
    }

    #[test]
    fn test_invalid_config_fails_setup() {
        let config = SimConfig {
            threads: 0,
            ..small_config()
        };
        let result = World::new(
            Some(0),
            config,
            Arc::new(MaterialTable::builtin()),
            ArchetypeTable::builtin(&PhysicsParams::default()),
        );
        assert!(matches!(result, Err(WorldError::Config(_))));
    }

    #[test]
    fn test_unknown_dimension_is_rejected() {
        let config = SimConfig {
            dimensions: vec![DimensionId::Overworld],
            ..small_config()
        };
        let archetypes = ArchetypeTable::builtin(&config.physics);
        let mut world =
            World::new(Some(1), config, Arc::new(MaterialTable::builtin()), archetypes).unwrap();

        assert!(matches!(
            world.set_cell_at(DimensionId::Waterworld, 0, 0, MaterialId::SAND),
            Err(WorldError::UnknownDimension(DimensionId::Waterworld))
        ));
        assert!(world.cell_window(DimensionId::Waterworld, ChunkCoord::new(0, 0), 0).is_err());
        assert!(world.render_order(DimensionId::Waterworld).is_err());
    }

    #[test]
    fn test_player_settles_on_ground() {
        let mut world = world(3);
        for _ in 0..120 {
            world.tick().unwrap();
        }
        let player = world.player_entity().unwrap();
        assert!(player.is_grounded() || player.is_submerged());
        assert!(!player.is_dead());
    }

    #[test]
    fn test_set_cell_at_writes_loaded_cells_only() {
        let mut world = world(0);
        let player = world.player_entity().unwrap();
        let x = player.position.x as i64;
        let y = player.position.y as i64 + 5;

        assert!(world.set_cell_at(DimensionId::Overworld, x, y, MaterialId::LAVA).unwrap());
        let dim = world.dimension(DimensionId::Overworld).unwrap();
        let cell = dim.cell_at_world_pos(x, y).unwrap();
        assert_eq!(cell.material_id, MaterialId::LAVA);
        let expected = world
            .materials()
            .get(MaterialId::LAVA)
            .shade(cell_hash(x, y, world.seed()));
        assert_eq!(cell.color, expected);

        // Far outside the load radius
        assert!(!world
            .set_cell_at(DimensionId::Overworld, x + 100_000, y, MaterialId::LAVA)
            .unwrap());
    }

    #[test]
    fn test_apply_acceleration_and_stale_ids() {
        let mut world = world(0);
        let player = world.player();
        world.apply_acceleration(player, Vec2::new(0.5, 0.0)).unwrap();
        assert_eq!(world.player_entity().unwrap().acceleration.x, 0.5);

        let critter = world
            .spawn(Archetype::Critter, DimensionId::Overworld, DVec2::new(0.0, 500.0))
            .unwrap();
        world.destroy(critter).unwrap();
        assert!(matches!(
            world.apply_acceleration(critter, Vec2::ONE),
            Err(WorldError::StaleEntity(_))
        ));
    }

    #[test]
    fn test_freeze_cells_skips_automaton() {
        let mut world = world(0);
        let player = world.player_entity().unwrap();
        let x = player.position.x as i64;
        let y = player.position.y as i64 + 20;
        assert!(world.set_cell_at(DimensionId::Overworld, x, y, MaterialId::SAND).unwrap());

        world.toggle_debug(DebugFlags::FREEZE_CELLS);
        let stats = world.tick().unwrap();
        assert_eq!(stats, TickStats::default());
        let dim = world.dimension(DimensionId::Overworld).unwrap();
        assert_eq!(dim.cell_at_world_pos(x, y).unwrap().material_id, MaterialId::SAND);

        world.toggle_debug(DebugFlags::FREEZE_CELLS);
        let stats = world.tick().unwrap();
        assert!(stats.cells_moved > 0);
    }

    #[test]
    fn test_deathless_player_flag() {
        let mut world = world(0);
        let player = world.player();
        world.toggle_debug(DebugFlags::DEATHLESS_PLAYER);
        world.registry.get_mut(player).unwrap().health = -10.0;
        world.tick().unwrap();
        assert_eq!(world.player_entity().unwrap().health, 1.0);
    }

    #[test]
    fn test_player_respawns_after_death() {
        let mut world = world(0);
        let player = world.player();
        let respawn = world.player_entity().unwrap().respawn;
        world.registry.get_mut(player).unwrap().health = -10.0;
        world.tick().unwrap();

        let entity = world.player_entity().unwrap();
        assert!(!entity.is_dead());
        assert_eq!(entity.position, respawn);
        assert_eq!(entity.health, entity.max_health);
    }

    #[test]
    fn test_dead_creatures_are_destroyed() {
        let mut world = world(0);
        let position = world.player_entity().unwrap().position;
        let critter = world
            .spawn(Archetype::Critter, DimensionId::Overworld, position)
            .unwrap();
        world.registry.get_mut(critter).unwrap().health = 0.0;
        world.tick().unwrap();
        assert!(world.entity(critter).is_none());
        let dim = world.dimension(DimensionId::Overworld).unwrap();
        assert!(!dim.entities().contains(&critter));
    }

    #[test]
    fn test_spawn_spacing_rejects_crowded_candidates() {
        let mut registry = EntityRegistry::new(100);
        let archetypes = ArchetypeTable::builtin(&PhysicsParams::default());
        let mut dim = Dimension::new(DimensionId::Overworld);
        let request = |x: f64| SpawnRequest {
            candidates: smallvec![Archetype::Bush, Archetype::Grass],
            x,
            ground_y: 10.0,
        };

        assert!(place_spawn(&mut registry, &archetypes, &mut dim, &request(0.0)));
        // Too close to the bush, falls back to grass
        assert!(place_spawn(&mut registry, &archetypes, &mut dim, &request(5.0)));
        // Both crowded
        assert!(!place_spawn(&mut registry, &archetypes, &mut dim, &request(6.0)));

        let kinds: Vec<_> = registry.iter().map(|(_, e)| e.archetype).collect();
        assert_eq!(kinds, vec![Archetype::Bush, Archetype::Grass]);
    }

    #[test]
    fn test_spawn_skipped_when_pool_full() {
        let mut registry = EntityRegistry::new(2);
        let archetypes = ArchetypeTable::builtin(&PhysicsParams::default());
        let mut dim = Dimension::new(DimensionId::Overworld);
        let request = |x: f64| SpawnRequest {
            candidates: smallvec![Archetype::Tree],
            x,
            ground_y: 0.0,
        };

        assert!(place_spawn(&mut registry, &archetypes, &mut dim, &request(0.0)));
        assert!(!place_spawn(&mut registry, &archetypes, &mut dim, &request(1_000.0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_checkerboard_world_ticks() {
        let config = SimConfig {
            schedule: ScheduleStrategy::Checkerboard,
            ..small_config()
        };
        let archetypes = ArchetypeTable::builtin(&config.physics);
        let mut world =
            World::new(Some(5), config, Arc::new(MaterialTable::builtin()), archetypes).unwrap();
        let stats = world.tick().unwrap();
        assert_eq!(stats.chunks_processed, 9);
    }

    #[test]
    fn test_chunk_corner_overlay_follows_flag() {
        let mut world = world(0);
        let center = ChunkCoord::new(0, 40);
        world.load_chunks_square(DimensionId::Overworld, center, 0).unwrap();

        let plain = world.cell_window(DimensionId::Overworld, center, 0).unwrap();
        world.toggle_debug(DebugFlags::SHOW_CHUNK_CORNERS);
        let marked = world.cell_window(DimensionId::Overworld, center, 0).unwrap();
        assert_ne!(plain, marked);
        assert_eq!(
            marked.pixel(0, marked.size - 1),
            crate::world::render_view::CORNER_MARK
        );
    }
}
