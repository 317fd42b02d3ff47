//! Cellular automata update logic - material movement rules
//!
//! Each mobile material state has one `CellBehavior`. A chunk pass walks
//! the chunk bottom to top and hands every unmoved cell to the behavior
//! of its material's state.

use yellowcopper_simulation::{MaterialDef, MaterialState, MaterialTable, cell_flags};

use super::{CHUNK_WIDTH, Cell, CellGrid, ChunkCoord, SimStats, WorldRng, local_to_world};

/// Powders only sink into cells below this solidity
pub const POWDER_DISPLACE_SOLIDITY: i32 = 200;

/// Gases may enter cells up to this much denser than themselves
pub const GAS_SOLIDITY_ALLOWANCE: i32 = 60;

/// One in this many gas steps tries to rise two cells at once
pub const GAS_SKIP_CHANCE: u32 = 4;

/// Lateral search never reaches further than this; keeps every rule
/// within half a chunk of the chunk being processed
pub const MAX_LATERAL_REACH: u32 = (CHUNK_WIDTH / 2 - 1) as u32;

/// The cell a behavior is asked to step
pub struct CellStep<'s, 'a> {
    pub grid: &'s CellGrid<'a>,
    pub materials: &'s MaterialTable,
    pub x: i64,
    pub y: i64,
    pub cell: Cell,
    pub def: &'s MaterialDef,
}

/// Movement rule for one material state
pub trait CellBehavior: Sync {
    /// Step the cell once; returns true if anything changed
    fn step(&self, step: &CellStep, rng: &mut dyn WorldRng, stats: &mut dyn SimStats) -> bool;
}

/// Falls, then slides down one of the diagonals
pub struct PowderBehavior;

/// Falls or sublimates, then spreads sideways
pub struct LiquidBehavior;

/// Rises, then spreads sideways
pub struct GasBehavior;

static POWDER: PowderBehavior = PowderBehavior;
static LIQUID: LiquidBehavior = LiquidBehavior;
static GAS: GasBehavior = GasBehavior;

/// Behavior table keyed by material state; static materials have none
pub fn behavior_for(state: MaterialState) -> Option<&'static dyn CellBehavior> {
    match state {
        MaterialState::Static => None,
        MaterialState::Powder => Some(&POWDER),
        MaterialState::Liquid => Some(&LIQUID),
        MaterialState::Gas => Some(&GAS),
    }
}

impl CellBehavior for PowderBehavior {
    fn step(&self, step: &CellStep, rng: &mut dyn WorldRng, stats: &mut dyn SimStats) -> bool {
        let enters = |target: &MaterialDef| target.solidity < POWDER_DISPLACE_SOLIDITY;

        // Try to move down
        if try_move(step, step.x, step.y - 1, enters, stats) {
            return true;
        }

        // Try diagonal dispersal (random direction), then the opposite one
        let dx = if rng.gen_bool() { -1 } else { 1 };
        try_move(step, step.x + dx, step.y - 1, enters, stats)
            || try_move(step, step.x - dx, step.y - 1, enters, stats)
    }
}

impl CellBehavior for LiquidBehavior {
    fn step(&self, step: &CellStep, rng: &mut dyn WorldRng, stats: &mut dyn SimStats) -> bool {
        // Phase change on a hot material below
        if let Some(sublimation) = step.def.sublimation
            && let Some(below) = step.grid.get(step.x, step.y - 1)
            && step.materials.get(below.material_id).passive_heat > sublimation.threshold
        {
            let product = step.materials.get(sublimation.product);
            let mut cell = Cell::new(product.id, product.shade(rng.gen_u32() as u16));
            cell.flags |= cell_flags::UPDATED;
            step.grid.set(step.x, step.y, cell);
            stats.record_phase_change();
            return true;
        }

        let own = step.def.solidity;
        let enters = move |target: &MaterialDef| target.solidity < own;

        // Try to move down first
        if try_move(step, step.x, step.y - 1, enters, stats) {
            return true;
        }

        spread(step, enters, rng, stats)
    }
}

impl CellBehavior for GasBehavior {
    fn step(&self, step: &CellStep, rng: &mut dyn WorldRng, stats: &mut dyn SimStats) -> bool {
        let limit = step.def.solidity + GAS_SOLIDITY_ALLOWANCE;
        let enters = move |target: &MaterialDef| target.solidity < limit;

        // Occasionally skip a cell, if the one in between is passable
        if rng.one_in(GAS_SKIP_CHANCE)
            && let Some(between) = step.grid.get(step.x, step.y + 1)
            && (between.material_id == step.cell.material_id
                || enters(step.materials.get(between.material_id)))
            && try_move(step, step.x, step.y + 2, enters, stats)
        {
            return true;
        }

        // Try to move up
        if try_move(step, step.x, step.y + 1, enters, stats) {
            return true;
        }

        spread(step, enters, rng, stats)
    }
}

/// Swap the stepped cell with the target if `enters` accepts its material
///
/// The mover is flagged so it is not stepped again this tick.
fn try_move(
    step: &CellStep,
    target_x: i64,
    target_y: i64,
    enters: impl Fn(&MaterialDef) -> bool,
    stats: &mut dyn SimStats,
) -> bool {
    let Some(target) = step.grid.get(target_x, target_y) else {
        return false;
    };
    if target.material_id == step.cell.material_id
        || !enters(step.materials.get(target.material_id))
    {
        return false;
    }

    let mut mover = step.cell;
    mover.flags |= cell_flags::UPDATED;
    step.grid.set(target_x, target_y, mover);
    step.grid.set(step.x, step.y, target);
    stats.record_cell_moved();
    true
}

/// Lateral search in one random direction
///
/// Reach is `(rand % viscosity) + 1` cells. The search passes through cells
/// of the same material and stops at the first other cell it cannot enter.
fn spread(
    step: &CellStep,
    enters: impl Fn(&MaterialDef) -> bool,
    rng: &mut dyn WorldRng,
    stats: &mut dyn SimStats,
) -> bool {
    let viscosity = step.def.viscosity.max(1) as u32;
    let reach = (rng.gen_below(viscosity) + 1).min(MAX_LATERAL_REACH) as i64;
    let dir = if rng.gen_bool() { -1 } else { 1 };

    for distance in 1..=reach {
        let target_x = step.x + dir * distance;
        let Some(target) = step.grid.get(target_x, step.y) else {
            return false;
        };
        if target.material_id == step.cell.material_id {
            continue;
        }
        return try_move(step, target_x, step.y, &enters, stats);
    }
    false
}

/// Cellular automata updater - runs the movement rules over chunks
pub struct CellularAutomataUpdater;

impl CellularAutomataUpdater {
    /// Step every mobile cell of one chunk
    ///
    /// Uniform chunks of a static material are skipped; uniform chunks of a
    /// mobile material only step their border cells, the only ones with
    /// anything other than their own material next to them.
    pub fn update_chunk<R: WorldRng>(
        grid: &CellGrid,
        coord: ChunkCoord,
        materials: &MaterialTable,
        stats: &mut dyn SimStats,
        rng: &mut R,
    ) {
        let Some(chunk) = grid.chunk(coord) else {
            return;
        };

        match chunk.homogeneous() {
            Some(material) if !materials.get(material).state.is_mobile() => {}
            Some(_) => {
                for (x, y) in border_cells() {
                    Self::update_cell(grid, coord, x, y, materials, stats, rng);
                }
            }
            None => {
                // Bottom to top, alternating row direction from a random start
                let mut left_to_right = rng.gen_bool();
                for y in 0..CHUNK_WIDTH {
                    for i in 0..CHUNK_WIDTH {
                        let x = if left_to_right { i } else { CHUNK_WIDTH - 1 - i };
                        Self::update_cell(grid, coord, x, y, materials, stats, rng);
                    }
                    left_to_right = !left_to_right;
                }
            }
        }
    }

    /// Step one cell by its material's behavior
    pub fn update_cell<R: WorldRng>(
        grid: &CellGrid,
        coord: ChunkCoord,
        x: usize,
        y: usize,
        materials: &MaterialTable,
        stats: &mut dyn SimStats,
        rng: &mut R,
    ) -> bool {
        let (world_x, world_y) = local_to_world(coord, x, y);
        let Some(cell) = grid.get(world_x, world_y) else {
            return false;
        };
        if cell.is_updated() {
            return false;
        }

        let def = materials.get(cell.material_id);
        let Some(behavior) = behavior_for(def.state) else {
            return false;
        };
        let step = CellStep {
            grid,
            materials,
            x: world_x,
            y: world_y,
            cell,
            def,
        };
        behavior.step(&step, rng, stats)
    }
}

/// Perimeter cells of a chunk, bottom row first
fn border_cells() -> impl Iterator<Item = (usize, usize)> {
    let last = CHUNK_WIDTH - 1;
    (0..CHUNK_WIDTH).flat_map(move |y| {
        let row: Box<dyn Iterator<Item = usize>> = if y == 0 || y == last {
            Box::new(0..CHUNK_WIDTH)
        } else {
            Box::new([0, last].into_iter())
        };
        row.map(move |x| (x, y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CHUNK_CELLS, Chunk, ChunkMap, NoopStats, TickStats};
    use std::collections::VecDeque;
    use yellowcopper_simulation::MaterialId;

    /// Test RNG replaying a script of values, then repeating a default
    struct TestRng {
        bools: VecDeque<bool>,
        default_bool: bool,
        u32_value: u32,
    }

    impl TestRng {
        fn new(default_bool: bool) -> Self {
            Self {
                bools: VecDeque::new(),
                default_bool,
                u32_value: 1,
            }
        }

        fn with_u32(mut self, value: u32) -> Self {
            self.u32_value = value;
            self
        }
    }

    impl WorldRng for TestRng {
        fn gen_bool(&mut self) -> bool {
            self.bools.pop_front().unwrap_or(self.default_bool)
        }

        fn gen_u32(&mut self) -> u32 {
            self.u32_value
        }
    }

    fn cell(material: u16) -> Cell {
        Cell::new(material, [0, 0, 0, 255])
    }

    fn air_chunks(coords: &[(i32, i32)]) -> ChunkMap {
        coords
            .iter()
            .map(|&(x, y)| {
                let coord = ChunkCoord::new(x, y);
                (coord, Chunk::new(coord))
            })
            .collect()
    }

    fn step_at(chunks: &mut ChunkMap, x: i64, y: i64, rng: &mut TestRng) -> bool {
        let materials = MaterialTable::builtin();
        let grid = CellGrid::exclusive(chunks);
        let (coord, lx, ly) = crate::world::world_to_local(x, y);
        CellularAutomataUpdater::update_cell(
            &grid,
            coord,
            lx,
            ly,
            &materials,
            &mut NoopStats,
            rng,
        )
    }

    fn material(chunks: &ChunkMap, x: i64, y: i64) -> u16 {
        let (coord, lx, ly) = crate::world::world_to_local(x, y);
        chunks[&coord].get_cell(lx, ly).material_id
    }

    fn put(chunks: &mut ChunkMap, x: i64, y: i64, material: u16) {
        let (coord, lx, ly) = crate::world::world_to_local(x, y);
        chunks.get_mut(&coord).unwrap().set_cell(lx, ly, cell(material));
    }

    #[test]
    fn test_behavior_table_by_state() {
        assert!(behavior_for(MaterialState::Static).is_none());
        assert!(behavior_for(MaterialState::Powder).is_some());
        assert!(behavior_for(MaterialState::Liquid).is_some());
        assert!(behavior_for(MaterialState::Gas).is_some());
    }

    #[test]
    fn test_powder_falls_down() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 32, 10, MaterialId::SAND);

        assert!(step_at(&mut chunks, 32, 10, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 32, 9), MaterialId::SAND);
        assert_eq!(material(&chunks, 32, 10), MaterialId::AIR);
    }

    #[test]
    fn test_powder_falls_across_chunk_border() {
        let mut chunks = air_chunks(&[(0, 0), (0, -1)]);
        put(&mut chunks, 5, 0, MaterialId::SAND);

        assert!(step_at(&mut chunks, 5, 0, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 5, -1), MaterialId::SAND);
        assert_eq!(chunks[&ChunkCoord::new(0, -1)].homogeneous(), None);
    }

    #[test]
    fn test_powder_slides_diagonally() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 32, 10, MaterialId::SAND);
        put(&mut chunks, 32, 9, MaterialId::DIRT);

        // gen_bool true => dx = -1 first
        assert!(step_at(&mut chunks, 32, 10, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 31, 9), MaterialId::SAND);
    }

    #[test]
    fn test_powder_tries_other_diagonal() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 32, 10, MaterialId::SAND);
        put(&mut chunks, 32, 9, MaterialId::DIRT);
        put(&mut chunks, 31, 9, MaterialId::DIRT);

        assert!(step_at(&mut chunks, 32, 10, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 33, 9), MaterialId::SAND);
    }

    #[test]
    fn test_powder_blocked() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 32, 10, MaterialId::SAND);
        for x in 31..=33 {
            put(&mut chunks, x, 9, MaterialId::GOLD);
        }

        assert!(!step_at(&mut chunks, 32, 10, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 32, 10), MaterialId::SAND);
    }

    #[test]
    fn test_powder_sinks_through_water() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 32, 10, MaterialId::SAND);
        put(&mut chunks, 32, 9, MaterialId::WATER);

        assert!(step_at(&mut chunks, 32, 10, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 32, 9), MaterialId::SAND);
        assert_eq!(material(&chunks, 32, 10), MaterialId::WATER);
    }

    #[test]
    fn test_unloaded_below_is_a_wall() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 10, 0, MaterialId::SAND);

        assert!(!step_at(&mut chunks, 10, 0, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 10, 0), MaterialId::SAND);
    }

    #[test]
    fn test_liquid_falls_down() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 20, 20, MaterialId::WATER);

        assert!(step_at(&mut chunks, 20, 20, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 20, 19), MaterialId::WATER);
    }

    #[test]
    fn test_liquid_spreads_within_viscosity() {
        let mut chunks = air_chunks(&[(0, 0)]);
        for x in 10..30 {
            put(&mut chunks, x, 19, MaterialId::DIRT);
        }
        for x in 15..=20 {
            put(&mut chunks, x, 20, MaterialId::WATER);
        }

        // reach = (4 % 8) + 1 = 5; from x = 15 rightward every cell is water
        let mut rng = TestRng::new(false).with_u32(4);
        assert!(!step_at(&mut chunks, 15, 20, &mut rng));

        // from the right edge the first step is air
        let mut rng = TestRng::new(false).with_u32(4);
        assert!(step_at(&mut chunks, 20, 20, &mut rng));
        assert_eq!(material(&chunks, 21, 20), MaterialId::WATER);
        assert_eq!(material(&chunks, 20, 20), MaterialId::AIR);
    }

    #[test]
    fn test_liquid_stops_at_walls() {
        let mut chunks = air_chunks(&[(0, 0)]);
        for x in 10..30 {
            put(&mut chunks, x, 19, MaterialId::DIRT);
        }
        put(&mut chunks, 20, 20, MaterialId::WATER);
        put(&mut chunks, 21, 20, MaterialId::DIRT);

        let mut rng = TestRng::new(false).with_u32(7);
        assert!(!step_at(&mut chunks, 20, 20, &mut rng));
        assert_eq!(material(&chunks, 22, 20), MaterialId::AIR);
    }

    #[test]
    fn test_liquid_sublimates_on_hot_material() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 8, 8, MaterialId::WATER);
        put(&mut chunks, 8, 7, MaterialId::LAVA);

        let materials = MaterialTable::builtin();
        let grid = CellGrid::exclusive(&mut chunks);
        let mut stats = TickStats::default();
        assert!(CellularAutomataUpdater::update_cell(
            &grid,
            ChunkCoord::new(0, 0),
            8,
            8,
            &materials,
            &mut stats,
            &mut TestRng::new(true),
        ));
        assert_eq!(grid.get(8, 8).unwrap().material_id, MaterialId::STEAM);
        assert_eq!(grid.get(8, 7).unwrap().material_id, MaterialId::LAVA);
        assert_eq!(stats.phase_changes, 1);
        assert_eq!(stats.cells_moved, 0);
    }

    #[test]
    fn test_gas_rises() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 8, 8, MaterialId::STEAM);

        // u32 = 1 => never takes the skip
        assert!(step_at(&mut chunks, 8, 8, &mut TestRng::new(true)));
        assert_eq!(material(&chunks, 8, 9), MaterialId::STEAM);
    }

    #[test]
    fn test_gas_skip_rises_two() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 8, 8, MaterialId::STEAM);

        // u32 = 0 => one_in hits
        let mut rng = TestRng::new(true).with_u32(0);
        assert!(step_at(&mut chunks, 8, 8, &mut rng));
        assert_eq!(material(&chunks, 8, 10), MaterialId::STEAM);
        assert_eq!(material(&chunks, 8, 9), MaterialId::AIR);
    }

    #[test]
    fn test_gas_cannot_enter_water() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 8, 8, MaterialId::STEAM);
        for x in 0..20 {
            put(&mut chunks, x, 9, MaterialId::WATER);
        }
        put(&mut chunks, 7, 8, MaterialId::DIRT);
        put(&mut chunks, 9, 8, MaterialId::DIRT);

        assert!(!step_at(&mut chunks, 8, 8, &mut TestRng::new(true)));
    }

    #[test]
    fn test_moved_cell_is_not_stepped_again() {
        let mut chunks = air_chunks(&[(0, 0)]);
        put(&mut chunks, 8, 8, MaterialId::STEAM);
        assert!(step_at(&mut chunks, 8, 8, &mut TestRng::new(true)));
        assert!(!step_at(&mut chunks, 8, 9, &mut TestRng::new(true)));
    }

    #[test]
    fn test_static_chunk_is_skipped() {
        let coord = ChunkCoord::new(0, 0);
        let mut chunks: ChunkMap = [(coord, Chunk::filled(coord, cell(MaterialId::DIRT)))]
            .into_iter()
            .collect();
        let materials = MaterialTable::builtin();
        let grid = CellGrid::exclusive(&mut chunks);
        let mut stats = TickStats::default();
        CellularAutomataUpdater::update_chunk(
            &grid,
            coord,
            &materials,
            &mut stats,
            &mut TestRng::new(true),
        );
        assert_eq!(stats.cells_moved, 0);
    }

    #[test]
    fn test_uniform_water_chunk_only_moves_border() {
        let coord = ChunkCoord::new(0, 1);
        let below = ChunkCoord::new(0, 0);
        let mut chunks: ChunkMap = [
            (coord, Chunk::filled(coord, cell(MaterialId::WATER))),
            (below, Chunk::new(below)),
        ]
        .into_iter()
        .collect();

        let materials = MaterialTable::builtin();
        let mut stats = TickStats::default();
        {
            let grid = CellGrid::exclusive(&mut chunks);
            CellularAutomataUpdater::update_chunk(
                &grid,
                coord,
                &materials,
                &mut stats,
                &mut TestRng::new(true),
            );
        }

        // The whole bottom row fell into the chunk below
        assert!(stats.cells_moved >= CHUNK_WIDTH as u64);
        for x in 0..CHUNK_WIDTH {
            assert_eq!(chunks[&below].get_cell(x, CHUNK_WIDTH - 1).material_id, MaterialId::WATER);
        }
        assert_eq!(chunks[&coord].homogeneous(), None);

        // Interior cells were never stepped
        let interior = chunks[&coord].get_cell(CHUNK_WIDTH / 2, CHUNK_WIDTH / 2);
        assert_eq!(interior.material_id, MaterialId::WATER);
        assert!(!interior.is_updated());
        assert_eq!(
            chunks[&coord].material_counts()[&MaterialId::WATER]
                + chunks[&below].material_counts()[&MaterialId::WATER],
            CHUNK_CELLS
        );
    }

    #[test]
    fn test_border_cells_cover_perimeter() {
        let cells: Vec<_> = border_cells().collect();
        assert_eq!(cells.len(), 4 * CHUNK_WIDTH - 4);
        assert_eq!(cells[0], (0, 0));
        assert!(cells.contains(&(CHUNK_WIDTH - 1, CHUNK_WIDTH / 2)));
        assert!(!cells.contains(&(1, 1)));
    }
}
