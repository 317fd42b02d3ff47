//! Concurrent chunk scheduling for the automaton phase
//!
//! Active chunks are stepped on a rayon pool. Two chunks that touch (edge
//! or corner) never run at the same time, and no rule reaches more than
//! half a chunk outside its own chunk, so concurrently running chunks
//! never read or write the same cell.

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;
use std::collections::VecDeque;
use yellowcopper_simulation::MaterialTable;

use super::{CellGrid, CellularAutomataUpdater, ChunkCoord, ChunkMap, TickStats};
use crate::config::ScheduleStrategy;
use crate::error::WorldError;

/// Result of asking the work set for a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The chunk is now in flight and owned by the caller
    Claimed(ChunkCoord),
    /// Chunks remain but each touches one in flight
    Blocked,
    /// Nothing left to claim
    Drained,
}

#[derive(Debug, Default)]
struct WorkState {
    queue: VecDeque<ChunkCoord>,
    in_flight: Vec<ChunkCoord>,
}

/// Queue of chunks still to step plus the chunks being stepped
#[derive(Debug, Default)]
pub struct WorkSet {
    state: Mutex<WorkState>,
}

impl WorkSet {
    pub fn new(chunks: impl IntoIterator<Item = ChunkCoord>) -> Self {
        Self {
            state: Mutex::new(WorkState {
                queue: chunks.into_iter().collect(),
                in_flight: Vec::new(),
            }),
        }
    }

    /// Take the first queued chunk not touching any chunk in flight
    pub fn try_claim(&self) -> Claim {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            return Claim::Drained;
        }

        let free = state
            .queue
            .iter()
            .position(|coord| !state.in_flight.iter().any(|busy| busy.touches(*coord)));
        match free.and_then(|index| state.queue.remove(index)) {
            Some(coord) => {
                state.in_flight.push(coord);
                Claim::Claimed(coord)
            }
            None => Claim::Blocked,
        }
    }

    /// Release a claimed chunk
    pub fn finish(&self, coord: ChunkCoord) {
        let mut state = self.state.lock();
        if let Some(index) = state.in_flight.iter().position(|busy| *busy == coord) {
            state.in_flight.swap_remove(index);
        }
    }

    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn in_flight(&self) -> Vec<ChunkCoord> {
        self.state.lock().in_flight.clone()
    }
}

/// Per-chunk RNG seed; same tick seed and chunk always replay the same rolls
pub fn chunk_seed(tick_seed: u64, coord: ChunkCoord) -> u64 {
    let packed = ((coord.x as u32 as u64) << 32) | coord.y as u32 as u64;
    tick_seed ^ packed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Step one chunk through a shared grid
///
/// # Safety
/// No chunk touching `coord` may be stepped concurrently, and nobody may
/// hold a mutable reference into `chunks`.
unsafe fn step_chunk(
    chunks: &ChunkMap,
    coord: ChunkCoord,
    materials: &MaterialTable,
    tick_seed: u64,
    stats: &mut TickStats,
) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(chunk_seed(tick_seed, coord));
    // SAFETY: forwarded from the caller; every rule stays within half a
    // chunk of `coord`, so non-touching chunks access disjoint cells.
    let grid = unsafe { CellGrid::shared(chunks) };
    CellularAutomataUpdater::update_chunk(&grid, coord, materials, stats, &mut rng);
    stats.chunks_processed += 1;
}

/// Runs the automaton over the active chunks of a dimension
pub struct ChunkScheduler {
    pool: rayon::ThreadPool,
    threads: usize,
    strategy: ScheduleStrategy,
}

impl ChunkScheduler {
    pub fn new(threads: usize, strategy: ScheduleStrategy) -> Result<Self, WorldError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("automaton-{index}"))
            .build()?;
        log::debug!("Automaton scheduler: {threads} workers, {strategy:?}");
        Ok(Self {
            pool,
            threads,
            strategy,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn strategy(&self) -> ScheduleStrategy {
        self.strategy
    }

    /// Step every loaded chunk in `active` once
    ///
    /// Update flags are cleared first on the active chunks and their
    /// neighbours, the only cells a step can have flagged.
    pub fn run(
        &self,
        chunks: &mut ChunkMap,
        active: &[ChunkCoord],
        materials: &MaterialTable,
        tick_seed: u64,
    ) -> TickStats {
        let mut active: Vec<ChunkCoord> = active
            .iter()
            .copied()
            .filter(|coord| chunks.contains_key(coord))
            .collect();
        active.sort_unstable();
        active.dedup();

        let mut touched: ahash::HashSet<ChunkCoord> = ahash::HashSet::default();
        touched.extend(active.iter().flat_map(|coord| coord.square(1)));
        for coord in &touched {
            if let Some(chunk) = chunks.get_mut(coord) {
                chunk.clear_update_flags();
            }
        }

        let shared: &ChunkMap = chunks;
        let stats = match self.strategy {
            ScheduleStrategy::WorkSet => self.run_work_set(shared, &active, materials, tick_seed),
            ScheduleStrategy::Checkerboard => {
                self.run_checkerboard(shared, &active, materials, tick_seed)
            }
        };
        log::trace!(
            "Automaton: {} chunks, {} moves, {} phase changes, {} blocked claims",
            stats.chunks_processed,
            stats.cells_moved,
            stats.phase_changes,
            stats.blocked_claims
        );
        stats
    }

    fn run_work_set(
        &self,
        chunks: &ChunkMap,
        active: &[ChunkCoord],
        materials: &MaterialTable,
        tick_seed: u64,
    ) -> TickStats {
        let work = WorkSet::new(active.iter().copied());
        let totals = Mutex::new(TickStats::default());

        self.pool.scope(|scope| {
            for _ in 0..self.threads {
                scope.spawn(|_| {
                    let mut local = TickStats::default();
                    loop {
                        match work.try_claim() {
                            Claim::Claimed(coord) => {
                                // SAFETY: the work set never hands out a chunk
                                // touching one in flight.
                                unsafe { step_chunk(chunks, coord, materials, tick_seed, &mut local) };
                                work.finish(coord);
                            }
                            Claim::Blocked => {
                                local.blocked_claims += 1;
                                std::thread::yield_now();
                            }
                            Claim::Drained => break,
                        }
                    }
                    totals.lock().merge(&local);
                });
            }
        });

        totals.into_inner()
    }

    fn run_checkerboard(
        &self,
        chunks: &ChunkMap,
        active: &[ChunkCoord],
        materials: &MaterialTable,
        tick_seed: u64,
    ) -> TickStats {
        let mut totals = TickStats::default();
        for class in 0..4 {
            let batch: Vec<ChunkCoord> = active
                .iter()
                .copied()
                .filter(|coord| coord.color_class() == class)
                .collect();
            let stats = self.pool.install(|| {
                batch
                    .par_iter()
                    .fold(TickStats::default, |mut stats, &coord| {
                        // SAFETY: chunks of one parity class are two chunks
                        // apart on at least one axis, so none touch.
                        unsafe { step_chunk(chunks, coord, materials, tick_seed, &mut stats) };
                        stats
                    })
                    .reduce(TickStats::default, |mut a, b| {
                        a.merge(&b);
                        a
                    })
            });
            totals.merge(&stats);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Cell, Chunk};
    use yellowcopper_simulation::MaterialId;

    fn coords(list: &[(i32, i32)]) -> Vec<ChunkCoord> {
        list.iter().map(|&(x, y)| ChunkCoord::new(x, y)).collect()
    }

    /// Chunks with a layer of sand over air, stacked so sand falls across borders
    fn sandy_world(radius: i32) -> ChunkMap {
        let mut chunks = ChunkMap::default();
        for coord in ChunkCoord::new(0, 0).square(radius) {
            let mut chunk = Chunk::new(coord);
            for x in (0..crate::world::CHUNK_WIDTH).step_by(3) {
                chunk.set_cell(x, 40, Cell::new(MaterialId::SAND, [0, 0, 0, 255]));
                chunk.set_cell(x, 0, Cell::new(MaterialId::WATER, [0, 0, 0, 255]));
            }
            chunks.insert(coord, chunk);
        }
        chunks
    }

    fn totals(chunks: &ChunkMap) -> ahash::HashMap<u16, usize> {
        let mut totals = ahash::HashMap::default();
        for chunk in chunks.values() {
            for (material, count) in chunk.material_counts() {
                *totals.entry(material).or_insert(0) += count;
            }
        }
        totals
    }

    #[test]
    fn test_claim_skips_neighbours_of_in_flight() {
        let work = WorkSet::new(coords(&[(0, 0), (1, 1), (2, 0), (5, 5)]));

        assert_eq!(work.try_claim(), Claim::Claimed(ChunkCoord::new(0, 0)));
        // (1, 1) touches (0, 0) diagonally and is skipped
        assert_eq!(work.try_claim(), Claim::Claimed(ChunkCoord::new(2, 0)));
        assert_eq!(work.try_claim(), Claim::Claimed(ChunkCoord::new(5, 5)));
        assert_eq!(work.try_claim(), Claim::Blocked);

        work.finish(ChunkCoord::new(0, 0));
        assert_eq!(work.try_claim(), Claim::Blocked);
        work.finish(ChunkCoord::new(2, 0));
        assert_eq!(work.try_claim(), Claim::Claimed(ChunkCoord::new(1, 1)));
        assert_eq!(work.try_claim(), Claim::Drained);
    }

    #[test]
    fn test_in_flight_never_touch_interleaved() {
        // Single-threaded replay of many workers claiming and finishing
        let work = WorkSet::new(ChunkCoord::new(0, 0).square(4));
        let mut held: Vec<ChunkCoord> = Vec::new();
        let mut step = 0usize;

        loop {
            match work.try_claim() {
                Claim::Claimed(coord) => {
                    let in_flight = work.in_flight();
                    for (i, a) in in_flight.iter().enumerate() {
                        for b in &in_flight[i + 1..] {
                            assert!(!a.touches(*b), "{a:?} and {b:?} in flight together");
                        }
                    }
                    held.push(coord);
                }
                Claim::Blocked => {
                    assert!(!held.is_empty());
                    let coord = held.remove(step % held.len());
                    work.finish(coord);
                }
                Claim::Drained => break,
            }
            step += 1;
            // Finish something every third step to vary the interleaving
            if step % 3 == 0 && !held.is_empty() {
                let coord = held.remove(0);
                work.finish(coord);
            }
        }
        assert_eq!(work.queued(), 0);
    }

    #[test]
    fn test_chunk_seed_differs_per_chunk() {
        let a = chunk_seed(7, ChunkCoord::new(0, 1));
        let b = chunk_seed(7, ChunkCoord::new(1, 0));
        assert_ne!(a, b);
        assert_eq!(a, chunk_seed(7, ChunkCoord::new(0, 1)));
    }

    #[test]
    fn test_work_set_run_conserves_materials() {
        let mut chunks = sandy_world(2);
        let before = totals(&chunks);
        let active: Vec<_> = ChunkCoord::new(0, 0).square(2).collect();

        let scheduler = ChunkScheduler::new(4, ScheduleStrategy::WorkSet).unwrap();
        let materials = MaterialTable::builtin();
        let mut moved = 0;
        for tick in 0..20 {
            let stats = scheduler.run(&mut chunks, &active, &materials, tick);
            assert_eq!(stats.chunks_processed, active.len() as u64);
            moved += stats.cells_moved;
        }

        assert!(moved > 0);
        assert_eq!(totals(&chunks), before);
    }

    #[test]
    fn test_checkerboard_run_conserves_materials() {
        let mut chunks = sandy_world(2);
        let before = totals(&chunks);
        let active: Vec<_> = ChunkCoord::new(0, 0).square(2).collect();

        let scheduler = ChunkScheduler::new(3, ScheduleStrategy::Checkerboard).unwrap();
        let materials = MaterialTable::builtin();
        for tick in 0..20 {
            let stats = scheduler.run(&mut chunks, &active, &materials, tick);
            assert_eq!(stats.chunks_processed, active.len() as u64);
        }
        assert_eq!(totals(&chunks), before);
    }

    /// Stone floor, a lava pool, and a water layer resting on the lava
    fn boiling_world(radius: i32) -> ChunkMap {
        let mut chunks = ChunkMap::default();
        for coord in ChunkCoord::new(0, 0).square(radius) {
            let mut chunk = Chunk::new(coord);
            for x in 0..crate::world::CHUNK_WIDTH {
                chunk.set_cell(x, 0, Cell::new(MaterialId::STONE, [0, 0, 0, 255]));
                chunk.set_cell(x, 1, Cell::new(MaterialId::LAVA, [0, 0, 0, 255]));
                for y in 2..6 {
                    chunk.set_cell(x, y, Cell::new(MaterialId::WATER, [0, 0, 0, 255]));
                }
            }
            chunks.insert(coord, chunk);
        }
        chunks
    }

    #[test]
    fn test_boiling_converts_water_into_equal_steam() {
        let materials = MaterialTable::builtin();
        let active: Vec<_> = ChunkCoord::new(0, 0).square(1).collect();
        let count =
            |totals: &ahash::HashMap<u16, usize>, id: u16| totals.get(&id).copied().unwrap_or(0);

        for strategy in [ScheduleStrategy::WorkSet, ScheduleStrategy::Checkerboard] {
            let mut chunks = boiling_world(1);
            let before = totals(&chunks);
            let scheduler = ChunkScheduler::new(3, strategy).unwrap();

            let mut phase_changes = 0;
            for tick in 0..30 {
                phase_changes += scheduler.run(&mut chunks, &active, &materials, tick).phase_changes;
            }
            let after = totals(&chunks);

            let water_lost = count(&before, MaterialId::WATER) - count(&after, MaterialId::WATER);
            let steam_gained = count(&after, MaterialId::STEAM) - count(&before, MaterialId::STEAM);
            assert!(water_lost > 0, "{strategy:?}: nothing boiled");
            assert_eq!(water_lost, steam_gained, "{strategy:?}");
            assert_eq!(water_lost as u64, phase_changes, "{strategy:?}");

            for (&material, &n) in &before {
                if material != MaterialId::WATER && material != MaterialId::STEAM {
                    assert_eq!(count(&after, material), n, "{strategy:?}: material {material}");
                }
            }
        }
    }

    #[test]
    fn test_single_worker_is_deterministic() {
        let materials = MaterialTable::builtin();
        let active: Vec<_> = ChunkCoord::new(0, 0).square(1).collect();
        let scheduler = ChunkScheduler::new(1, ScheduleStrategy::WorkSet).unwrap();

        let mut a = sandy_world(1);
        let mut b = sandy_world(1);
        for tick in 0..10 {
            scheduler.run(&mut a, &active, &materials, tick);
            scheduler.run(&mut b, &active, &materials, tick);
        }
        for (coord, chunk) in &a {
            assert!(chunk.cells().eq(b[coord].cells()));
        }
    }

    #[test]
    fn test_unloaded_active_chunks_are_ignored() {
        let mut chunks = sandy_world(0);
        let scheduler = ChunkScheduler::new(2, ScheduleStrategy::WorkSet).unwrap();
        let stats = scheduler.run(
            &mut chunks,
            &coords(&[(0, 0), (9, 9)]),
            &MaterialTable::builtin(),
            0,
        );
        assert_eq!(stats.chunks_processed, 1);
    }
}
