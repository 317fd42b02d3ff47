//! Cross-chunk cell access used by the automaton
//!
//! A `CellGrid` resolves integer world coordinates to the owning chunk and
//! reads or writes the cell there. It is built either from an exclusive
//! borrow of the chunk map (single-threaded, always sound) or, inside the
//! scheduler, as one of several views onto a shared map whose callers
//! guarantee disjoint cell access.

use std::marker::PhantomData;

use super::{Cell, Chunk, ChunkCoord, ChunkMap, world_to_local};

/// World-coordinate view onto a chunk map
pub struct CellGrid<'a> {
    chunks: &'a ChunkMap,
    // Views must not be shared between threads; each worker builds its own
    _not_sync: PhantomData<*const ()>,
}

impl<'a> CellGrid<'a> {
    /// View with exclusive access to the whole map
    pub fn exclusive(chunks: &'a mut ChunkMap) -> Self {
        Self {
            chunks,
            _not_sync: PhantomData,
        }
    }

    /// View onto a map other views may write concurrently
    ///
    /// # Safety
    /// While this view is alive, no other thread may read or write any
    /// cell this view reads or writes, and nobody may hold a mutable
    /// reference into `chunks`. The chunk scheduler upholds this by only
    /// running chunks at least two chunks apart, with every rule reaching
    /// less than half a chunk outside its own chunk.
    pub unsafe fn shared(chunks: &'a ChunkMap) -> Self {
        Self {
            chunks,
            _not_sync: PhantomData,
        }
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&'a Chunk> {
        self.chunks.get(&coord)
    }

    /// Cell at world coordinates, `None` for unloaded chunks
    #[inline]
    pub fn get(&self, world_x: i64, world_y: i64) -> Option<Cell> {
        let (coord, x, y) = world_to_local(world_x, world_y);
        self.chunks.get(&coord).map(|chunk| chunk.get_cell(x, y))
    }

    /// Overwrite a cell and drop its chunk's homogeneous tag
    ///
    /// Returns false if the chunk is not loaded.
    pub fn set(&self, world_x: i64, world_y: i64, cell: Cell) -> bool {
        let (coord, x, y) = world_to_local(world_x, world_y);
        let Some(chunk) = self.chunks.get(&coord) else {
            return false;
        };
        // SAFETY: exclusive views own the whole map; shared views were
        // created under the disjoint-access contract of `shared`.
        unsafe { chunk.write_shared(x, y, cell) };
        chunk.clear_homogeneous();
        true
    }

    /// Exchange two loaded cells
    pub fn swap(&self, a: (i64, i64), b: (i64, i64)) -> bool {
        let (Some(cell_a), Some(cell_b)) = (self.get(a.0, a.1), self.get(b.0, b.1)) else {
            return false;
        };
        self.set(a.0, a.1, cell_b);
        self.set(b.0, b.1, cell_a);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yellowcopper_simulation::MaterialId;

    fn map(coords: &[ChunkCoord]) -> ChunkMap {
        coords.iter().map(|&c| (c, Chunk::new(c))).collect()
    }

    #[test]
    fn test_get_and_set_across_chunks() {
        let mut chunks = map(&[ChunkCoord::new(0, 0), ChunkCoord::new(-1, 0)]);
        let grid = CellGrid::exclusive(&mut chunks);
        let sand = Cell::new(MaterialId::SAND, [1, 1, 1, 255]);

        assert!(grid.set(-1, 5, sand));
        assert_eq!(grid.get(-1, 5), Some(sand));
        assert_eq!(grid.get(0, 5), Some(Cell::AIR));
        assert_eq!(grid.get(0, -1), None);
        assert!(!grid.set(0, -1, sand));
    }

    #[test]
    fn test_swap_clears_both_tags() {
        let mut chunks = map(&[ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)]);
        {
            let grid = CellGrid::exclusive(&mut chunks);
            let water = Cell::new(MaterialId::WATER, [0, 0, 255, 200]);
            grid.set(63, 0, water);
            assert_eq!(
                grid.chunk(ChunkCoord::new(1, 0)).unwrap().homogeneous(),
                Some(MaterialId::AIR)
            );
            assert!(grid.swap((63, 0), (64, 0)));
            assert_eq!(grid.get(64, 0), Some(water));
        }
        assert_eq!(chunks[&ChunkCoord::new(0, 0)].homogeneous(), None);
        assert_eq!(chunks[&ChunkCoord::new(1, 0)].homogeneous(), None);
    }

    #[test]
    fn test_swap_with_unloaded_fails() {
        let mut chunks = map(&[ChunkCoord::new(0, 0)]);
        let grid = CellGrid::exclusive(&mut chunks);
        assert!(!grid.swap((0, 0), (0, -1)));
    }
}
