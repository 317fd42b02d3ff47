//! Chunk storage: a square of cells plus the homogeneous-material tag

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU16, Ordering};

use super::{CHUNK_CELLS, CHUNK_WIDTH, Cell, ChunkCoord, cell_flags};

const NO_TAG: u16 = u16::MAX;

/// One cell slot, writable through a shared chunk reference by the automaton
#[repr(transparent)]
struct CellSlot(UnsafeCell<Cell>);

// SAFETY: shared writes only happen through `Chunk::write_shared`, whose
// contract requires that no other thread touches the same cell meanwhile.
unsafe impl Sync for CellSlot {}

/// A `CHUNK_WIDTH` x `CHUNK_WIDTH` block of cells
///
/// Cell index is `x + y * CHUNK_WIDTH`, with `y` growing upward.
pub struct Chunk {
    coord: ChunkCoord,
    cells: Box<[CellSlot]>,
    /// Material shared by every cell, `NO_TAG` otherwise
    all_cell: AtomicU16,
}

impl Chunk {
    /// Chunk filled with air
    pub fn new(coord: ChunkCoord) -> Self {
        Self::filled(coord, Cell::AIR)
    }

    /// Chunk with every cell set to `cell`, tagged homogeneous
    pub fn filled(coord: ChunkCoord, cell: Cell) -> Self {
        let cells = (0..CHUNK_CELLS)
            .map(|_| CellSlot(UnsafeCell::new(cell)))
            .collect();
        Self {
            coord,
            cells,
            all_cell: AtomicU16::new(cell.material_id),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    fn index(x: usize, y: usize) -> usize {
        debug_assert!(x < CHUNK_WIDTH && y < CHUNK_WIDTH);
        x + y * CHUNK_WIDTH
    }

    /// Get the cell at local coordinates
    #[inline]
    pub fn get_cell(&self, x: usize, y: usize) -> Cell {
        // SAFETY: concurrent writers never target a cell another thread reads
        // (see `write_shared`), so this read never races.
        unsafe { *self.cells[Self::index(x, y)].0.get() }
    }

    /// Set the cell at local coordinates
    ///
    /// Clears the homogeneous tag if the material no longer matches.
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) {
        *self.cells[Self::index(x, y)].0.get_mut() = cell;
        if self.homogeneous() != Some(cell.material_id) {
            self.clear_homogeneous();
        }
    }

    /// Write a cell through a shared reference
    ///
    /// # Safety
    /// No other thread may read or write the cell at `(x, y)` for the
    /// duration of the call. The chunk scheduler guarantees this by never
    /// running two chunks within reach of the same cell at once.
    #[inline]
    pub(crate) unsafe fn write_shared(&self, x: usize, y: usize, cell: Cell) {
        // SAFETY: exclusivity of this cell is upheld by the caller.
        unsafe { *self.cells[Self::index(x, y)].0.get() = cell };
    }

    /// Material of every cell if the chunk is uniform
    pub fn homogeneous(&self) -> Option<u16> {
        match self.all_cell.load(Ordering::Relaxed) {
            NO_TAG => None,
            material => Some(material),
        }
    }

    /// Drop the homogeneous tag (after any edit or swap)
    pub fn clear_homogeneous(&self) {
        self.all_cell.store(NO_TAG, Ordering::Relaxed);
    }

    /// Scan all cells and set the homogeneous tag if they share a material
    pub fn retag_homogeneous(&mut self) {
        let first = self.cells[0].0.get_mut().material_id;
        let uniform = self
            .cells
            .iter_mut()
            .all(|slot| slot.0.get_mut().material_id == first);
        let tag = if uniform { first } else { NO_TAG };
        self.all_cell.store(tag, Ordering::Relaxed);
    }

    /// Clear the per-tick moved flag on every cell
    pub fn clear_update_flags(&mut self) {
        for slot in self.cells.iter_mut() {
            slot.0.get_mut().flags &= !cell_flags::UPDATED;
        }
    }

    /// Iterate cells row by row, bottom row first
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..CHUNK_CELLS).map(|i| self.get_cell(i % CHUNK_WIDTH, i / CHUNK_WIDTH))
    }

    /// Number of cells of each material present in the chunk
    pub fn material_counts(&self) -> ahash::HashMap<u16, usize> {
        let mut counts = ahash::HashMap::default();
        for cell in self.cells() {
            *counts.entry(cell.material_id).or_insert(0) += 1;
        }
        counts
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("all_cell", &self.homogeneous())
            .finish_non_exhaustive()
    }
}
