//! Chunk coordinates and world-to-chunk mapping

use glam::{DVec2, IVec2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::CHUNK_WIDTH;

/// Bias added before flooring so positions resting exactly on a chunk
/// border do not flicker between chunks from float error
pub const COORD_EPSILON: f64 = 0.01;

/// Integer coordinate of a chunk in chunk units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whether `other` is one of the 8 chunks surrounding this one
    pub fn touches(self, other: ChunkCoord) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    /// Whether `other` shares an edge with this chunk
    pub fn shares_edge(self, other: ChunkCoord) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }

    /// Parity class (0..4) used by the checkerboard schedule
    pub fn color_class(self) -> usize {
        (self.x.rem_euclid(2) + 2 * self.y.rem_euclid(2)) as usize
    }

    /// All chunk coordinates in the square of `radius` around this one,
    /// bottom row first
    pub fn square(self, radius: i32) -> impl Iterator<Item = ChunkCoord> {
        (-radius..=radius).flat_map(move |dy| {
            (-radius..=radius).map(move |dx| ChunkCoord::new(self.x + dx, self.y + dy))
        })
    }
}

// Row-major order: rows bottom to top, then west to east within a row
impl Ord for ChunkCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for ChunkCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<IVec2> for ChunkCoord {
    fn from(v: IVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<ChunkCoord> for IVec2 {
    fn from(c: ChunkCoord) -> Self {
        IVec2::new(c.x, c.y)
    }
}

/// Chunk containing a continuous world position (floor semantics)
pub fn chunk_of(x: f64, y: f64) -> ChunkCoord {
    let width = CHUNK_WIDTH as f64;
    ChunkCoord::new(
        ((x + COORD_EPSILON) / width).floor() as i32,
        ((y + COORD_EPSILON) / width).floor() as i32,
    )
}

/// World position of a chunk's bottom-left corner
pub fn world_pos_of_chunk(coord: ChunkCoord) -> DVec2 {
    DVec2::new(
        coord.x as f64 * CHUNK_WIDTH as f64,
        coord.y as f64 * CHUNK_WIDTH as f64,
    )
}

/// Convert integer world cell coordinates to chunk coordinates + local cell
pub fn world_to_local(world_x: i64, world_y: i64) -> (ChunkCoord, usize, usize) {
    let width = CHUNK_WIDTH as i64;
    let coord = ChunkCoord::new(
        world_x.div_euclid(width) as i32,
        world_y.div_euclid(width) as i32,
    );
    let local_x = world_x.rem_euclid(width) as usize;
    let local_y = world_y.rem_euclid(width) as usize;
    (coord, local_x, local_y)
}

/// Integer world cell coordinates of a chunk-local cell
pub fn local_to_world(coord: ChunkCoord, x: usize, y: usize) -> (i64, i64) {
    let width = CHUNK_WIDTH as i64;
    (
        coord.x as i64 * width + x as i64,
        coord.y as i64 * width + y as i64,
    )
}
