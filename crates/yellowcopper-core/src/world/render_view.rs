//! Pixel window handed to the renderer

use yellowcopper_simulation::MaterialId;

use super::{CHUNK_WIDTH, ChunkCoord, Dimension};

/// Color drawn over chunk corners when the debug overlay is on
pub const CORNER_MARK: [u8; 4] = [255, 0, 255, 255];

/// Cell colors and materials for a square of chunks, top row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWindow {
    /// Bottom-left chunk of the window
    pub origin: ChunkCoord,
    /// Width and height in cells
    pub size: usize,
    /// `size * size` RGBA pixels, row-major from the top-left
    pub rgba: Vec<u8>,
    /// Material id per pixel, same layout as `rgba`
    pub materials: Vec<u16>,
}

impl CellWindow {
    /// Snapshot the chunks within `radius` of `center`
    ///
    /// Unloaded chunks come out transparent with the empty material.
    pub fn capture(dimension: &Dimension, center: ChunkCoord, radius: i32) -> Self {
        let radius = radius.max(0);
        let span = (2 * radius + 1) as usize;
        let size = span * CHUNK_WIDTH;
        let origin = ChunkCoord::new(center.x - radius, center.y - radius);

        let mut rgba = vec![0; size * size * 4];
        let mut materials = vec![MaterialId::AIR; size * size];

        for coord in center.square(radius) {
            let Some(chunk) = dimension.chunk(coord) else {
                continue;
            };
            let column = (coord.x - origin.x) as usize * CHUNK_WIDTH;
            let row = (coord.y - origin.y) as usize * CHUNK_WIDTH;
            for y in 0..CHUNK_WIDTH {
                // Flip so the top of the world is the first row
                let pixel_y = size - 1 - (row + y);
                for x in 0..CHUNK_WIDTH {
                    let index = pixel_y * size + column + x;
                    let cell = chunk.get_cell(x, y);
                    rgba[index * 4..index * 4 + 4].copy_from_slice(&cell.color);
                    materials[index] = cell.material_id;
                }
            }
        }

        Self {
            origin,
            size,
            rgba,
            materials,
        }
    }

    /// Index of pixel `(x, y)` counted from the top-left
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let index = self.index(x, y) * 4;
        [
            self.rgba[index],
            self.rgba[index + 1],
            self.rgba[index + 2],
            self.rgba[index + 3],
        ]
    }

    pub fn material(&self, x: usize, y: usize) -> u16 {
        self.materials[self.index(x, y)]
    }

    /// Paint the bottom-left cell of every chunk
    pub fn mark_chunk_corners(&mut self) {
        for chunk_y in 0..self.size / CHUNK_WIDTH {
            for chunk_x in 0..self.size / CHUNK_WIDTH {
                let x = chunk_x * CHUNK_WIDTH;
                let y = self.size - 1 - chunk_y * CHUNK_WIDTH;
                let index = self.index(x, y) * 4;
                self.rgba[index..index + 4].copy_from_slice(&CORNER_MARK);
            }
        }
    }
}
