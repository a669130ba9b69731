//! In-memory pixel store with dirty-pixel coalescing.
//!
//! DESIGN
//! ======
//! The board is one contiguous `W*H*3` byte buffer in row-major RGB order.
//! That single allocation is the zero-copy substrate for paint writes, the
//! snapshot endpoint, persistence, and the broadcast encoder.
//!
//! Dirty tracking is a bitset over `W*H` plus an append-only index vector:
//! `set` is O(1), `drain_dirty` is O(D) in the number of distinct dirtied
//! pixels, and the drained index vector is recycled so steady-state ticks
//! allocate nothing new for the index bookkeeping. A pixel written twice
//! between drains appears once in the drain, carrying its latest color.

use packets::Color;

/// Fill color for a blank board.
pub const BLANK_FILL: Color = Color::new(170, 170, 170);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("stored board is {stored} bytes, expected {expected} for {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        stored: usize,
    },
}

/// One entry returned by [`PixelStore::drain_dirty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyPixel {
    pub x: u16,
    pub y: u16,
    pub color: Color,
}

#[derive(Debug)]
pub struct PixelStore {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    dirty_bits: Vec<u64>,
    dirty_indices: Vec<u32>,
    /// Drained vector kept around for reuse by the next cycle.
    spare_indices: Vec<u32>,
}

impl PixelStore {
    /// Create a blank gray board.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let cells = (width as usize) * (height as usize);
        let mut pixels = Vec::with_capacity(cells * 3);
        for _ in 0..cells {
            pixels.extend_from_slice(&[BLANK_FILL.r, BLANK_FILL.g, BLANK_FILL.b]);
        }
        Self {
            width,
            height,
            pixels,
            dirty_bits: vec![0; cells.div_ceil(64)],
            dirty_indices: Vec::new(),
            spare_indices: Vec::new(),
        }
    }

    /// Adopt a stored byte grid.
    pub fn from_saved(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BoardError> {
        let cells = (width as usize) * (height as usize);
        let expected = cells * 3;
        if pixels.len() != expected {
            return Err(BoardError::DimensionMismatch {
                width,
                height,
                expected,
                stored: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            dirty_bits: vec![0; cells.div_ceil(64)],
            dirty_indices: Vec::new(),
            spare_indices: Vec::new(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Write one pixel. Returns false iff (x, y) is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, color: Color) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = (y * self.width + x) as usize;
        let offset = index * 3;
        self.pixels[offset] = color.r;
        self.pixels[offset + 1] = color.g;
        self.pixels[offset + 2] = color.b;

        let (word, bit) = (index / 64, index % 64);
        if self.dirty_bits[word] & (1 << bit) == 0 {
            self.dirty_bits[word] |= 1 << bit;
            self.dirty_indices.push(index as u32);
        }
        true
    }

    /// Read one pixel. None iff out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) as usize) * 3;
        Some(Color::new(
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ))
    }

    /// Borrowed view of the full grid, length `W*H*3`.
    #[must_use]
    pub fn snapshot(&self) -> &[u8] {
        &self.pixels
    }

    /// Return every pixel dirtied since the last drain, with its current
    /// color, and clear the dirty set.
    pub fn drain_dirty(&mut self) -> Vec<DirtyPixel> {
        let drained =
            std::mem::replace(&mut self.dirty_indices, std::mem::take(&mut self.spare_indices));

        let mut out = Vec::with_capacity(drained.len());
        for &index in &drained {
            let (word, bit) = ((index as usize) / 64, (index as usize) % 64);
            self.dirty_bits[word] &= !(1 << bit);

            let offset = (index as usize) * 3;
            out.push(DirtyPixel {
                x: (index % self.width) as u16,
                y: (index / self.width) as u16,
                color: Color::new(
                    self.pixels[offset],
                    self.pixels[offset + 1],
                    self.pixels[offset + 2],
                ),
            });
        }

        self.spare_indices = drained;
        self.spare_indices.clear();
        out
    }

    /// Number of pixels currently pending broadcast.
    #[must_use]
    pub fn dirty_len(&self) -> usize {
        self.dirty_indices.len()
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
