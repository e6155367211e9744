//! Perceptual fingerprint (difference hash) for image payloads.
//!
//! The rasterization to a 9x8 luma grid is an external capability (see
//! [`crate::enrich::MediaProcessor`]); this module owns the bit packing.
//! For each of the 8 rows, each of the 8 horizontally adjacent pixel pairs
//! sets bit `row * 8 + col` when the left intensity exceeds the right.

/// Grid width in pixels (one extra column for pairwise comparison).
pub const GRID_WIDTH: usize = 9;

/// Grid height in pixels.
pub const GRID_HEIGHT: usize = 8;

/// Total luma samples in a grid.
pub const GRID_LEN: usize = GRID_WIDTH * GRID_HEIGHT;

/// Pack a row-major 9x8 luma grid into the fingerprint string.
///
/// Output is always `0x` followed by exactly 16 lowercase hex digits,
/// including for degenerate solid-color grids.
#[must_use]
pub fn dhash(grid: &[u8; GRID_LEN]) -> String {
    let mut bits: u64 = 0;
    for row in 0..GRID_HEIGHT {
        for col in 0..8 {
            let left = grid[row * GRID_WIDTH + col];
            let right = grid[row * GRID_WIDTH + col + 1];
            if left > right {
                bits |= 1u64 << (row * 8 + col);
            }
        }
    }
    format!("0x{bits:016x}")
}
