//! Deterministic square-grid placement for model instances.
//!
//! Every instance of every model in a session is positioned from one grid
//! generated for the total instance count. Offsets are small enough that all
//! instances stay visually adjacent at map scale.

use cgmath::Vector2;

/// Divisor turning grid cells into map-coordinate offsets.
pub const GRID_SCALE: f64 = 10_000.0;

/// Generate `total` unique coordinate offsets arranged as a square grid
/// around the origin.
///
/// `side` is `floor(sqrt(total))`; instance `i` occupies row `i / side`,
/// column `i % side`. Totals that are not perfect squares spill into extra
/// rows below the square. `total == 0` yields an empty sequence.
pub fn layout(total: usize) -> Vec<Vector2<f64>> {
    if total == 0 {
        return Vec::new();
    }

    let side = (total as f64).sqrt().floor();
    let columns = side as usize;

    (0..total)
        .map(|i| {
            let row = (i / columns) as f64;
            let col = (i % columns) as f64;
            Vector2::new(
                (row - side / 2.0) / GRID_SCALE,
                (col - side / 2.0) / GRID_SCALE,
            )
        })
        .collect()
}

/// Slice one grid across several models.
///
/// `counts` are per-model instance counts in registration order. The grid is
/// generated for the summed total and handed out contiguously: slice
/// boundaries are the cumulative counts, so no two models share a position.
/// Regenerated from scratch on every count change rather than patched.
pub fn layout_slices(counts: &[usize]) -> Vec<Vec<Vector2<f64>>> {
    let total = counts.iter().sum();
    let grid = layout(total);

    let mut used = 0;
    counts
        .iter()
        .map(|&count| {
            let slice = grid[used..used + count].to_vec();
            used += count;
            slice
        })
        .collect()
}
