//! Work partitioning: covers the N x N task domain with fixed-size 2D tiles.
//!
//! A tile (block) is `tile_edge x tile_edge` tasks. The grid has
//! `ceil(n / tile_edge)` tiles along each axis, so the last tile on each axis
//! may be only partially populated. Padding tasks are suppressed by the
//! kernel's bounds guard, never by shrinking the tile.

use std::fmt;

use crate::error::{MatVecError, Result};

/// Tile edge used when none is configured.
pub const DEFAULT_TILE_EDGE: usize = 20;

/// Largest block (tasks per tile) a device accepts by default.
pub const MAX_TASKS_PER_BLOCK: usize = 1024;

/// A two-dimensional extent or index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dim2 {
    pub x: usize,
    pub y: usize,
}

impl Dim2 {
    pub const fn new(x: usize, y: usize) -> Self {
        Dim2 { x, y }
    }

    pub const fn square(edge: usize) -> Self {
        Dim2 { x: edge, y: edge }
    }

    /// Number of cells in this extent.
    pub fn volume(&self) -> usize {
        self.x * self.y
    }
}

impl fmt::Display for Dim2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Grid and block shape for one kernel launch over an `n`-sized problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub n: usize,
    pub grid: Dim2,
    pub block: Dim2,
}

impl LaunchConfig {
    /// Tiling for the parallel kernel: `ceil(n / tile_edge)` square tiles
    /// per axis, each `tile_edge x tile_edge` tasks.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `tile_edge` is zero.
    pub fn parallel(n: usize, tile_edge: usize) -> Result<Self> {
        if tile_edge == 0 {
            return Err(MatVecError::InvalidArgument(
                "tile edge must be > 0".to_string(),
            ));
        }
        let tiles = n.div_ceil(tile_edge);
        Ok(LaunchConfig {
            n,
            grid: Dim2::square(tiles),
            block: Dim2::square(tile_edge),
        })
    }

    /// Degenerate tiling for the sequential kernel: one tile of one task,
    /// which walks the whole domain itself. Empty when `n == 0`.
    pub fn sequential(n: usize) -> Self {
        let grid = if n == 0 { Dim2::default() } else { Dim2::square(1) };
        LaunchConfig {
            n,
            grid,
            block: Dim2::square(1),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.grid.volume()
    }

    /// Total scheduled tasks, including padding.
    pub fn scheduled_tasks(&self) -> usize {
        self.tile_count() * self.block.volume()
    }

    /// Scheduled tasks whose coordinates fall outside `[0, n)^2`.
    pub fn padding_tasks(&self) -> usize {
        self.scheduled_tasks().saturating_sub(self.n * self.n)
    }

    pub fn is_empty(&self) -> bool {
        self.tile_count() == 0
    }

    /// Tile at linear position `index` (row-major over the grid).
    ///
    /// # Panics
    /// Panics if `index >= self.tile_count()`, including on an empty grid.
    pub fn tile(&self, index: usize) -> Tile {
        assert!(
            index < self.tile_count(),
            "tile {index} out of range for grid {}",
            self.grid
        );
        let block_idx = Dim2::new(index / self.grid.y, index % self.grid.y);
        let origin = Dim2::new(block_idx.x * self.block.x, block_idx.y * self.block.y);
        let extent = Dim2::new(
            self.block.x.min(self.n.saturating_sub(origin.x)),
            self.block.y.min(self.n.saturating_sub(origin.y)),
        );
        Tile {
            block_idx,
            origin,
            extent,
        }
    }

    /// Every tile of the grid, row-major.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tile_count()).map(move |i| self.tile(i))
    }
}

impl fmt::Display for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={} grid={} block={}", self.n, self.grid, self.block)
    }
}

/// One block of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub block_idx: Dim2,
    /// First global coordinate covered by this tile.
    pub origin: Dim2,
    /// Number of in-bounds coordinates along each axis.
    pub extent: Dim2,
}

impl Tile {
    /// True if some tasks in this tile are padding.
    pub fn is_partial(&self, block: Dim2) -> bool {
        self.extent != block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple() {
        let cfg = LaunchConfig::parallel(40, 20).unwrap();
        assert_eq!(cfg.grid, Dim2::square(2));
        assert_eq!(cfg.block, Dim2::square(20));
        assert_eq!(cfg.padding_tasks(), 0);
        assert!(cfg.tiles().all(|t| !t.is_partial(cfg.block)));
    }

    #[test]
    fn test_remainder_tile() {
        let cfg = LaunchConfig::parallel(21, 20).unwrap();
        assert_eq!(cfg.grid, Dim2::square(2));
        assert_eq!(cfg.scheduled_tasks(), 4 * 400);
        assert_eq!(cfg.padding_tasks(), 1600 - 441);

        let last = cfg.tile(3);
        assert_eq!(last.block_idx, Dim2::new(1, 1));
        assert_eq!(last.origin, Dim2::new(20, 20));
        assert_eq!(last.extent, Dim2::new(1, 1));
        assert!(last.is_partial(cfg.block));

        let edge = cfg.tile(1);
        assert_eq!(edge.origin, Dim2::new(0, 20));
        assert_eq!(edge.extent, Dim2::new(20, 1));
    }

    #[test]
    fn test_valid_extents_cover_domain() {
        for (n, g) in [(1, 20), (7, 3), (21, 20), (200, 20), (33, 8)] {
            let cfg = LaunchConfig::parallel(n, g).unwrap();
            let covered: usize = cfg.tiles().map(|t| t.extent.volume()).sum();
            assert_eq!(covered, n * n, "n={n} g={g}");
        }
    }

    #[test]
    fn test_zero_size_has_no_tiles() {
        let cfg = LaunchConfig::parallel(0, 20).unwrap();
        assert!(cfg.is_empty());
        assert_eq!(cfg.tiles().count(), 0);
        assert!(LaunchConfig::sequential(0).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_tile_on_empty_grid_panics() {
        LaunchConfig::parallel(0, 20).unwrap().tile(0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_tile_past_last_panics() {
        let cfg = LaunchConfig::parallel(21, 20).unwrap();
        cfg.tile(cfg.tile_count());
    }

    #[test]
    fn test_zero_tile_edge_rejected() {
        assert!(matches!(
            LaunchConfig::parallel(5, 0),
            Err(MatVecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sequential_is_one_task() {
        let cfg = LaunchConfig::sequential(200);
        assert_eq!(cfg.grid, Dim2::square(1));
        assert_eq!(cfg.block, Dim2::square(1));
        assert_eq!(cfg.scheduled_tasks(), 1);
    }

    #[test]
    fn test_display() {
        let cfg = LaunchConfig::parallel(21, 20).unwrap();
        assert_eq!(cfg.to_string(), "n=21 grid=2x2 block=20x20");
    }
}
