//! [`ActivityGrid`] – the decaying activity field and its classifier.
//!
//! # Coordinates
//!
//! Nodes sit on an odd-sized grid of *position* coordinates centred on zero,
//! where `y` grows toward the road (the roadside node row is `y = +half`).
//! Activity cells lie between node rows and columns and are stored in
//! *array* coordinates: `col` grows left to right, `row` grows away from the
//! road, so row 0 is the roadside row.
//!
//! A node at position `(x, y)` sits on array corner
//! `(x + half_x, nodes_y - (y + half_y) - 1)`; the vertical inversion is what
//! makes a sensor facing `Up` (toward the road) touch the row *above* its
//! corner.
//!
//! ```text
//!   y=+1   N ─── N ─── N      ← roadside nodes
//!          │(0,0)│(1,0)│      ← row 0 (roadside cells)
//!   y= 0   N ─── N ─── N
//!          │(0,1)│(1,1)│      ← row 1
//!   y=-1   N ─── N ─── N
//! ```

use roadwatch_types::{AlgorithmConfig, Classification, Facing, GridLayout, GridPosition};

// ────────────────────────────────────────────────────────────────────────────
// Cell addressing
// ────────────────────────────────────────────────────────────────────────────

/// Array address of one activity cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex {
    pub col: usize,
    pub row: usize,
}

impl CellIndex {
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

/// Maps node positions and facings onto activity cells.
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    layout: GridLayout,
}

impl GridGeometry {
    pub fn new(layout: GridLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    /// Array corner of a node position, possibly outside the node grid.
    pub fn corner(&self, position: GridPosition) -> (isize, isize) {
        let col = isize::from(position.x) + isize::from(self.layout.half_x());
        let row_from_bottom = isize::from(position.y) + isize::from(self.layout.half_y());
        let row = isize::from(self.layout.nodes_y) - row_from_bottom - 1;
        (col, row)
    }

    /// Cells strictly ahead of a sensor at `position` looking along `facing`.
    ///
    /// Cells outside the grid are dropped, so edge sensors touch one cell and
    /// sensors looking off the grid touch none.
    pub fn cells_ahead(&self, position: GridPosition, facing: Facing) -> Vec<CellIndex> {
        let (c, r) = self.corner(position);
        let candidates = match facing {
            Facing::Up => [(c, r - 1), (c - 1, r - 1)],
            Facing::Right => [(c, r), (c, r - 1)],
            Facing::Down => [(c, r), (c - 1, r)],
            Facing::Left => [(c - 1, r), (c - 1, r - 1)],
        };
        candidates
            .into_iter()
            .filter_map(|(col, row)| self.cell_at(col, row))
            .collect()
    }

    fn cell_at(&self, col: isize, row: isize) -> Option<CellIndex> {
        let col = usize::try_from(col).ok()?;
        let row = usize::try_from(row).ok()?;
        (col < self.layout.cells_x() && row < self.layout.cells_y()).then_some(CellIndex { col, row })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ActivityGrid
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    possible: f32,
    detection: f32,
}

/// Dense field of activity variables bounded to `[min, max]`.
///
/// # Example
///
/// ```
/// use roadwatch_perception::grid::{ActivityGrid, CellIndex};
/// use roadwatch_types::{AlgorithmConfig, Classification};
///
/// let mut grid = ActivityGrid::new(&AlgorithmConfig::default());
/// let cell = CellIndex::new(0, 0);
/// assert_eq!(grid.classify(cell), Classification::Idle);
///
/// grid.grow(cell, 4.2);
/// assert_eq!(grid.classify(cell), Classification::Possible);
/// ```
#[derive(Debug, Clone)]
pub struct ActivityGrid {
    cols: usize,
    rows: usize,
    cells: Vec<f32>,
    min: f32,
    max: f32,
    roadside: Thresholds,
    inland: Thresholds,
}

impl ActivityGrid {
    /// Allocate the grid for `config.grid`, every cell at the floor.
    pub fn new(config: &AlgorithmConfig) -> Self {
        let cols = config.grid.cells_x();
        let rows = config.grid.cells_y();
        Self {
            cols,
            rows,
            cells: vec![config.av_min; cols * rows],
            min: config.av_min,
            max: config.av_max,
            roadside: Thresholds {
                possible: config.possible_threshold_roadside,
                detection: config.detection_threshold_roadside,
            },
            inland: Thresholds {
                possible: config.possible_threshold_inland,
                detection: config.detection_threshold_inland,
            },
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// All cell addresses in row-major order.
    pub fn indices(&self) -> impl Iterator<Item = CellIndex> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| CellIndex { col, row }))
    }

    pub fn value(&self, cell: CellIndex) -> Option<f32> {
        self.offset(cell).map(|i| self.cells[i])
    }

    pub fn is_roadside(&self, cell: CellIndex) -> bool {
        cell.row == 0
    }

    /// Threshold class of `cell`.  Cells outside the grid are `Idle`.
    pub fn classify(&self, cell: CellIndex) -> Classification {
        let Some(value) = self.value(cell) else {
            return Classification::Idle;
        };
        let t = if self.is_roadside(cell) { self.roadside } else { self.inland };
        if value < t.possible {
            Classification::Idle
        } else if value > t.detection {
            Classification::Detected
        } else {
            Classification::Possible
        }
    }

    /// Multiply `cell` by `factor` and clamp into `[min, max]`.
    ///
    /// Returns the new value, or `None` when `cell` is outside the grid.
    pub fn grow(&mut self, cell: CellIndex, factor: f32) -> Option<f32> {
        let i = self.offset(cell)?;
        let (min, max) = (self.min, self.max);
        let v = &mut self.cells[i];
        *v = (*v * factor).min(max).max(min);
        Some(*v)
    }

    /// Decay every cell above the floor once.
    pub fn decay_tick(&mut self, decay_factor: f32) {
        let min = self.min;
        for v in self.cells.iter_mut().filter(|v| **v > min) {
            *v = (*v * decay_factor).max(min);
        }
    }

    fn offset(&self, cell: CellIndex) -> Option<usize> {
        (cell.col < self.cols && cell.row < self.rows).then_some(cell.row * self.cols + cell.col)
    }
}
