//! [`DecayEngine`] – once-per-second relaxation of the activity field.
//!
//! Without new detections every cell drifts back to the floor, so an animal
//! that left the area stops holding the indicators up.

use roadwatch_types::AlgorithmConfig;
use tracing::trace;

use crate::grid::ActivityGrid;

/// Applies the configured decay factor to the whole grid.
///
/// # Example
///
/// ```
/// use roadwatch_perception::decay::DecayEngine;
/// use roadwatch_perception::grid::{ActivityGrid, CellIndex};
/// use roadwatch_types::AlgorithmConfig;
///
/// let cfg = AlgorithmConfig::default();
/// let mut grid = ActivityGrid::new(&cfg);
/// grid.grow(CellIndex::new(1, 1), 2.0);
///
/// let engine = DecayEngine::new(&cfg);
/// engine.tick(&mut grid);
/// assert!(grid.value(CellIndex::new(1, 1)).unwrap() < 2.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DecayEngine {
    factor: f32,
}

impl DecayEngine {
    pub fn new(config: &AlgorithmConfig) -> Self {
        Self { factor: config.decay_factor }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Decay every cell once.  Call exactly once per second.
    pub fn tick(&self, grid: &mut ActivityGrid) {
        grid.decay_tick(self.factor);
        trace!(factor = self.factor, "grid decayed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellIndex;

    #[test]
    fn tick_multiplies_by_factor() {
        let cfg = AlgorithmConfig::default();
        let mut grid = ActivityGrid::new(&cfg);
        let cell = CellIndex::new(0, 1);
        grid.grow(cell, 5.0);
        DecayEngine::new(&cfg).tick(&mut grid);
        assert!((grid.value(cell).unwrap() - 4.95).abs() < 1e-4);
    }

    #[test]
    fn floor_cells_stay_at_floor() {
        let cfg = AlgorithmConfig::default();
        let mut grid = ActivityGrid::new(&cfg);
        let engine = DecayEngine::new(&cfg);
        for _ in 0..5 {
            engine.tick(&mut grid);
        }
        assert!(grid.indices().all(|c| grid.value(c) == Some(cfg.av_min)));
    }

    #[test]
    fn repeated_ticks_reach_the_floor() {
        let cfg = AlgorithmConfig::default();
        let mut grid = ActivityGrid::new(&cfg);
        let cell = CellIndex::new(1, 0);
        grid.grow(cell, 12.0);
        let engine = DecayEngine::new(&cfg);
        let ticks = (0..1000).take_while(|_| {
            engine.tick(&mut grid);
            grid.value(cell) != Some(cfg.av_min)
        });
        assert!(ticks.count() < 300);
    }
}
