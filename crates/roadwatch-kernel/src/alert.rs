//! [`AlertStateMachine`] – activity field → roadside indicator levels.
//!
//! Each second the machine derives a *raw* level per indicator from the
//! classification of every activity cell, then moves each indicator's
//! *output* level toward it with hysteresis:
//!
//! - raw above output: escalate at once and restart the dwell timer;
//! - raw equal to output: keep counting;
//! - raw below output: step down one level only after the output level has
//!   been held for its minimum dwell (Concern 30 s, Alarm 60 s by default).
//!
//! # Corner tables
//!
//! The default layout has a 2×2 activity grid and three roadside indicators.
//! Every cell owns a fixed table mapping its classification to a
//! contribution for each indicator.  Contributions are folded so that two
//! independent Concerns on the same indicator make an Alarm.

use roadwatch_perception::{ActivityGrid, CellIndex, TopologyRegistry};
use roadwatch_types::{
    AlertLevel, AlgorithmConfig, Classification, CoreError, GridLayout, GridPosition, IndicatorCommand,
};
use tracing::{debug, info, warn};

use roadwatch_types::AlertLevel::{Alarm as A, Concern as C, Idle as I};

const INDICATORS: usize = 3;

/// Per-cell contribution table, indexed by classification then indicator.
type CornerTable = [[AlertLevel; INDICATORS]; 3];

const TOP_LEFT: CornerTable = [[I, I, I], [A, C, I], [A, A, C]];
const TOP_RIGHT: CornerTable = [[I, I, I], [A, A, C], [A, A, A]];
const BOTTOM_LEFT: CornerTable = [[I, I, I], [C, I, I], [A, C, I]];
const BOTTOM_RIGHT: CornerTable = [[I, I, I], [A, C, I], [A, A, C]];

fn corner_table(cell: CellIndex) -> &'static CornerTable {
    match (cell.col, cell.row) {
        (0, 0) => &TOP_LEFT,
        (1, 0) => &TOP_RIGHT,
        (0, _) => &BOTTOM_LEFT,
        _ => &BOTTOM_RIGHT,
    }
}

fn class_row(class: Classification) -> usize {
    match class {
        Classification::Idle => 0,
        Classification::Possible => 1,
        Classification::Detected => 2,
    }
}

/// Fold one contribution into an indicator's raw level.
fn escalate(current: AlertLevel, contribution: AlertLevel) -> AlertLevel {
    if current == AlertLevel::Concern && contribution == AlertLevel::Concern {
        AlertLevel::Alarm
    } else {
        current.max(contribution)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Indicator record
// ────────────────────────────────────────────────────────────────────────────

/// Signalling state of one roadside indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorState {
    /// Level derived from the grid this second.
    pub raw: AlertLevel,
    /// Level actually commanded.
    pub output: AlertLevel,
    /// Seconds the current output level has been held.
    pub dwell_s: u32,
    pub dwell_active: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// AlertStateMachine
// ────────────────────────────────────────────────────────────────────────────

/// Hysteretic indicator controller.
///
/// # Example
///
/// ```
/// use roadwatch_kernel::alert::AlertStateMachine;
/// use roadwatch_perception::{ActivityGrid, CellIndex, TopologyRegistry};
/// use roadwatch_types::{AlertLevel, AlgorithmConfig};
///
/// let cfg = AlgorithmConfig::default();
/// let mut alerts = AlertStateMachine::new(&cfg).unwrap();
/// let mut grid = ActivityGrid::new(&cfg);
/// let topo = TopologyRegistry::new(9);
///
/// grid.grow(CellIndex::new(1, 0), 10.0);
/// alerts.on_second(&grid, &topo);
/// assert_eq!(alerts.output(2), Some(AlertLevel::Alarm));
/// ```
#[derive(Debug, Clone)]
pub struct AlertStateMachine {
    layout: GridLayout,
    indicators: Vec<IndicatorState>,
    concern_dwell_s: u32,
    alarm_dwell_s: u32,
    reinforcement_period_s: u32,
    since_reinforcement_s: u32,
}

impl AlertStateMachine {
    /// # Errors
    ///
    /// [`CoreError::InvalidConfig`] unless the layout is the 3×3 node grid
    /// the corner tables are written for.
    pub fn new(config: &AlgorithmConfig) -> Result<Self, CoreError> {
        let layout = config.grid;
        if layout.cells_x() != 2 || layout.cells_y() != 2 {
            return Err(CoreError::InvalidConfig(format!(
                "alerting needs a 2x2 activity grid, got {}x{}",
                layout.cells_x(),
                layout.cells_y()
            )));
        }
        Ok(Self {
            layout,
            indicators: vec![IndicatorState::default(); INDICATORS],
            concern_dwell_s: config.concern_dwell_s,
            alarm_dwell_s: config.alarm_dwell_s,
            reinforcement_period_s: config.reinforcement_period_s.max(1),
            since_reinforcement_s: 0,
        })
    }

    pub fn indicators(&self) -> &[IndicatorState] {
        &self.indicators
    }

    /// Commanded level of indicator `index`.
    pub fn output(&self, index: usize) -> Option<AlertLevel> {
        self.indicators.get(index).map(|s| s.output)
    }

    /// Advance one second.
    ///
    /// Returns a command for every indicator whose output changed, plus every
    /// indicator when the reinforcement period elapsed.
    pub fn on_second(&mut self, grid: &ActivityGrid, topology: &TopologyRegistry) -> Vec<IndicatorCommand> {
        self.derive_raw(grid);
        let mut emit: Vec<usize> = (0..self.indicators.len()).filter(|&i| self.update_output(i)).collect();

        self.since_reinforcement_s += 1;
        if self.since_reinforcement_s >= self.reinforcement_period_s {
            self.since_reinforcement_s = 0;
            emit = (0..self.indicators.len()).collect();
        }
        self.commands(&emit, topology)
    }

    /// Recompute after the topology changed and re-emit every indicator so
    /// freshly joined nodes are not left stale.
    ///
    /// Only escalations are applied here; dwell timers advance on the
    /// regular tick.
    pub fn on_topology_change(&mut self, grid: &ActivityGrid, topology: &TopologyRegistry) -> Vec<IndicatorCommand> {
        self.derive_raw(grid);
        for state in &mut self.indicators {
            if state.raw > state.output {
                state.output = state.raw;
                state.dwell_s = 0;
                state.dwell_active = true;
            }
        }
        let all: Vec<usize> = (0..self.indicators.len()).collect();
        self.commands(&all, topology)
    }

    fn derive_raw(&mut self, grid: &ActivityGrid) {
        let mut raw = [AlertLevel::Idle; INDICATORS];
        for cell in grid.indices() {
            let contributions = &corner_table(cell)[class_row(grid.classify(cell))];
            for (level, contribution) in raw.iter_mut().zip(contributions) {
                *level = escalate(*level, *contribution);
            }
        }
        for (state, level) in self.indicators.iter_mut().zip(raw) {
            state.raw = level;
        }
    }

    /// Apply one second of hysteresis to indicator `index`.  Returns `true`
    /// when the output level changed.
    fn update_output(&mut self, index: usize) -> bool {
        let (concern_dwell, alarm_dwell) = (self.concern_dwell_s, self.alarm_dwell_s);
        let state = &mut self.indicators[index];

        if state.raw > state.output {
            info!(indicator = index, from = ?state.output, to = ?state.raw, "indicator escalated");
            state.output = state.raw;
            state.dwell_s = 0;
            state.dwell_active = true;
            return true;
        }

        if state.raw == state.output {
            if state.dwell_active {
                state.dwell_s += 1;
            }
            return false;
        }

        let floor = match state.output {
            AlertLevel::Alarm => alarm_dwell,
            AlertLevel::Concern => concern_dwell,
            AlertLevel::Idle => 0,
        };
        if state.dwell_active && state.dwell_s < floor {
            state.dwell_s += 1;
            return false;
        }

        let lowered = state.output.step_down();
        info!(indicator = index, from = ?state.output, to = ?lowered, held_s = state.dwell_s, "indicator stepped down");
        state.output = lowered;
        state.dwell_s = 0;
        state.dwell_active = lowered != AlertLevel::Idle;
        true
    }

    fn commands(&self, indices: &[usize], topology: &TopologyRegistry) -> Vec<IndicatorCommand> {
        indices
            .iter()
            .filter_map(|&i| {
                let position = self.indicator_position(i);
                match topology.lookup_by_coordinate(position) {
                    Some(node) => Some(IndicatorCommand::for_level(node.node_id, self.indicators[i].output)),
                    None => {
                        warn!(indicator = i, x = position.x, y = position.y, "no node provisioned for indicator");
                        None
                    }
                }
            })
            .inspect(|cmd| debug!(node_id = cmd.node_id, level = ?cmd.level, "indicator command"))
            .collect()
    }

    /// Indicators sit on the roadside node row, left to right.
    fn indicator_position(&self, index: usize) -> GridPosition {
        GridPosition::new(index as i8 - self.layout.half_x(), self.layout.half_y())
    }
}
