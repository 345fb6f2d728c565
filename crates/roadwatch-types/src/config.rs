//! Tuning parameters of the activity model, supplied once at start-up.
//!
//! Every field carries a serde default so a partial TOML table only needs to
//! name the values it changes.
//!
//! # Example
//!
//! ```
//! use roadwatch_types::AlgorithmConfig;
//!
//! let cfg = AlgorithmConfig::default();
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.grid.cells_x(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::{CoreError, SensorKind};

/// Dimensions of the provisioned node grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    #[serde(default = "default_nodes")]
    pub nodes_x: u8,
    #[serde(default = "default_nodes")]
    pub nodes_y: u8,
}

impl GridLayout {
    /// Activity cells lie between node columns.
    pub fn cells_x(&self) -> usize {
        usize::from(self.nodes_x.saturating_sub(1))
    }

    pub fn cells_y(&self) -> usize {
        usize::from(self.nodes_y.saturating_sub(1))
    }

    /// Largest coordinate magnitude along x (nodes span `-half..=half`).
    pub fn half_x(&self) -> i8 {
        (self.nodes_x / 2) as i8
    }

    pub fn half_y(&self) -> i8 {
        (self.nodes_y / 2) as i8
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self { nodes_x: default_nodes(), nodes_y: default_nodes() }
    }
}

fn default_nodes() -> u8 {
    3
}

/// Numeric constants of the growth, decay, alerting and health models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(default)]
    pub grid: GridLayout,

    /// Floor every cell decays toward.
    #[serde(default = "default_av_min")]
    pub av_min: f32,
    #[serde(default = "default_av_max")]
    pub av_max: f32,

    #[serde(default = "default_one")]
    pub common_weight: f32,
    #[serde(default = "default_motion_weight")]
    pub motion_weight: f32,
    #[serde(default = "default_ranging_weight")]
    pub ranging_weight: f32,
    /// Indexed by the affected cell's row, row 0 being the roadside.  Rows
    /// past the end reuse the last factor.
    ///
    /// Keyed on the cell rather than on the reporting node, so a detection
    /// is weighted by where the animal is, not where the post stands.  The
    /// default 3x3 node grid has two cell rows and never reaches the third
    /// entry; it applies from the third row inland on larger grids.
    #[serde(default = "default_road_proximity")]
    pub road_proximity: Vec<f32>,

    #[serde(default = "default_one")]
    pub common_trickle: f32,
    #[serde(default = "default_motion_trickle")]
    pub motion_trickle: f32,
    #[serde(default = "default_ranging_trickle")]
    pub ranging_trickle: f32,
    #[serde(default = "default_road_trickle")]
    pub road_trickle: Vec<f32>,

    /// Multiplier applied to every cell above the floor once per second.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f32,

    #[serde(default = "default_possible_roadside")]
    pub possible_threshold_roadside: f32,
    #[serde(default = "default_possible_inland")]
    pub possible_threshold_inland: f32,
    #[serde(default = "default_detection_roadside")]
    pub detection_threshold_roadside: f32,
    #[serde(default = "default_detection_inland")]
    pub detection_threshold_inland: f32,

    /// Minimum seconds an indicator holds Concern before stepping down.
    #[serde(default = "default_concern_dwell")]
    pub concern_dwell_s: u32,
    /// Minimum seconds an indicator holds Alarm before stepping down.
    #[serde(default = "default_alarm_dwell")]
    pub alarm_dwell_s: u32,
    #[serde(default = "default_reinforcement_period")]
    pub reinforcement_period_s: u32,

    /// Number of timestamps kept per sensor for hyperactivity detection.
    #[serde(default = "default_hyperactivity_window")]
    pub hyperactivity_window: usize,
    /// Average minutes between events below which a sensor is hyperactive.
    #[serde(default = "default_one")]
    pub hyperactivity_threshold_minutes: f32,

    /// Nominal spacing between neighbouring nodes.
    #[serde(default = "default_node_separation")]
    pub node_separation_cm: u16,
    /// Length of one unit of node offset.
    #[serde(default = "default_offset_scale")]
    pub offset_scale_cm: u16,
}

fn default_av_min() -> f32 {
    1.0
}
fn default_av_max() -> f32 {
    12.0
}
fn default_one() -> f32 {
    1.0
}
fn default_motion_weight() -> f32 {
    3.0
}
fn default_ranging_weight() -> f32 {
    3.5
}
fn default_road_proximity() -> Vec<f32> {
    vec![1.4, 1.2, 1.0]
}
fn default_motion_trickle() -> f32 {
    1.003
}
fn default_ranging_trickle() -> f32 {
    1.0035
}
fn default_road_trickle() -> Vec<f32> {
    vec![1.004, 1.002, 1.0]
}
fn default_decay_factor() -> f32 {
    0.99
}
fn default_possible_roadside() -> f32 {
    3.0
}
fn default_possible_inland() -> f32 {
    4.0
}
fn default_detection_roadside() -> f32 {
    6.0
}
fn default_detection_inland() -> f32 {
    7.0
}
fn default_concern_dwell() -> u32 {
    30
}
fn default_alarm_dwell() -> u32 {
    60
}
fn default_reinforcement_period() -> u32 {
    10
}
fn default_hyperactivity_window() -> usize {
    120
}
fn default_node_separation() -> u16 {
    500
}
fn default_offset_scale() -> u16 {
    5
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            grid: GridLayout::default(),
            av_min: default_av_min(),
            av_max: default_av_max(),
            common_weight: default_one(),
            motion_weight: default_motion_weight(),
            ranging_weight: default_ranging_weight(),
            road_proximity: default_road_proximity(),
            common_trickle: default_one(),
            motion_trickle: default_motion_trickle(),
            ranging_trickle: default_ranging_trickle(),
            road_trickle: default_road_trickle(),
            decay_factor: default_decay_factor(),
            possible_threshold_roadside: default_possible_roadside(),
            possible_threshold_inland: default_possible_inland(),
            detection_threshold_roadside: default_detection_roadside(),
            detection_threshold_inland: default_detection_inland(),
            concern_dwell_s: default_concern_dwell(),
            alarm_dwell_s: default_alarm_dwell(),
            reinforcement_period_s: default_reinforcement_period(),
            hyperactivity_window: default_hyperactivity_window(),
            hyperactivity_threshold_minutes: default_one(),
            node_separation_cm: default_node_separation(),
            offset_scale_cm: default_offset_scale(),
        }
    }
}

impl AlgorithmConfig {
    /// Growth multiplier for a fresh detection landing in `row`.
    pub fn growth_factor(&self, kind: SensorKind, row: usize) -> f32 {
        let kind_weight = match kind {
            SensorKind::Motion => self.motion_weight,
            SensorKind::Ranging => self.ranging_weight,
        };
        self.common_weight * kind_weight * row_factor(&self.road_proximity, row)
    }

    /// Per-second multiplier for a detection that is still active in `row`.
    pub fn trickle_factor(&self, kind: SensorKind, row: usize) -> f32 {
        let kind_trickle = match kind {
            SensorKind::Motion => self.motion_trickle,
            SensorKind::Ranging => self.ranging_trickle,
        };
        self.common_trickle * kind_trickle * row_factor(&self.road_trickle, row)
    }

    /// Reject parameter sets the models cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: &str| Err(CoreError::InvalidConfig(msg.to_string()));

        if self.grid.nodes_x < 2 || self.grid.nodes_y < 2 || self.grid.nodes_x > 15 || self.grid.nodes_y > 15 {
            return invalid("grid must have between 2 and 15 nodes per axis");
        }
        if !(self.av_min > 0.0 && self.av_min < self.av_max) {
            return invalid("av_min must be positive and below av_max");
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return invalid("decay_factor must lie in (0, 1]");
        }
        if self.road_proximity.is_empty() || self.road_trickle.is_empty() {
            return invalid("road proximity tables must not be empty");
        }
        let weights = [
            self.common_weight,
            self.motion_weight,
            self.ranging_weight,
            self.common_trickle,
            self.motion_trickle,
            self.ranging_trickle,
        ];
        if weights
            .iter()
            .chain(&self.road_proximity)
            .chain(&self.road_trickle)
            .any(|w| !(*w > 0.0))
        {
            return invalid("weights must be positive");
        }
        if self.possible_threshold_roadside > self.detection_threshold_roadside
            || self.possible_threshold_inland > self.detection_threshold_inland
        {
            return invalid("possible threshold must not exceed detection threshold");
        }
        if self.hyperactivity_window < 2 {
            return invalid("hyperactivity_window must hold at least 2 events");
        }
        if self.reinforcement_period_s == 0 {
            return invalid("reinforcement_period_s must be at least 1");
        }
        Ok(())
    }
}

fn row_factor(table: &[f32], row: usize) -> f32 {
    table.get(row).or_else(|| table.last()).copied().unwrap_or(1.0)
}
