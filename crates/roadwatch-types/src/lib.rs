//! `roadwatch-types` – shared vocabulary of the roadwatch gateway.
//!
//! Every other crate speaks in these types: node and sensor identities,
//! grid coordinates, rotations, the inbound events delivered by the
//! transport layer, the outbound indicator commands, and the single
//! [`CoreError`] taxonomy.

pub mod config;

pub use config::{AlgorithmConfig, GridLayout};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier assigned to a field node at provisioning time.  Zero is never a
/// valid node id.
pub type NodeId = u16;

/// Fixed size of every page carried by the broadcast transport.
pub const PAYLOAD_LEN: usize = 8;

/// One page worth of bytes.
pub type Payload = [u8; PAYLOAD_LEN];

/// The payload broadcast while nothing is queued.
pub const IDLE_PAYLOAD: Payload = [0; PAYLOAD_LEN];

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// Rotation expressed in compass octants (0 = 0°, 1 = 45°, … 7 = 315°).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Octant(u8);

impl Octant {
    pub const DEG_0: Octant = Octant(0);
    pub const DEG_90: Octant = Octant(2);
    pub const DEG_180: Octant = Octant(4);
    pub const DEG_270: Octant = Octant(6);

    /// Returns `None` for values outside `0..8`.
    pub fn new(raw: u8) -> Option<Self> {
        (raw < 8).then_some(Octant(raw))
    }

    /// Keep only the low three bits, as the wire format does.
    pub fn from_bits(raw: u8) -> Self {
        Octant(raw & 0x07)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn degrees(self) -> u16 {
        u16::from(self.0) * 45
    }

    /// Sum of two rotations, wrapping at 360°.
    pub fn combine(self, other: Octant) -> Octant {
        Octant((self.0 + other.0) % 8)
    }

    /// The cardinal direction for this rotation, if it is one.
    pub fn facing(self) -> Option<Facing> {
        match self.0 {
            0 => Some(Facing::Up),
            2 => Some(Facing::Right),
            4 => Some(Facing::Down),
            6 => Some(Facing::Left),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Octant {
    type Error = CoreError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Octant::new(raw).ok_or_else(|| CoreError::InvalidConfig(format!("rotation {raw} is not an octant")))
    }
}

impl From<Octant> for u8 {
    fn from(o: Octant) -> u8 {
        o.0
    }
}

impl std::fmt::Display for Octant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Cardinal direction a sensor points at, in position coordinates.
///
/// `Up` is +y, which points toward the road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Up,
    Right,
    Down,
    Left,
}

impl Facing {
    /// One grid step in this direction as `(dx, dy)`.
    pub fn step(self) -> (i8, i8) {
        match self {
            Facing::Up => (0, 1),
            Facing::Right => (1, 0),
            Facing::Down => (0, -1),
            Facing::Left => (-1, 0),
        }
    }
}

/// Node coordinate on the provisioned grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i8,
    pub y: i8,
}

impl GridPosition {
    pub fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    /// Position `n` steps away in `facing`, saturating at the `i8` range.
    pub fn stepped(self, facing: Facing, n: i8) -> Self {
        let (dx, dy) = facing.step();
        Self {
            x: self.x.saturating_add(dx.saturating_mul(n)),
            y: self.y.saturating_add(dy.saturating_mul(n)),
        }
    }
}

/// Sub-cell placement correction, in units of the configured offset scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridOffset {
    pub x: i8,
    pub y: i8,
}

impl GridOffset {
    /// Component of this offset along `facing`.
    pub fn along(self, facing: Facing) -> i32 {
        let (dx, dy) = facing.step();
        i32::from(dx) * i32::from(self.x) + i32::from(dy) * i32::from(self.y)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Nodes and sensors
// ────────────────────────────────────────────────────────────────────────────

/// Kind of physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Passive infrared motion sensor reporting a boolean.
    Motion,
    /// Time-of-flight ranging sensor reporting a distance.
    Ranging,
}

impl SensorKind {
    /// Code used in sensor error pages.
    pub fn wire_code(self) -> u8 {
        match self {
            SensorKind::Motion => 1,
            SensorKind::Ranging => 2,
        }
    }
}

/// Hardware configuration of a node, which fixes the sensors it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Unknown,
    PirPir,
    PirLidar,
    PirLidarLed,
}

const PIR_PIR_SENSORS: [(Octant, SensorKind); 2] =
    [(Octant::DEG_0, SensorKind::Motion), (Octant::DEG_270, SensorKind::Motion)];
const PIR_LIDAR_SENSORS: [(Octant, SensorKind); 2] =
    [(Octant::DEG_0, SensorKind::Ranging), (Octant::DEG_90, SensorKind::Motion)];

impl NodeType {
    /// Decode the two-bit type field of a position configuration page.
    pub fn from_bits(raw: u8) -> Self {
        match raw & 0x03 {
            1 => NodeType::PirPir,
            2 => NodeType::PirLidar,
            3 => NodeType::PirLidarLed,
            _ => NodeType::Unknown,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            NodeType::Unknown => 0,
            NodeType::PirPir => 1,
            NodeType::PirLidar => 2,
            NodeType::PirLidarLed => 3,
        }
    }

    /// Sensors mounted on this node type, as (rotation relative to the node,
    /// kind).
    pub fn sensors(self) -> &'static [(Octant, SensorKind)] {
        match self {
            NodeType::Unknown => &[],
            NodeType::PirPir => &PIR_PIR_SENSORS,
            NodeType::PirLidar | NodeType::PirLidarLed => &PIR_LIDAR_SENSORS,
        }
    }
}

/// Identity of one physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorKey {
    pub node_id: NodeId,
    pub rotation: Octant,
    pub kind: SensorKind,
}

/// Raw reading carried by a sensor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SensorReading {
    Motion { detected: bool },
    Ranging { distance_cm: u16 },
}

/// A sensor report relayed by the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub node_id: NodeId,
    pub rotation: Octant,
    pub reading: SensorReading,
}

impl SensorEvent {
    pub fn motion(node_id: NodeId, rotation: Octant, detected: bool) -> Self {
        Self { node_id, rotation, reading: SensorReading::Motion { detected } }
    }

    pub fn ranging(node_id: NodeId, rotation: Octant, distance_cm: u16) -> Self {
        Self { node_id, rotation, reading: SensorReading::Ranging { distance_cm } }
    }

    pub fn kind(&self) -> SensorKind {
        match self.reading {
            SensorReading::Motion { .. } => SensorKind::Motion,
            SensorReading::Ranging { .. } => SensorKind::Ranging,
        }
    }

    pub fn key(&self) -> SensorKey {
        SensorKey { node_id: self.node_id, rotation: self.rotation, kind: self.kind() }
    }
}

/// Authoritative placement of a node, as provisioned by the configuration
/// application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionConfig {
    pub node_id: NodeId,
    pub position: GridPosition,
    #[serde(default)]
    pub offset: GridOffset,
    pub rotation: Octant,
    pub node_type: NodeType,
}

// ────────────────────────────────────────────────────────────────────────────
// Transport pages
// ────────────────────────────────────────────────────────────────────────────

/// Logical message type multiplexed onto the broadcast slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageTag(pub u8);

impl PageTag {
    pub const POSITION_CONFIG: PageTag = PageTag(0x11);
    pub const ACKNOWLEDGEMENT: PageTag = PageTag(0x20);
    pub const RANGING_SAMPLE: PageTag = PageTag(0x21);
    pub const MOTION_SAMPLE: PageTag = PageTag(0x22);
    pub const ACTIVITY_VARIABLE: PageTag = PageTag(0x23);
    pub const INDICATOR_STATUS: PageTag = PageTag(0x24);
    pub const HYPERACTIVE_SENSOR: PageTag = PageTag(0x25);
    pub const INACTIVE_SENSOR: PageTag = PageTag(0x26);
}

impl std::fmt::Display for PageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Acknowledgment received from the monitoring application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEvent {
    /// Page type being acknowledged.
    pub page: PageTag,
    pub message_id: u8,
}

// ────────────────────────────────────────────────────────────────────────────
// Alerting
// ────────────────────────────────────────────────────────────────────────────

/// Threshold class of one activity cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    Idle,
    Possible,
    Detected,
}

impl Classification {
    pub fn wire_code(self) -> u8 {
        match self {
            Classification::Idle => 0,
            Classification::Possible => 1,
            Classification::Detected => 2,
        }
    }
}

/// Signalling level of a roadside indicator.  Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AlertLevel {
    #[default]
    Idle,
    Concern,
    Alarm,
}

impl AlertLevel {
    /// One level less severe, saturating at `Idle`.
    pub fn step_down(self) -> AlertLevel {
        match self {
            AlertLevel::Alarm => AlertLevel::Concern,
            AlertLevel::Concern | AlertLevel::Idle => AlertLevel::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedFunction {
    Off,
    Blinking,
    Solid,
}

impl LedFunction {
    pub fn wire_code(self) -> u8 {
        match self {
            LedFunction::Off => 0,
            LedFunction::Blinking => 1,
            LedFunction::Solid => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColour {
    Yellow,
    Red,
}

impl LedColour {
    pub fn wire_code(self) -> u8 {
        match self {
            LedColour::Yellow => 0,
            LedColour::Red => 1,
        }
    }
}

/// Command for the LED strip of one indicator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorCommand {
    pub node_id: NodeId,
    pub level: AlertLevel,
    pub function: LedFunction,
    pub colour: LedColour,
}

impl IndicatorCommand {
    /// The LED behaviour that signals `level`.
    pub fn for_level(node_id: NodeId, level: AlertLevel) -> Self {
        let (function, colour) = match level {
            AlertLevel::Idle => (LedFunction::Off, LedColour::Red),
            AlertLevel::Concern => (LedFunction::Blinking, LedColour::Yellow),
            AlertLevel::Alarm => (LedFunction::Blinking, LedColour::Red),
        };
        Self { node_id, level, function, colour }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error taxonomy of the gateway core.
///
/// [`CoreError::CapacityExhausted`] is fatal: pools are sized to the
/// deployment and silently recovering would corrupt the spatial model.  The
/// remaining variants describe inputs that are dropped without mutating
/// state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Capacity exhausted in {pool} (capacity {capacity})")]
    CapacityExhausted { pool: &'static str, capacity: usize },

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Unsupported rotation {0}")]
    UnsupportedRotation(Octant),

    #[error("Malformed page {page}: {details}")]
    MalformedPage { page: PageTag, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    /// Whether the gateway must halt on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::CapacityExhausted { .. })
    }
}
