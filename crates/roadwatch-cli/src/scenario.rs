//! Deterministic replay of recorded or hand-written field scenarios.
//!
//! A scenario is a TOML list of steps executed in order.  Time only moves on
//! `advance` steps, so a replay is reproducible to the bit.
//!
//! ```toml
//! [[step]]
//! action = "position"
//! node_id = 1
//! position = { x = -1, y = 1 }
//! rotation = 4
//! node_type = "pir_pir"
//!
//! [[step]]
//! action = "motion"
//! node_id = 1
//! rotation = 0
//! detected = true
//!
//! [[step]]
//! action = "advance"
//! seconds = 90
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use roadwatch_runtime::Gateway;
use roadwatch_types::{AckEvent, CoreError, IndicatorCommand, NodeId, Octant, PageTag, PositionConfig, SensorEvent};

/// One scripted stimulus.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Position(PositionConfig),
    Motion { node_id: NodeId, rotation: Octant, detected: bool },
    Ranging { node_id: NodeId, rotation: Octant, distance_cm: u16 },
    Ack { page: u8, message_id: u8 },
    Advance { seconds: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(rename = "step", default)]
    pub steps: Vec<Step>,
}

/// An indicator command stamped with the replay second it was produced in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedCommand {
    pub second: u64,
    pub command: IndicatorCommand,
}

impl Scenario {
    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| format!("Failed to parse scenario: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read scenario at {}: {}", path.display(), e))?;
        Self::parse(&raw)
    }

    /// Total simulated seconds.
    pub fn duration_s(&self) -> u64 {
        self.steps
            .iter()
            .map(|s| match s {
                Step::Advance { seconds } => u64::from(*seconds),
                _ => 0,
            })
            .sum()
    }
}

/// Play `scenario` against `gateway` and collect every indicator command.
///
/// Each simulated second also rotates the broadcast slot once per channel
/// period.
///
/// # Errors
///
/// The first fatal [`CoreError`]; the replay stops there.
pub fn replay(scenario: &Scenario, gateway: &mut Gateway) -> Result<Vec<TimedCommand>, CoreError> {
    let periods_per_second = (1_000 / gateway.config().page_period_ms.max(1)).max(1);
    let mut now = 0u64;
    let mut timeline = Vec::new();

    for step in &scenario.steps {
        match *step {
            Step::Position(config) => gateway.on_position_config(config)?,
            Step::Motion { node_id, rotation, detected } => {
                gateway.on_sensor_event(SensorEvent::motion(node_id, rotation, detected))?
            }
            Step::Ranging { node_id, rotation, distance_cm } => {
                gateway.on_sensor_event(SensorEvent::ranging(node_id, rotation, distance_cm))?
            }
            Step::Ack { page, message_id } => gateway.on_ack(AckEvent { page: PageTag(page), message_id })?,
            Step::Advance { seconds } => {
                for _ in 0..seconds {
                    now += 1;
                    gateway.on_second()?;
                    for _ in 0..periods_per_second {
                        gateway.on_page_period();
                    }
                    timeline.extend(
                        gateway
                            .drain_commands()
                            .into_iter()
                            .map(|command| TimedCommand { second: now, command }),
                    );
                }
            }
        }
        debug!(second = now, ?step, "scenario step applied");
    }
    timeline.extend(
        gateway
            .drain_commands()
            .into_iter()
            .map(|command| TimedCommand { second: now, command }),
    );
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadwatch_runtime::GatewayConfig;
    use roadwatch_types::{AlertLevel, AlgorithmConfig, GridPosition, NodeType};

    const ROADSIDE_ALARM: &str = r#"
[[step]]
action = "position"
node_id = 1
position = { x = -1, y = 1 }
rotation = 4
node_type = "pir_pir"

[[step]]
action = "position"
node_id = 2
position = { x = -1, y = -1 }
rotation = 0
node_type = "pir_lidar"

[[step]]
action = "motion"
node_id = 1
rotation = 0
detected = true

[[step]]
action = "advance"
seconds = 5

[[step]]
action = "ranging"
node_id = 2
rotation = 0
distance_cm = 350

[[step]]
action = "motion"
node_id = 1
rotation = 0
detected = false

[[step]]
action = "ranging"
node_id = 2
rotation = 0
distance_cm = 2000

[[step]]
action = "advance"
seconds = 180
"#;

    fn gateway() -> Gateway {
        Gateway::new(AlgorithmConfig::default(), GatewayConfig::default()).unwrap()
    }

    #[test]
    fn parses_every_step_kind() {
        let scenario = Scenario::parse(
            r#"
[[step]]
action = "ack"
page = 0x24
message_id = 3

[[step]]
action = "advance"
seconds = 2
"#,
        )
        .unwrap();
        assert_eq!(
            scenario.steps,
            vec![Step::Ack { page: 0x24, message_id: 3 }, Step::Advance { seconds: 2 }]
        );

        let full = Scenario::parse(ROADSIDE_ALARM).unwrap();
        assert_eq!(full.steps.len(), 8);
        assert_eq!(full.duration_s(), 185);
        match &full.steps[0] {
            Step::Position(p) => {
                assert_eq!(p.position, GridPosition::new(-1, 1));
                assert_eq!(p.rotation, Octant::DEG_180);
                assert_eq!(p.node_type, NodeType::PirPir);
            }
            other => panic!("unexpected first step {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_action() {
        let err = Scenario::parse("[[step]]\naction = \"teleport\"\n").unwrap_err();
        assert!(err.contains("Failed to parse scenario"));
    }

    #[test]
    fn replay_raises_then_releases_alarm() {
        let scenario = Scenario::parse(ROADSIDE_ALARM).unwrap();
        let mut gw = gateway();
        let timeline = replay(&scenario, &mut gw).unwrap();

        let node_1: Vec<&TimedCommand> = timeline.iter().filter(|t| t.command.node_id == 1).collect();
        let raised = node_1.iter().find(|t| t.command.level == AlertLevel::Alarm).expect("alarm raised");
        let released = node_1
            .iter()
            .find(|t| t.second > raised.second && t.command.level == AlertLevel::Idle)
            .expect("alarm released");
        assert!(released.second - raised.second >= 60);
        assert_eq!(gw.alerts().output(0), Some(AlertLevel::Idle));
    }

    #[test]
    fn fatal_error_aborts_replay() {
        let config = GatewayConfig { node_capacity: 1, ..Default::default() };
        let mut gw = Gateway::new(AlgorithmConfig::default(), config).unwrap();
        let scenario = Scenario::parse(ROADSIDE_ALARM).unwrap();
        assert!(replay(&scenario, &mut gw).unwrap_err().is_fatal());
    }
}
