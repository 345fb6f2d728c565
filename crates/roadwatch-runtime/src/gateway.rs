//! [`Gateway`] – the single owner of all gateway state.
//!
//! Every stimulus enters through one of the `on_*` methods and runs to
//! completion before the next one; nothing is shared and nothing is locked.
//!
//! # Per-second pipeline
//!
//! ```text
//! topology sync → decay → trickle → alert update → activity echo → minute/hour/day
//! ```
//!
//! # Errors
//!
//! Inputs that cannot be interpreted (unknown node, odd rotation, malformed
//! page, node id 0) are logged with `warn!` and dropped.  Exhausting a fixed
//! pool is fatal and is returned to the caller, which must stop.

use roadwatch_kernel::{AlertStateMachine, HealthChange, HealthCondition, SensorHealthMonitor};
use roadwatch_middleware::{
    KeyedBroadcaster, MonitoringDispatch, PagePool, SensorErrorReporter, codec,
};
use roadwatch_perception::{
    ActivityGrid, CellIndex, DebounceState, DecayEngine, DetectionTranslator, TopologyRegistry,
};
use roadwatch_types::{
    AckEvent, AlgorithmConfig, Classification, CoreError, IndicatorCommand, NodeId, PageTag, Payload,
    PositionConfig, SensorEvent, SensorReading,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scheduler::TickScheduler;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Pool sizes and periods of one gateway deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Field nodes the topology registry can hold.
    #[serde(default = "default_node_capacity")]
    pub node_capacity: usize,
    /// Sensors tracked for debouncing and health.
    #[serde(default = "default_sensor_capacity")]
    pub sensor_capacity: usize,
    /// Page copies sharing the broadcast slot.
    #[serde(default = "default_page_pool_capacity")]
    pub page_pool_capacity: usize,
    /// Raw samples waiting for the monitoring application.
    #[serde(default = "default_sample_queue_capacity")]
    pub sample_queue_capacity: usize,
    #[serde(default = "default_sensor_error_capacity")]
    pub sensor_error_capacity: usize,
    /// Radio channel period in milliseconds.
    #[serde(default = "default_page_period_ms")]
    pub page_period_ms: u64,
}

fn default_node_capacity() -> usize {
    9
}
fn default_sensor_capacity() -> usize {
    18
}
fn default_page_pool_capacity() -> usize {
    16
}
fn default_sample_queue_capacity() -> usize {
    roadwatch_middleware::dispatch::DEFAULT_QUEUE_CAPACITY
}
fn default_sensor_error_capacity() -> usize {
    roadwatch_middleware::sensor_error::DEFAULT_CAPACITY
}
fn default_page_period_ms() -> u64 {
    // 8192 ticks of a 32768 Hz clock, times 2000 / 1000.
    500
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            node_capacity: default_node_capacity(),
            sensor_capacity: default_sensor_capacity(),
            page_pool_capacity: default_page_pool_capacity(),
            sample_queue_capacity: default_sample_queue_capacity(),
            sensor_error_capacity: default_sensor_error_capacity(),
            page_period_ms: default_page_period_ms(),
        }
    }
}

const INDICATOR_ECHO_REPLICAS: usize = 1;
const ACTIVITY_ECHO_REPLICAS: usize = 2;

/// Turn a recoverable error into a logged drop.  Fatal errors propagate.
fn recover<T>(result: Result<T, CoreError>, input: &'static str) -> Result<Option<T>, CoreError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, input, "input dropped");
            Ok(None)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gateway
// ────────────────────────────────────────────────────────────────────────────

/// Owns the spatial model, the alerting logic and the broadcast slot.
pub struct Gateway {
    config: GatewayConfig,
    topology: TopologyRegistry,
    grid: ActivityGrid,
    translator: DetectionTranslator,
    decay: DecayEngine,
    health: SensorHealthMonitor,
    alerts: AlertStateMachine,

    pool: PagePool,
    samples: MonitoringDispatch,
    indicator_echo: KeyedBroadcaster<NodeId>,
    activity_echo: KeyedBroadcaster<u8>,
    sensor_errors: SensorErrorReporter,

    scheduler: TickScheduler,
    minute: u32,
    last_class: Vec<Classification>,
    outbox: Vec<IndicatorCommand>,
}

impl Gateway {
    /// Build a gateway from validated parameters.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidConfig`] when `algorithm` fails validation or
    /// describes a layout the alerting cannot serve.
    pub fn new(algorithm: AlgorithmConfig, config: GatewayConfig) -> Result<Self, CoreError> {
        algorithm.validate()?;
        let alerts = AlertStateMachine::new(&algorithm)?;
        let grid = ActivityGrid::new(&algorithm);
        let cells = grid.cols() * grid.rows();
        let indicators = alerts.indicators().len();

        info!(
            nodes = config.node_capacity,
            sensors = config.sensor_capacity,
            pages = config.page_pool_capacity,
            cells,
            "gateway initialised"
        );
        Ok(Self {
            topology: TopologyRegistry::new(config.node_capacity),
            translator: DetectionTranslator::new(&algorithm, config.sensor_capacity),
            decay: DecayEngine::new(&algorithm),
            health: SensorHealthMonitor::new(&algorithm, config.sensor_capacity),
            alerts,
            pool: PagePool::new(config.page_pool_capacity),
            samples: MonitoringDispatch::new(config.sample_queue_capacity),
            indicator_echo: KeyedBroadcaster::new(
                "indicator echo slots",
                PageTag::INDICATOR_STATUS,
                INDICATOR_ECHO_REPLICAS,
                indicators,
            ),
            activity_echo: KeyedBroadcaster::new(
                "activity echo slots",
                PageTag::ACTIVITY_VARIABLE,
                ACTIVITY_ECHO_REPLICAS,
                cells,
            ),
            sensor_errors: SensorErrorReporter::new(config.sensor_error_capacity),
            scheduler: TickScheduler::new(),
            minute: 1,
            last_class: vec![Classification::Idle; cells],
            outbox: Vec::new(),
            grid,
            config,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn topology(&self) -> &TopologyRegistry {
        &self.topology
    }

    pub fn grid(&self) -> &ActivityGrid {
        &self.grid
    }

    pub fn alerts(&self) -> &AlertStateMachine {
        &self.alerts
    }

    pub fn health(&self) -> &SensorHealthMonitor {
        &self.health
    }

    pub fn pool(&self) -> &PagePool {
        &self.pool
    }

    pub fn samples(&self) -> &MonitoringDispatch {
        &self.samples
    }

    /// Minute counter used to timestamp sensor activity.  Starts at 1.
    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Payload currently on air.
    pub fn outgoing(&self) -> Payload {
        self.pool.outgoing()
    }

    /// Indicator commands produced since the last drain, oldest first.
    pub fn drain_commands(&mut self) -> Vec<IndicatorCommand> {
        std::mem::take(&mut self.outbox)
    }

    // ── Inbound ────────────────────────────────────────────────────────────

    /// Store a node placement.  Dependent components catch up on the next
    /// second.
    pub fn on_position_config(&mut self, config: PositionConfig) -> Result<(), CoreError> {
        recover(self.topology.upsert(config), "position config")?;
        Ok(())
    }

    /// Decode a 0x11 page and store the placement it carries.
    pub fn on_position_page(&mut self, payload: &Payload) -> Result<(), CoreError> {
        match recover(codec::decode_position_page(payload), "position page")? {
            Some(config) => self.on_position_config(config),
            None => Ok(()),
        }
    }

    /// Feed one sensor report through the model and forward it to the
    /// monitoring application.
    ///
    /// A pending topology change is applied first, so the event is read
    /// against the placement it was sent under.
    pub fn on_sensor_event(&mut self, event: SensorEvent) -> Result<(), CoreError> {
        self.sync_topology()?;
        let key = event.key();
        let suppressed = self.health.is_hyperactive(&key);
        let translated = self.translator.translate(&event, suppressed, &self.topology, &mut self.grid);
        let Some(translation) = recover(translated, "sensor event")? else {
            return Ok(());
        };

        if let Some(change) = self.health.record_activity(key, self.minute)? {
            self.publish_health(change)?;
        }

        match (event.reading, translation.state) {
            (SensorReading::Ranging { distance_cm }, DebounceState::Ranging(zone)) => {
                self.samples
                    .push_ranging(key.node_id, key.rotation, distance_cm, zone.wire_code(), &mut self.pool)?;
            }
            (SensorReading::Motion { detected }, _) => {
                self.samples.push_motion(key.node_id, key.rotation, detected, &mut self.pool)?;
            }
            (SensorReading::Ranging { .. }, _) => {}
        }

        for cell in translation.grown {
            self.echo_cell(cell)?;
        }
        Ok(())
    }

    /// Route an acknowledgment to the sender that owns its page.
    pub fn on_ack(&mut self, ack: AckEvent) -> Result<(), CoreError> {
        let handled = self.samples.on_ack(&ack, &mut self.pool)?
            || self.indicator_echo.on_ack(&ack, &mut self.pool)?
            || self.activity_echo.on_ack(&ack, &mut self.pool)?
            || self.sensor_errors.on_ack(&ack, &mut self.pool)?;
        if !handled {
            debug!(page = %ack.page, message_id = ack.message_id, "ack matched nothing");
        }
        Ok(())
    }

    // ── Periodic ───────────────────────────────────────────────────────────

    pub fn on_second(&mut self) -> Result<(), CoreError> {
        self.sync_topology()?;

        self.decay.tick(&mut self.grid);
        let health = &self.health;
        self.translator
            .trickle(|key| health.is_hyperactive(key), &self.topology, &mut self.grid);

        let commands = self.alerts.on_second(&self.grid, &self.topology);
        for command in commands {
            self.emit(command)?;
        }

        let changed: Vec<CellIndex> = self
            .grid
            .indices()
            .filter(|&cell| self.grid.classify(cell) != self.last_class[self.class_slot(cell)])
            .collect();
        for cell in changed {
            self.echo_cell(cell)?;
        }

        let ticks = self.scheduler.advance();
        if ticks.minute {
            self.on_minute()?;
        }
        if ticks.hour {
            self.on_hour()?;
        }
        if ticks.day {
            self.on_day()?;
        }
        Ok(())
    }

    /// Advance the minute counter and re-derive hyperactivity.
    pub fn on_minute(&mut self) -> Result<(), CoreError> {
        self.minute = self.minute.wrapping_add(1);
        for change in self.health.reevaluate_hyperactivity() {
            self.publish_health(change)?;
        }
        Ok(())
    }

    /// Re-announce every raised health flag.
    pub fn on_hour(&mut self) -> Result<(), CoreError> {
        for change in self.health.flagged() {
            self.publish_health(change)?;
        }
        Ok(())
    }

    /// Flag sensors that stayed silent all day.
    pub fn on_day(&mut self) -> Result<(), CoreError> {
        for change in self.health.reevaluate_inactivity(&self.topology) {
            self.publish_health(change)?;
        }
        Ok(())
    }

    /// Rotate the broadcast slot and return the payload now on air.
    pub fn on_page_period(&mut self) -> Payload {
        self.pool.on_channel_period()
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn sync_topology(&mut self) -> Result<(), CoreError> {
        if !self.topology.changed_since_last_read() {
            return Ok(());
        }
        self.topology.clear_changed();
        info!(nodes = self.topology.count_valid(), "topology changed");

        self.translator.on_topology_change(&self.topology);
        for change in self.health.on_topology_change(&self.topology) {
            self.publish_health(change)?;
        }
        let commands = self.alerts.on_topology_change(&self.grid, &self.topology);
        for command in commands {
            self.emit(command)?;
        }
        Ok(())
    }

    fn emit(&mut self, command: IndicatorCommand) -> Result<(), CoreError> {
        self.indicator_echo.publish(
            command.node_id,
            |id| codec::encode_indicator_status(id, &command),
            &mut self.pool,
        )?;
        self.outbox.push(command);
        Ok(())
    }

    fn echo_cell(&mut self, cell: CellIndex) -> Result<(), CoreError> {
        let Some(value) = self.grid.value(cell) else {
            return Ok(());
        };
        let class = self.grid.classify(cell);
        let slot = self.class_slot(cell);
        self.last_class[slot] = class;
        self.activity_echo.publish(
            codec::activity_key(cell.col, cell.row),
            |id| codec::encode_activity_variable(id, cell.col, cell.row, value, class),
            &mut self.pool,
        )
    }

    fn class_slot(&self, cell: CellIndex) -> usize {
        cell.row * self.grid.cols() + cell.col
    }

    fn publish_health(&mut self, change: HealthChange) -> Result<(), CoreError> {
        let tag = match change.condition {
            HealthCondition::Hyperactive => PageTag::HYPERACTIVE_SENSOR,
            HealthCondition::Inactive => PageTag::INACTIVE_SENSOR,
        };
        self.sensor_errors.report(change.key, tag, change.active, &mut self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadwatch_types::{AlertLevel, GridOffset, GridPosition, NodeType, Octant};

    // ---- helpers -------------------------------------------------------------

    fn node(node_id: NodeId, x: i8, y: i8, rotation: Octant, node_type: NodeType) -> PositionConfig {
        PositionConfig {
            node_id,
            position: GridPosition::new(x, y),
            offset: GridOffset::default(),
            rotation,
            node_type,
        }
    }

    fn gateway() -> Gateway {
        Gateway::new(AlgorithmConfig::default(), GatewayConfig::default()).unwrap()
    }

    /// Node A and B of the reference deployment plus LED nodes on the rest
    /// of the roadside row.
    fn deployed() -> Gateway {
        let mut gw = gateway();
        gw.on_position_config(node(1, -1, 1, Octant::DEG_180, NodeType::PirPir)).unwrap();
        gw.on_position_config(node(2, -1, -1, Octant::DEG_0, NodeType::PirLidar)).unwrap();
        gw.on_position_config(node(3, 0, 1, Octant::DEG_180, NodeType::PirLidarLed)).unwrap();
        gw.on_position_config(node(4, 1, 1, Octant::DEG_180, NodeType::PirLidarLed)).unwrap();
        gw
    }

    fn level_of(commands: &[IndicatorCommand], node_id: NodeId) -> Option<AlertLevel> {
        commands.iter().rev().find(|c| c.node_id == node_id).map(|c| c.level)
    }

    // ---- end to end ----------------------------------------------------------

    #[test]
    fn motion_then_ranging_raises_and_releases_roadside_alarm() {
        let mut gw = deployed();
        gw.on_second().unwrap();
        let initial = gw.drain_commands();
        assert_eq!(initial.len(), 3);
        assert!(initial.iter().all(|c| c.level == AlertLevel::Idle));

        // Node A's motion sensor looks away from the road into cell (0,0).
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, true)).unwrap();
        let roadside = CellIndex::new(0, 0);
        assert!((gw.grid().value(roadside).unwrap() - 4.2).abs() < 1e-4);
        assert_eq!(gw.pool().count(PageTag::MOTION_SAMPLE), 2);
        assert!(gw.pool().count(PageTag::ACTIVITY_VARIABLE) > 0);

        gw.on_second().unwrap();
        let raised = gw.drain_commands();
        assert_eq!(level_of(&raised, 1), Some(AlertLevel::Alarm));
        assert_eq!(level_of(&raised, 3), Some(AlertLevel::Concern));

        for _ in 0..4 {
            gw.on_second().unwrap();
        }
        // Node B ranges a target in front of the first node ahead.
        gw.on_sensor_event(SensorEvent::ranging(2, Octant::DEG_0, 350)).unwrap();
        let inland = CellIndex::new(0, 1);
        assert!((gw.grid().value(inland).unwrap() - 4.2).abs() < 1e-4);
        assert_eq!(gw.grid().classify(inland), Classification::Possible);
        gw.drain_commands();

        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, false)).unwrap();
        gw.on_sensor_event(SensorEvent::ranging(2, Octant::DEG_0, 2_000)).unwrap();

        // The alarm was raised six seconds ago and must hold for a minute.
        let mut released_after = None;
        for t in 7..=400 {
            gw.on_second().unwrap();
            if level_of(&gw.drain_commands(), 1) == Some(AlertLevel::Idle) {
                released_after = Some(t);
                break;
            }
        }
        let released_after = released_after.expect("alarm never released");
        assert!(released_after >= 60, "released after {released_after}s");
        assert_eq!(gw.alerts().output(0), Some(AlertLevel::Idle));
    }

    // ---- input validation ----------------------------------------------------

    #[test]
    fn unknown_node_event_is_dropped() {
        let mut gw = deployed();
        gw.on_sensor_event(SensorEvent::motion(42, Octant::DEG_0, true)).unwrap();
        assert!(gw.grid().indices().all(|c| gw.grid().value(c) == Some(1.0)));
        assert!(gw.samples().is_empty());
    }

    #[test]
    fn diagonal_rotation_is_dropped() {
        let mut gw = deployed();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::from_bits(1), true)).unwrap();
        assert!(gw.samples().is_empty());
    }

    #[test]
    fn malformed_position_page_and_node_zero_are_dropped() {
        let mut gw = gateway();
        gw.on_position_page(&[0x20, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        gw.on_position_config(node(0, 0, 0, Octant::DEG_0, NodeType::PirPir)).unwrap();
        assert_eq!(gw.topology().count_valid(), 0);

        gw.on_position_page(&[0x11, 7, 0, 0x01, 0x04, 0x1F, 0, 0]).unwrap();
        assert_eq!(gw.topology().lookup_by_id(7).map(|n| n.position), Some(GridPosition::new(-1, 1)));
    }

    #[test]
    fn full_topology_is_fatal() {
        let config = GatewayConfig { node_capacity: 1, ..Default::default() };
        let mut gw = Gateway::new(AlgorithmConfig::default(), config).unwrap();
        gw.on_position_config(node(1, 0, 0, Octant::DEG_0, NodeType::PirPir)).unwrap();
        let err = gw.on_position_config(node(2, 1, 0, Octant::DEG_0, NodeType::PirPir)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_algorithm_config_is_rejected() {
        let algorithm = AlgorithmConfig { decay_factor: 0.0, ..Default::default() };
        assert!(matches!(
            Gateway::new(algorithm, GatewayConfig::default()),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    // ---- acknowledgments -----------------------------------------------------

    #[test]
    fn acks_are_routed_by_page() {
        let mut gw = deployed();
        gw.on_second().unwrap();
        assert_eq!(gw.pool().count(PageTag::INDICATOR_STATUS), 3);

        gw.on_ack(AckEvent { page: PageTag::INDICATOR_STATUS, message_id: 0 }).unwrap();
        assert_eq!(gw.pool().count(PageTag::INDICATOR_STATUS), 2);

        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, true)).unwrap();
        gw.on_ack(AckEvent { page: PageTag::MOTION_SAMPLE, message_id: 0 }).unwrap();
        assert_eq!(gw.pool().count(PageTag::MOTION_SAMPLE), 0);

        // Stale ack is a no-op.
        gw.on_ack(AckEvent { page: PageTag::MOTION_SAMPLE, message_id: 0 }).unwrap();
        assert_eq!(gw.pool().count(PageTag::INDICATOR_STATUS), 2);
    }

    // ---- health --------------------------------------------------------------

    #[test]
    fn hyperactive_sensor_stops_feeding_the_grid() {
        let algorithm = AlgorithmConfig { hyperactivity_window: 3, ..Default::default() };
        let mut gw = Gateway::new(algorithm, GatewayConfig::default()).unwrap();
        gw.on_position_config(node(1, -1, 1, Octant::DEG_180, NodeType::PirPir)).unwrap();
        assert_eq!(gw.minute(), 1);

        for detected in [true, false, true] {
            gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, detected)).unwrap();
        }
        gw.on_minute().unwrap();
        assert_eq!(gw.minute(), 2);
        let key = SensorEvent::motion(1, Octant::DEG_0, true).key();
        assert!(gw.health().is_hyperactive(&key));
        assert_eq!(gw.pool().count(PageTag::HYPERACTIVE_SENSOR), 1);

        let cell = CellIndex::new(0, 0);
        let before = gw.grid().value(cell);
        let queued = gw.samples().len();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, false)).unwrap();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, true)).unwrap();
        assert_eq!(gw.grid().value(cell), before);
        // Still forwarded to monitoring.
        assert_eq!(gw.samples().len(), queued + 2);
    }

    #[test]
    fn silent_sensor_is_flagged_daily_and_cleared_on_report() {
        let mut gw = gateway();
        gw.on_position_config(node(1, -1, 1, Octant::DEG_180, NodeType::PirPir)).unwrap();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, true)).unwrap();

        gw.on_day().unwrap();
        let silent = SensorEvent::motion(1, Octant::DEG_270, true).key();
        assert!(gw.health().is_inactive(&silent));
        assert_eq!(gw.pool().count(PageTag::INACTIVE_SENSOR), 1);

        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_270, true)).unwrap();
        assert!(!gw.health().is_inactive(&silent));
        // The cleared report replaces the raised one on air.
        assert_eq!(gw.pool().count(PageTag::INACTIVE_SENSOR), 1);
    }

    #[test]
    fn page_period_rotates_the_slot() {
        let mut gw = deployed();
        assert_eq!(gw.on_page_period(), roadwatch_types::IDLE_PAYLOAD);
        gw.on_second().unwrap();
        let first = gw.outgoing();
        assert_eq!(first[0], PageTag::INDICATOR_STATUS.0);
        let second = gw.on_page_period();
        assert_eq!(second[0], PageTag::INDICATOR_STATUS.0);
        assert_ne!(first, second);
    }

    // ---- re-provisioning -----------------------------------------------------

    #[test]
    fn reprovisioned_node_keeps_reporting() {
        let config = GatewayConfig { sensor_capacity: 2, ..Default::default() };
        let mut gw = Gateway::new(AlgorithmConfig::default(), config).unwrap();
        gw.on_position_config(node(1, -1, -1, Octant::DEG_0, NodeType::PirLidar)).unwrap();
        gw.on_sensor_event(SensorEvent::ranging(1, Octant::DEG_0, 350)).unwrap();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_90, true)).unwrap();
        gw.on_second().unwrap();

        // Same id, new type: the old sensors are gone.
        gw.on_position_config(node(1, -1, -1, Octant::DEG_0, NodeType::PirPir)).unwrap();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_270, true)).unwrap();
        gw.on_second().unwrap();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, true)).unwrap();
        assert!(gw.on_second().is_ok());
    }

    #[test]
    fn turned_node_stops_feeding_its_old_cells() {
        // No decay, so any change to the cell comes from trickle.
        let algorithm = AlgorithmConfig { decay_factor: 1.0, ..Default::default() };
        let mut gw = Gateway::new(algorithm, GatewayConfig::default()).unwrap();
        gw.on_position_config(node(1, -1, 1, Octant::DEG_180, NodeType::PirPir)).unwrap();
        gw.on_sensor_event(SensorEvent::motion(1, Octant::DEG_0, true)).unwrap();
        let cell = CellIndex::new(0, 0);
        let grown = gw.grid().value(cell).unwrap();
        gw.on_second().unwrap();
        assert!(gw.grid().value(cell).unwrap() > grown);

        // Turned a quarter: the same sensor would now also look at (0,0).
        gw.on_position_config(node(1, -1, 1, Octant::DEG_90, NodeType::PirPir)).unwrap();
        gw.on_second().unwrap();
        let settled = gw.grid().value(cell).unwrap();
        for _ in 0..10 {
            gw.on_second().unwrap();
        }
        assert_eq!(gw.grid().value(cell).unwrap(), settled);
    }
}
