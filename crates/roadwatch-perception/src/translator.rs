//! [`DetectionTranslator`] – raw sensor events → activity growth.
//!
//! Both sensor kinds share one pipeline:
//!
//! 1. Resolve the reporting node and combine the sensor rotation with the
//!    node rotation into a cardinal [`Facing`].
//! 2. Discretize the reading (motion: detecting or not; ranging: near zone,
//!    far zone or none).
//! 3. Compare against the sensor's debounce record.  A repeated state is a
//!    no-op, an ended state only updates the record.
//! 4. Grow every cell ahead of the detection origin by
//!    `common × kind weight × road proximity[row of the cell]`.
//!
//! [`DetectionTranslator::trickle`] is the once-per-second companion: every
//! sensor whose record is still active keeps reinforcing the same cells with
//! the smaller trickle weights.
//!
//! Records remember the node placement they were taken under.  After the
//! topology changes, [`DetectionTranslator::on_topology_change`] drops records
//! of sensors the node no longer carries and resets those whose node moved
//! or turned.
//!
//! # Ranging zones
//!
//! A ranging sensor compares its distance against the expected distances to
//! the first and second node ahead of it.  Each expected distance is the
//! nominal separation corrected by the node offsets projected onto the
//! facing.  A missing node counts as having no offset.

use roadwatch_types::{
    AlgorithmConfig, CoreError, Facing, GridPosition, Octant, SensorEvent, SensorKey, SensorKind, SensorReading,
};
use tracing::{debug, info, trace};

use crate::grid::{ActivityGrid, CellIndex, GridGeometry};
use crate::topology::{NodeRecord, TopologyRegistry};

// ────────────────────────────────────────────────────────────────────────────
// Discretized states
// ────────────────────────────────────────────────────────────────────────────

/// Where a ranging sensor placed its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeZone {
    /// Beyond both thresholds, or nothing in range.
    None,
    /// Closer than the first node ahead.
    Near,
    /// Between the first and the second node ahead.
    Far,
}

impl RangeZone {
    /// Region byte used in monitoring pages.
    pub fn wire_code(self) -> u8 {
        match self {
            RangeZone::None => 0,
            RangeZone::Near => 1,
            RangeZone::Far => 2,
        }
    }
}

/// Last observed discretized state of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebounceState {
    Motion(bool),
    Ranging(RangeZone),
}

impl DebounceState {
    /// `true` while the sensor is reporting an ongoing detection.
    pub fn is_active(&self) -> bool {
        match self {
            DebounceState::Motion(detected) => *detected,
            DebounceState::Ranging(zone) => *zone != RangeZone::None,
        }
    }

    fn idle(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Motion => DebounceState::Motion(false),
            SensorKind::Ranging => DebounceState::Ranging(RangeZone::None),
        }
    }
}

/// Outcome of translating one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub key: SensorKey,
    pub state: DebounceState,
    /// Cells grown by this event.  Empty when the event was debounced, ended
    /// a detection, or came from a suppressed sensor.
    pub grown: Vec<CellIndex>,
}

#[derive(Debug, Clone)]
struct DebounceRecord {
    key: SensorKey,
    state: DebounceState,
    /// Node position and rotation the state was observed under.
    placement: (GridPosition, Octant),
}

impl DebounceRecord {
    fn placed_as(&self, node: &NodeRecord) -> bool {
        self.placement == (node.position, node.rotation)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DetectionTranslator
// ────────────────────────────────────────────────────────────────────────────

/// Turns sensor events into growth of the [`ActivityGrid`].
///
/// # Example
///
/// ```
/// use roadwatch_perception::grid::{ActivityGrid, CellIndex};
/// use roadwatch_perception::topology::TopologyRegistry;
/// use roadwatch_perception::translator::DetectionTranslator;
/// use roadwatch_types::*;
///
/// let cfg = AlgorithmConfig::default();
/// let mut topo = TopologyRegistry::new(9);
/// topo.upsert(PositionConfig {
///     node_id: 1,
///     position: GridPosition::new(-1, 1),
///     offset: GridOffset::default(),
///     rotation: Octant::DEG_180,
///     node_type: NodeType::PirPir,
/// })
/// .unwrap();
/// let mut grid = ActivityGrid::new(&cfg);
/// let mut translator = DetectionTranslator::new(&cfg, 18);
///
/// let event = SensorEvent::motion(1, Octant::DEG_0, true);
/// let t = translator.translate(&event, false, &topo, &mut grid).unwrap();
/// assert_eq!(t.grown, vec![CellIndex::new(0, 0)]);
/// ```
#[derive(Debug, Clone)]
pub struct DetectionTranslator {
    config: AlgorithmConfig,
    geometry: GridGeometry,
    capacity: usize,
    records: Vec<DebounceRecord>,
}

impl DetectionTranslator {
    /// Create a translator whose debounce pool holds `capacity` sensors.
    pub fn new(config: &AlgorithmConfig, capacity: usize) -> Self {
        Self {
            config: config.clone(),
            geometry: GridGeometry::new(config.grid),
            capacity,
            records: Vec::with_capacity(capacity),
        }
    }

    /// Translate one event into grid growth.
    ///
    /// `suppressed` marks a sensor the health monitor flagged as hyperactive:
    /// its reading is still discretized (so it can be forwarded) but neither
    /// the grid nor the debounce record is touched.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownNode`] / [`CoreError::UnsupportedRotation`] for
    ///   events that cannot be placed; nothing is mutated.
    /// - [`CoreError::CapacityExhausted`] when a new sensor does not fit in
    ///   the debounce pool.
    pub fn translate(
        &mut self,
        event: &SensorEvent,
        suppressed: bool,
        topology: &TopologyRegistry,
        grid: &mut ActivityGrid,
    ) -> Result<Translation, CoreError> {
        let node = topology
            .lookup_by_id(event.node_id)
            .ok_or(CoreError::UnknownNode(event.node_id))?;
        let total = event.rotation.combine(node.rotation);
        let facing = total.facing().ok_or(CoreError::UnsupportedRotation(total))?;

        let state = match event.reading {
            SensorReading::Motion { detected } => DebounceState::Motion(detected),
            SensorReading::Ranging { distance_cm } => {
                DebounceState::Ranging(self.range_zone(node, facing, distance_cm, topology))
            }
        };
        let key = event.key();
        let mut translation = Translation { key, state, grown: Vec::new() };

        if suppressed {
            debug!(node_id = key.node_id, rotation = %key.rotation, "suppressed sensor, growth skipped");
            return Ok(translation);
        }

        let index = self.record_index(key, node, topology)?;
        if self.records[index].state == state {
            trace!(node_id = key.node_id, rotation = %key.rotation, "repeated state debounced");
            return Ok(translation);
        }
        self.records[index].state = state;
        if !state.is_active() {
            return Ok(translation);
        }

        let origin = detection_origin(node.position, facing, state);
        for cell in self.geometry.cells_ahead(origin, facing) {
            let factor = self.config.growth_factor(key.kind, cell.row);
            if let Some(value) = grid.grow(cell, factor) {
                debug!(col = cell.col, row = cell.row, factor, value, node_id = key.node_id, "cell grown");
                translation.grown.push(cell);
            }
        }
        Ok(translation)
    }

    /// Reinforce the grid for every sensor still reporting a detection.
    ///
    /// Sensors for which `suppressed` returns `true`, whose node is no longer
    /// registered, or whose rotation is no longer cardinal are skipped.
    /// Returns the cells that were grown.
    pub fn trickle(
        &self,
        suppressed: impl Fn(&SensorKey) -> bool,
        topology: &TopologyRegistry,
        grid: &mut ActivityGrid,
    ) -> Vec<CellIndex> {
        let mut touched = Vec::new();
        for record in self.records.iter().filter(|r| r.state.is_active()) {
            if suppressed(&record.key) {
                continue;
            }
            let Some(node) = topology.lookup_by_id(record.key.node_id) else {
                continue;
            };
            if !record.placed_as(node) {
                continue;
            }
            let Some(facing) = record.key.rotation.combine(node.rotation).facing() else {
                continue;
            };
            let origin = detection_origin(node.position, facing, record.state);
            for cell in self.geometry.cells_ahead(origin, facing) {
                let factor = self.config.trickle_factor(record.key.kind, cell.row);
                if grid.grow(cell, factor).is_some() {
                    touched.push(cell);
                }
            }
        }
        touched
    }

    /// Last recorded state of `key`, if the sensor has reported before.
    pub fn state(&self, key: &SensorKey) -> Option<DebounceState> {
        self.records.iter().find(|r| r.key == *key).map(|r| r.state)
    }

    /// Number of sensors currently reporting an ongoing detection.
    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.state.is_active()).count()
    }

    /// Bring the debounce records in line with the current topology.
    ///
    /// Records of unregistered nodes, or of sensors the node type does not
    /// carry, are dropped.  Records whose node changed position or rotation
    /// restart from the idle state.  Returns how many records were dropped.
    pub fn on_topology_change(&mut self, topology: &TopologyRegistry) -> usize {
        let before = self.records.len();
        self.records.retain(|r| {
            topology.lookup_by_id(r.key.node_id).is_some_and(|node| {
                node.node_type
                    .sensors()
                    .iter()
                    .any(|&(rotation, kind)| rotation == r.key.rotation && kind == r.key.kind)
            })
        });
        for record in &mut self.records {
            let Some(node) = topology.lookup_by_id(record.key.node_id) else {
                continue;
            };
            if !record.placed_as(node) {
                record.placement = (node.position, node.rotation);
                record.state = DebounceState::idle(record.key.kind);
            }
        }
        let dropped = before - self.records.len();
        if dropped > 0 {
            info!(dropped, remaining = self.records.len(), "stale debounce records dropped");
        }
        dropped
    }

    fn record_index(
        &mut self,
        key: SensorKey,
        node: &NodeRecord,
        topology: &TopologyRegistry,
    ) -> Result<usize, CoreError> {
        if let Some(i) = self.records.iter().position(|r| r.key == key) {
            if !self.records[i].placed_as(node) {
                self.records[i].placement = (node.position, node.rotation);
                self.records[i].state = DebounceState::idle(key.kind);
            }
            return Ok(i);
        }
        // A re-provisioned node may still hold records of its old sensors.
        if self.records.len() >= self.capacity {
            self.on_topology_change(topology);
        }
        if self.records.len() >= self.capacity {
            return Err(CoreError::CapacityExhausted { pool: "debounce records", capacity: self.capacity });
        }
        self.records.push(DebounceRecord {
            key,
            state: DebounceState::idle(key.kind),
            placement: (node.position, node.rotation),
        });
        Ok(self.records.len() - 1)
    }

    fn range_zone(
        &self,
        node: &NodeRecord,
        facing: Facing,
        distance_cm: u16,
        topology: &TopologyRegistry,
    ) -> RangeZone {
        let offset_ahead = |steps: i8| {
            topology
                .lookup_by_coordinate(node.position.stepped(facing, steps))
                .map_or(0, |n| n.offset.along(facing))
        };
        let own = node.offset.along(facing);
        let separation = i32::from(self.config.node_separation_cm);
        let scale = i32::from(self.config.offset_scale_cm);

        let first = separation + (offset_ahead(1) - own) * scale;
        let second = 2 * separation + (offset_ahead(2) - own) * scale;
        let distance = i32::from(distance_cm);

        let zone = if distance < first {
            RangeZone::Near
        } else if distance < second {
            RangeZone::Far
        } else {
            RangeZone::None
        };
        trace!(node_id = node.node_id, distance, first, second, ?zone, "ranging zone");
        zone
    }
}

/// Far-zone ranging detections originate one node further along the facing.
fn detection_origin(position: GridPosition, facing: Facing, state: DebounceState) -> GridPosition {
    match state {
        DebounceState::Ranging(RangeZone::Far) => position.stepped(facing, 1),
        _ => position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadwatch_types::{GridOffset, NodeType, Octant, PositionConfig};

    // ---- helpers -------------------------------------------------------------

    fn place(topo: &mut TopologyRegistry, id: u16, x: i8, y: i8, rotation: Octant, node_type: NodeType) {
        topo.upsert(PositionConfig {
            node_id: id,
            position: GridPosition::new(x, y),
            offset: GridOffset::default(),
            rotation,
            node_type,
        })
        .unwrap();
    }

    fn setup() -> (AlgorithmConfig, TopologyRegistry, ActivityGrid, DetectionTranslator) {
        let cfg = AlgorithmConfig::default();
        let mut topo = TopologyRegistry::new(9);
        place(&mut topo, 1, -1, 1, Octant::DEG_180, NodeType::PirPir);
        place(&mut topo, 2, -1, -1, Octant::DEG_0, NodeType::PirLidar);
        let grid = ActivityGrid::new(&cfg);
        let translator = DetectionTranslator::new(&cfg, 18);
        (cfg, topo, grid, translator)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    // ---- motion --------------------------------------------------------------

    #[test]
    fn motion_detection_grows_cell_ahead() {
        let (_, topo, mut grid, mut tr) = setup();
        let t = tr.translate(&SensorEvent::motion(1, Octant::DEG_0, true), false, &topo, &mut grid).unwrap();
        assert_eq!(t.grown, vec![CellIndex::new(0, 0)]);
        assert!(approx(grid.value(CellIndex::new(0, 0)).unwrap(), 4.2));
        assert!(approx(grid.value(CellIndex::new(0, 1)).unwrap(), 1.0));
    }

    #[test]
    fn repeated_state_grows_once() {
        let (_, topo, mut grid, mut tr) = setup();
        let event = SensorEvent::motion(1, Octant::DEG_0, true);
        tr.translate(&event, false, &topo, &mut grid).unwrap();
        let after_first = grid.value(CellIndex::new(0, 0)).unwrap();
        let second = tr.translate(&event, false, &topo, &mut grid).unwrap();
        assert!(second.grown.is_empty());
        assert_eq!(grid.value(CellIndex::new(0, 0)).unwrap(), after_first);
    }

    #[test]
    fn ended_detection_updates_record_without_growth() {
        let (_, topo, mut grid, mut tr) = setup();
        let on = SensorEvent::motion(1, Octant::DEG_0, true);
        let off = SensorEvent::motion(1, Octant::DEG_0, false);
        tr.translate(&on, false, &topo, &mut grid).unwrap();
        let t = tr.translate(&off, false, &topo, &mut grid).unwrap();
        assert!(t.grown.is_empty());
        assert_eq!(tr.state(&off.key()), Some(DebounceState::Motion(false)));
        // A new detection after the end grows again.
        let again = tr.translate(&on, false, &topo, &mut grid).unwrap();
        assert_eq!(again.grown.len(), 1);
    }

    #[test]
    fn first_event_without_detection_is_a_noop() {
        let (cfg, topo, mut grid, mut tr) = setup();
        let t = tr.translate(&SensorEvent::motion(1, Octant::DEG_0, false), false, &topo, &mut grid).unwrap();
        assert!(t.grown.is_empty());
        assert!(grid.indices().all(|c| grid.value(c) == Some(cfg.av_min)));
    }

    #[test]
    fn suppressed_sensor_does_not_grow_or_debounce() {
        let (_, topo, mut grid, mut tr) = setup();
        let event = SensorEvent::motion(1, Octant::DEG_0, true);
        let t = tr.translate(&event, true, &topo, &mut grid).unwrap();
        assert_eq!(t.state, DebounceState::Motion(true));
        assert!(t.grown.is_empty());
        assert!(tr.state(&event.key()).is_none());
    }

    // ---- failures ------------------------------------------------------------

    #[test]
    fn unknown_node_is_rejected() {
        let (_, topo, mut grid, mut tr) = setup();
        let err = tr.translate(&SensorEvent::motion(9, Octant::DEG_0, true), false, &topo, &mut grid);
        assert_eq!(err, Err(CoreError::UnknownNode(9)));
    }

    #[test]
    fn diagonal_rotation_is_rejected() {
        let (_, topo, mut grid, mut tr) = setup();
        let err = tr
            .translate(&SensorEvent::motion(1, Octant::from_bits(1), true), false, &topo, &mut grid)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedRotation(_)));
    }

    #[test]
    fn debounce_pool_exhaustion_is_fatal() {
        let (cfg, topo, mut grid, _) = setup();
        let mut tr = DetectionTranslator::new(&cfg, 1);
        tr.translate(&SensorEvent::motion(1, Octant::DEG_0, true), false, &topo, &mut grid).unwrap();
        let err = tr
            .translate(&SensorEvent::motion(1, Octant::DEG_270, true), false, &topo, &mut grid)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    // ---- ranging -------------------------------------------------------------

    #[test]
    fn ranging_near_zone_grows_own_cells() {
        let (_, topo, mut grid, mut tr) = setup();
        let t = tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 350), false, &topo, &mut grid).unwrap();
        assert_eq!(t.state, DebounceState::Ranging(RangeZone::Near));
        assert_eq!(t.grown, vec![CellIndex::new(0, 1)]);
        assert!(approx(grid.value(CellIndex::new(0, 1)).unwrap(), 4.2));
    }

    #[test]
    fn ranging_far_zone_grows_cells_one_node_ahead() {
        let (_, topo, mut grid, mut tr) = setup();
        let t = tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 700), false, &topo, &mut grid).unwrap();
        assert_eq!(t.state, DebounceState::Ranging(RangeZone::Far));
        assert_eq!(t.grown, vec![CellIndex::new(0, 0)]);
        // Roadside row uses the first proximity factor: 3.5 × 1.4.
        assert!(approx(grid.value(CellIndex::new(0, 0)).unwrap(), 4.9));
    }

    #[test]
    fn ranging_beyond_second_node_is_none() {
        let (_, topo, mut grid, mut tr) = setup();
        let t = tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 1000), false, &topo, &mut grid).unwrap();
        assert_eq!(t.state, DebounceState::Ranging(RangeZone::None));
        assert!(t.grown.is_empty());
    }

    #[test]
    fn node_offsets_shift_zone_thresholds() {
        let (cfg, mut topo, mut grid, mut tr) = setup();
        // The node ahead sits 10 units (50 cm) closer than nominal.
        topo.upsert(PositionConfig {
            node_id: 3,
            position: GridPosition::new(-1, 0),
            offset: GridOffset { x: 0, y: -10 },
            rotation: Octant::DEG_0,
            node_type: NodeType::PirPir,
        })
        .unwrap();
        assert_eq!(cfg.node_separation_cm, 500);
        let t = tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 460), false, &topo, &mut grid).unwrap();
        assert_eq!(t.state, DebounceState::Ranging(RangeZone::Far));
    }

    #[test]
    fn zone_change_counts_as_new_state() {
        let (_, topo, mut grid, mut tr) = setup();
        tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 350), false, &topo, &mut grid).unwrap();
        let t = tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 300), false, &topo, &mut grid).unwrap();
        assert!(t.grown.is_empty(), "same zone is debounced");
        let t = tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 700), false, &topo, &mut grid).unwrap();
        assert_eq!(t.grown, vec![CellIndex::new(0, 0)]);
    }

    // ---- trickle -------------------------------------------------------------

    #[test]
    fn trickle_reinforces_active_sensors_only() {
        let (cfg, topo, mut grid, mut tr) = setup();
        tr.translate(&SensorEvent::motion(1, Octant::DEG_0, true), false, &topo, &mut grid).unwrap();
        tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 350), false, &topo, &mut grid).unwrap();
        tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 2000), false, &topo, &mut grid).unwrap();
        assert_eq!(tr.active_count(), 1);

        let before = grid.value(CellIndex::new(0, 0)).unwrap();
        let touched = tr.trickle(|_| false, &topo, &mut grid);
        assert_eq!(touched, vec![CellIndex::new(0, 0)]);
        let expected = before * cfg.trickle_factor(SensorKind::Motion, 0);
        assert!(approx(grid.value(CellIndex::new(0, 0)).unwrap(), expected));
    }

    #[test]
    fn trickle_skips_records_of_a_turned_node() {
        let (_, mut topo, mut grid, mut tr) = setup();
        tr.translate(&SensorEvent::motion(1, Octant::DEG_0, true), false, &topo, &mut grid).unwrap();
        place(&mut topo, 1, -1, 1, Octant::DEG_90, NodeType::PirPir);
        // Not yet synchronised: the old detection must not leak into new cells.
        assert!(tr.trickle(|_| false, &topo, &mut grid).is_empty());
    }

    #[test]
    fn trickle_skips_suppressed_sensors() {
        let (_, topo, mut grid, mut tr) = setup();
        tr.translate(&SensorEvent::motion(1, Octant::DEG_0, true), false, &topo, &mut grid).unwrap();
        let touched = tr.trickle(|key| key.node_id == 1, &topo, &mut grid);
        assert!(touched.is_empty());
    }

    // ---- topology changes ----------------------------------------------------

    #[test]
    fn retyped_node_releases_its_old_records() {
        let (cfg, mut topo, mut grid, _) = setup();
        let mut tr = DetectionTranslator::new(&cfg, 2);
        tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 350), false, &topo, &mut grid).unwrap();
        tr.translate(&SensorEvent::motion(2, Octant::DEG_90, true), false, &topo, &mut grid).unwrap();

        place(&mut topo, 2, -1, -1, Octant::DEG_0, NodeType::PirPir);
        assert_eq!(tr.on_topology_change(&topo), 2);
        assert_eq!(tr.active_count(), 0);

        let t = tr.translate(&SensorEvent::motion(2, Octant::DEG_270, true), false, &topo, &mut grid).unwrap();
        assert_eq!(t.state, DebounceState::Motion(true));
    }

    #[test]
    fn full_pool_makes_room_from_stale_records_without_a_sync() {
        let (cfg, mut topo, mut grid, _) = setup();
        let mut tr = DetectionTranslator::new(&cfg, 2);
        tr.translate(&SensorEvent::ranging(2, Octant::DEG_0, 350), false, &topo, &mut grid).unwrap();
        tr.translate(&SensorEvent::motion(2, Octant::DEG_90, true), false, &topo, &mut grid).unwrap();

        place(&mut topo, 2, -1, -1, Octant::DEG_0, NodeType::PirPir);
        let event = SensorEvent::motion(2, Octant::DEG_270, true);
        assert!(tr.translate(&event, false, &topo, &mut grid).is_ok());
        assert_eq!(tr.state(&event.key()), Some(DebounceState::Motion(true)));
        assert!(tr.state(&SensorEvent::motion(2, Octant::DEG_90, true).key()).is_none());
    }

    #[test]
    fn turned_node_restarts_debounce() {
        let (_, mut topo, mut grid, mut tr) = setup();
        let event = SensorEvent::motion(1, Octant::DEG_0, true);
        tr.translate(&event, false, &topo, &mut grid).unwrap();

        place(&mut topo, 1, -1, 1, Octant::DEG_90, NodeType::PirPir);
        assert_eq!(tr.on_topology_change(&topo), 0);
        assert_eq!(tr.state(&event.key()), Some(DebounceState::Motion(false)));
        assert_eq!(tr.active_count(), 0);

        // The same report is a new detection under the new rotation.
        let t = tr.translate(&event, false, &topo, &mut grid).unwrap();
        assert_eq!(t.grown, vec![CellIndex::new(0, 0)]);
    }
}
