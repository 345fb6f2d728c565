//! [`SensorHealthMonitor`] – hyperactive and silent sensor detection.
//!
//! Every sensor event is recorded with the gateway's minute counter.  Two
//! periodic evaluations turn that history into flags:
//!
//! - **Hyperactivity** (every minute): a sensor whose ring of recent event
//!   timestamps is full and whose average spacing over the ring is below the
//!   configured number of minutes is flagged.  Hyperactive sensors keep being
//!   forwarded to monitoring but no longer feed the activity model.
//! - **Inactivity** (every day): every sensor the topology says should exist
//!   but that did not report during the day is flagged.  Reporting again
//!   clears the flag.
//!
//! Evaluations return the flag transitions so the caller can echo them.

use std::collections::{BTreeMap, BTreeSet};

use roadwatch_perception::TopologyRegistry;
use roadwatch_types::{AlgorithmConfig, CoreError, NodeId, Octant, SensorKey};
use tracing::{info, warn};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Kind of health problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthCondition {
    Hyperactive,
    Inactive,
}

/// A health flag that was raised (`active == true`) or cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub key: SensorKey,
    pub condition: HealthCondition,
    pub active: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Internal record
// ────────────────────────────────────────────────────────────────────────────

type Mount = (NodeId, Octant);

fn mount(key: &SensorKey) -> Mount {
    (key.node_id, key.rotation)
}

#[derive(Debug, Clone)]
struct ActivityRecord {
    key: SensorKey,
    minutes: Vec<u32>,
    next: usize,
    filled: usize,
    hyperactive: bool,
}

impl ActivityRecord {
    fn new(key: SensorKey, window: usize) -> Self {
        Self { key, minutes: vec![0; window], next: 0, filled: 0, hyperactive: false }
    }

    fn push(&mut self, minute: u32) {
        self.minutes[self.next] = minute;
        self.next = (self.next + 1) % self.minutes.len();
        self.filled = (self.filled + 1).min(self.minutes.len());
    }

    /// Average minutes between events over the full ring.
    fn mean_spacing(&self) -> Option<f32> {
        let window = self.minutes.len();
        if self.filled < window {
            return None;
        }
        // Once full, `next` points at the oldest entry.
        let oldest = self.minutes[self.next];
        let newest = self.minutes[(self.next + window - 1) % window];
        Some(newest.saturating_sub(oldest) as f32 / window as f32)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SensorHealthMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Tracks per-sensor activity and raises hyperactivity / inactivity flags.
///
/// # Example
///
/// ```
/// use roadwatch_kernel::health::SensorHealthMonitor;
/// use roadwatch_types::{AlgorithmConfig, Octant, SensorKey, SensorKind};
///
/// let cfg = AlgorithmConfig { hyperactivity_window: 3, ..Default::default() };
/// let mut health = SensorHealthMonitor::new(&cfg, 18);
/// let key = SensorKey { node_id: 1, rotation: Octant::DEG_0, kind: SensorKind::Motion };
///
/// for _ in 0..3 {
///     health.record_activity(key, 10).unwrap();
/// }
/// let changes = health.reevaluate_hyperactivity();
/// assert_eq!(changes.len(), 1);
/// assert!(health.is_hyperactive(&key));
/// ```
#[derive(Debug, Clone)]
pub struct SensorHealthMonitor {
    capacity: usize,
    window: usize,
    threshold_minutes: f32,
    records: Vec<ActivityRecord>,
    seen_today: BTreeSet<Mount>,
    inactive: BTreeMap<Mount, SensorKey>,
}

impl SensorHealthMonitor {
    /// Create a monitor tracking at most `capacity` sensors.
    pub fn new(config: &AlgorithmConfig, capacity: usize) -> Self {
        Self {
            capacity,
            window: config.hyperactivity_window.max(2),
            threshold_minutes: config.hyperactivity_threshold_minutes,
            records: Vec::with_capacity(capacity),
            seen_today: BTreeSet::new(),
            inactive: BTreeMap::new(),
        }
    }

    /// Record an event from `key` at `minute`.
    ///
    /// Returns the cleared inactivity flag when the sensor was flagged silent.
    ///
    /// # Errors
    ///
    /// [`CoreError::CapacityExhausted`] when `key` is new and the pool is
    /// full.
    pub fn record_activity(&mut self, key: SensorKey, minute: u32) -> Result<Option<HealthChange>, CoreError> {
        let index = match self.records.iter().position(|r| r.key == key) {
            Some(i) => i,
            None => {
                if self.records.len() >= self.capacity {
                    return Err(CoreError::CapacityExhausted {
                        pool: "sensor activity records",
                        capacity: self.capacity,
                    });
                }
                self.records.push(ActivityRecord::new(key, self.window));
                self.records.len() - 1
            }
        };
        self.records[index].push(minute);
        self.seen_today.insert(mount(&key));

        Ok(self.inactive.remove(&mount(&key)).map(|flagged| {
            info!(node_id = key.node_id, rotation = %key.rotation, "silent sensor reported again");
            HealthChange { key: flagged, condition: HealthCondition::Inactive, active: false }
        }))
    }

    /// Re-derive every hyperactivity flag.  Call once per minute.
    pub fn reevaluate_hyperactivity(&mut self) -> Vec<HealthChange> {
        let threshold = self.threshold_minutes;
        let mut changes = Vec::new();
        for record in &mut self.records {
            let hyperactive = record.mean_spacing().is_some_and(|spacing| spacing < threshold);
            if hyperactive != record.hyperactive {
                record.hyperactive = hyperactive;
                if hyperactive {
                    warn!(node_id = record.key.node_id, rotation = %record.key.rotation, "sensor hyperactive");
                } else {
                    info!(node_id = record.key.node_id, rotation = %record.key.rotation, "sensor calmed down");
                }
                changes.push(HealthChange {
                    key: record.key,
                    condition: HealthCondition::Hyperactive,
                    active: hyperactive,
                });
            }
        }
        changes
    }

    /// Flag every expected sensor that stayed silent since the previous call,
    /// then start a new day.  Call once per day.
    pub fn reevaluate_inactivity(&mut self, topology: &TopologyRegistry) -> Vec<HealthChange> {
        let mut changes = Vec::new();
        for node in topology.iter() {
            for &(rotation, kind) in node.node_type.sensors() {
                let key = SensorKey { node_id: node.node_id, rotation, kind };
                let m = mount(&key);
                if self.seen_today.contains(&m) || self.inactive.contains_key(&m) {
                    continue;
                }
                warn!(node_id = key.node_id, rotation = %key.rotation, "sensor silent for a day");
                self.inactive.insert(m, key);
                changes.push(HealthChange { key, condition: HealthCondition::Inactive, active: true });
            }
        }
        self.seen_today.clear();
        changes
    }

    /// Drop everything tracked for sensors the topology no longer expects.
    ///
    /// Returns the flags that disappeared with them, as cleared changes.
    ///
    /// Activity records are matched on the full sensor key, so a retyped
    /// node whose mount now carries another sensor kind starts afresh.
    pub fn on_topology_change(&mut self, topology: &TopologyRegistry) -> Vec<HealthChange> {
        let sensors: BTreeSet<SensorKey> = topology
            .iter()
            .flat_map(|node| {
                node.node_type.sensors().iter().map(move |&(rotation, kind)| SensorKey {
                    node_id: node.node_id,
                    rotation,
                    kind,
                })
            })
            .collect();
        let expected: BTreeSet<Mount> = sensors.iter().map(mount).collect();

        let mut cleared = Vec::new();
        self.records.retain(|r| {
            let keep = sensors.contains(&r.key);
            if !keep && r.hyperactive {
                cleared.push(HealthChange { key: r.key, condition: HealthCondition::Hyperactive, active: false });
            }
            keep
        });
        self.inactive.retain(|m, key| {
            let keep = expected.contains(m);
            if !keep {
                cleared.push(HealthChange { key: *key, condition: HealthCondition::Inactive, active: false });
            }
            keep
        });
        self.seen_today.retain(|m| expected.contains(m));
        cleared
    }

    pub fn is_hyperactive(&self, key: &SensorKey) -> bool {
        self.records.iter().any(|r| r.key == *key && r.hyperactive)
    }

    pub fn is_inactive(&self, key: &SensorKey) -> bool {
        self.inactive.contains_key(&mount(key))
    }

    /// Every flag currently raised.
    pub fn flagged(&self) -> Vec<HealthChange> {
        let hyper = self.records.iter().filter(|r| r.hyperactive).map(|r| HealthChange {
            key: r.key,
            condition: HealthCondition::Hyperactive,
            active: true,
        });
        let silent = self.inactive.values().map(|key| HealthChange {
            key: *key,
            condition: HealthCondition::Inactive,
            active: true,
        });
        hyper.chain(silent).collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}
