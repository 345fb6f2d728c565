//! [`TopologyRegistry`] – node id → provisioned placement.
//!
//! Records arrive as position configuration messages and are authoritative:
//! a new message for a known node overwrites it in place.  The registry is a
//! fixed arena of slots so capacity exhaustion surfaces as an error instead
//! of unbounded growth.
//!
//! Dependent components keep cached views of the topology.  The
//! edge-triggered [`TopologyRegistry::changed_since_last_read`] flag lets the
//! owner re-synchronise all of them once per change.
//!
//! # Example
//!
//! ```
//! use roadwatch_perception::topology::TopologyRegistry;
//! use roadwatch_types::{GridPosition, NodeType, Octant, PositionConfig};
//!
//! let mut topo = TopologyRegistry::new(9);
//! topo.upsert(PositionConfig {
//!     node_id: 1,
//!     position: GridPosition::new(-1, 1),
//!     offset: Default::default(),
//!     rotation: Octant::DEG_180,
//!     node_type: NodeType::PirPir,
//! })
//! .unwrap();
//!
//! assert_eq!(topo.count_valid(), 1);
//! assert!(topo.changed_since_last_read());
//! ```

use roadwatch_types::{CoreError, GridPosition, NodeId, PositionConfig};
use tracing::debug;

/// A valid registry entry.
pub type NodeRecord = PositionConfig;

/// Fixed-capacity registry of node placements.
#[derive(Debug, Clone)]
pub struct TopologyRegistry {
    slots: Vec<Option<NodeRecord>>,
    changed: bool,
}

impl TopologyRegistry {
    /// Create a registry with room for `capacity` nodes.
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity], changed: false }
    }

    /// Insert or overwrite the record for `config.node_id`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownNode`] for node id 0.
    /// - [`CoreError::CapacityExhausted`] when the node is new and every slot
    ///   is taken.
    pub fn upsert(&mut self, config: PositionConfig) -> Result<(), CoreError> {
        if config.node_id == 0 {
            return Err(CoreError::UnknownNode(0));
        }

        let existing = self
            .slots
            .iter()
            .position(|s| matches!(s, Some(r) if r.node_id == config.node_id));
        let index = match existing.or_else(|| self.slots.iter().position(Option::is_none)) {
            Some(i) => i,
            None => {
                return Err(CoreError::CapacityExhausted {
                    pool: "topology registry",
                    capacity: self.slots.len(),
                });
            }
        };

        debug!(
            node_id = config.node_id,
            x = config.position.x,
            y = config.position.y,
            rotation = %config.rotation,
            replaced = existing.is_some(),
            "node position stored"
        );
        self.slots[index] = Some(config);
        self.changed = true;
        Ok(())
    }

    pub fn lookup_by_id(&self, node_id: NodeId) -> Option<&NodeRecord> {
        self.iter().find(|r| r.node_id == node_id)
    }

    /// First valid record placed at `position`.
    pub fn lookup_by_coordinate(&self, position: GridPosition) -> Option<&NodeRecord> {
        self.iter().find(|r| r.position == position)
    }

    pub fn count_valid(&self) -> usize {
        self.iter().count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over valid records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.slots.iter().flatten()
    }

    /// `true` if any record was written since the last [`clear_changed`].
    ///
    /// [`clear_changed`]: TopologyRegistry::clear_changed
    pub fn changed_since_last_read(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }
}
