//! [`KeyedBroadcaster`] – latest-value pages, one slot per subject.
//!
//! Status echoes (indicator levels, activity variables) only matter in their
//! latest form.  Each subject owns one slot; publishing overwrites it and
//! puts it back on air.  Once the monitoring application acknowledges a
//! slot's message id the slot is *superseded* and leaves the air until the
//! next publish for that subject.
//!
//! All broadcasting slots share one page tag.  A publish for the only slot
//! on air overwrites its copies in place; any other change cancels the tag
//! and re-adds every broadcasting slot.
//!
//! Message ids wrap at 256.  An id still on air for another subject is never
//! handed out again, so an acknowledgment always names a single slot.

use roadwatch_types::{AckEvent, CoreError, PageTag, Payload};
use tracing::debug;

use crate::transport::PageTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Broadcasting,
    Superseded,
}

#[derive(Debug, Clone)]
struct Slot<K> {
    key: K,
    message_id: u8,
    payload: Payload,
    state: SlotState,
}

/// Fixed-capacity latest-value sender for one page tag.
#[derive(Debug, Clone)]
pub struct KeyedBroadcaster<K> {
    name: &'static str,
    tag: PageTag,
    replicas: usize,
    capacity: usize,
    slots: Vec<Slot<K>>,
    next_id: u8,
}

impl<K: Copy + PartialEq + std::fmt::Debug> KeyedBroadcaster<K> {
    /// `name` identifies the pool in capacity errors.
    pub fn new(name: &'static str, tag: PageTag, replicas: usize, capacity: usize) -> Self {
        Self { name, tag, replicas, capacity, slots: Vec::with_capacity(capacity), next_id: 0 }
    }

    pub fn tag(&self) -> PageTag {
        self.tag
    }

    pub fn state(&self, key: K) -> Option<SlotState> {
        self.slot(key).map(|s| s.state)
    }

    pub fn payload(&self, key: K) -> Option<Payload> {
        self.slot(key).map(|s| s.payload)
    }

    pub fn broadcasting_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::Broadcasting).count()
    }

    /// Store the latest payload for `key` and put it on air.
    ///
    /// `build` receives the message id assigned to this publish.
    ///
    /// # Errors
    ///
    /// [`CoreError::CapacityExhausted`] when `key` is new and every slot is
    /// taken, or when the transport cannot fit the broadcasting slots.
    pub fn publish(
        &mut self,
        key: K,
        build: impl FnOnce(u8) -> Payload,
        transport: &mut impl PageTransport,
    ) -> Result<(), CoreError> {
        let index = self.slots.iter().position(|s| s.key == key);
        if index.is_none() && self.slots.len() >= self.capacity {
            return Err(CoreError::CapacityExhausted { pool: self.name, capacity: self.capacity });
        }

        // Every copy under the tag belongs to this key: overwrite in place.
        let in_place = index.is_some_and(|i| self.slots[i].state == SlotState::Broadcasting)
            && self.broadcasting_count() == 1;

        let message_id = self.allocate_id(key);
        let payload = build(message_id);
        let fresh = Slot { key, message_id, payload, state: SlotState::Broadcasting };
        match index {
            Some(i) => self.slots[i] = fresh,
            None => self.slots.push(fresh),
        }
        debug!(page = %self.tag, ?key, message_id, in_place, "status published");

        if in_place {
            transport.replace(self.tag, payload);
            Ok(())
        } else {
            self.rebroadcast(transport)
        }
    }

    /// Handle an acknowledgment.  Returns `true` when it superseded a slot.
    pub fn on_ack(&mut self, ack: &AckEvent, transport: &mut impl PageTransport) -> Result<bool, CoreError> {
        if ack.page != self.tag {
            return Ok(false);
        }
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.state == SlotState::Broadcasting && s.message_id == ack.message_id)
        else {
            debug!(page = %self.tag, message_id = ack.message_id, "stale status ack ignored");
            return Ok(false);
        };
        slot.state = SlotState::Superseded;
        self.rebroadcast(transport)?;
        Ok(true)
    }

    fn rebroadcast(&self, transport: &mut impl PageTransport) -> Result<(), CoreError> {
        transport.cancel(self.tag);
        for slot in self.slots.iter().filter(|s| s.state == SlotState::Broadcasting) {
            transport.broadcast(self.tag, slot.payload, self.replicas)?;
        }
        Ok(())
    }

    /// Next id not held by another subject still on air.
    fn allocate_id(&mut self, key: K) -> u8 {
        for _ in 0..=u8::MAX {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            let in_flight = self
                .slots
                .iter()
                .any(|s| s.key != key && s.state == SlotState::Broadcasting && s.message_id == id);
            if !in_flight {
                return id;
            }
        }
        // More subjects on air than ids; only reachable past 256 slots.
        self.next_id
    }

    fn slot(&self, key: K) -> Option<&Slot<K>> {
        self.slots.iter().find(|s| s.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_pool::PagePool;
    use crate::transport::recording::{Call, RecordingTransport};

    const TAG: PageTag = PageTag::INDICATOR_STATUS;

    fn page(id: u8, value: u8) -> Payload {
        [TAG.0, id, value, 0, 0, 0, 0, 0]
    }

    fn broadcaster() -> KeyedBroadcaster<u16> {
        KeyedBroadcaster::new("indicator echo slots", TAG, 1, 3)
    }

    #[test]
    fn publish_overwrites_same_key() {
        let mut echo = broadcaster();
        let mut pool = PagePool::new(10);
        echo.publish(10, |id| page(id, 1), &mut pool).unwrap();
        echo.publish(10, |id| page(id, 2), &mut pool).unwrap();
        assert_eq!(pool.count(TAG), 1);
        assert_eq!(echo.payload(10), Some(page(1, 2)));
    }

    #[test]
    fn every_broadcasting_key_stays_on_air() {
        let mut echo = broadcaster();
        let mut pool = PagePool::new(10);
        for key in [10, 11, 12] {
            echo.publish(key, |id| page(id, 0), &mut pool).unwrap();
        }
        assert_eq!(pool.count(TAG), 3);
        assert_eq!(echo.broadcasting_count(), 3);
    }

    #[test]
    fn ack_supersedes_only_matching_slot() {
        let mut echo = broadcaster();
        let mut pool = PagePool::new(10);
        echo.publish(10, |id| page(id, 0), &mut pool).unwrap();
        echo.publish(11, |id| page(id, 0), &mut pool).unwrap();

        let ack = AckEvent { page: TAG, message_id: 0 };
        assert!(echo.on_ack(&ack, &mut pool).unwrap());
        assert_eq!(echo.state(10), Some(SlotState::Superseded));
        assert_eq!(echo.state(11), Some(SlotState::Broadcasting));
        assert_eq!(pool.count(TAG), 1);

        // Acknowledging the same id again changes nothing.
        assert!(!echo.on_ack(&ack, &mut pool).unwrap());
        // Other pages are not ours to handle.
        let foreign = AckEvent { page: PageTag::ACTIVITY_VARIABLE, message_id: 1 };
        assert!(!echo.on_ack(&foreign, &mut pool).unwrap());
    }

    #[test]
    fn republish_revives_superseded_slot() {
        let mut echo = broadcaster();
        let mut tx = RecordingTransport::default();
        echo.publish(10, |id| page(id, 0), &mut tx).unwrap();
        echo.on_ack(&AckEvent { page: TAG, message_id: 0 }, &mut tx).unwrap();
        tx.clear();

        echo.publish(10, |id| page(id, 5), &mut tx).unwrap();
        assert_eq!(tx.cancels(TAG), 1);
        assert_eq!(tx.last_broadcast(TAG), Some(page(1, 5)));
        assert_eq!(echo.state(10), Some(SlotState::Broadcasting));
    }

    #[test]
    fn sole_broadcasting_key_is_updated_in_place() {
        let mut echo = broadcaster();
        let mut tx = RecordingTransport::default();
        echo.publish(10, |id| page(id, 1), &mut tx).unwrap();
        tx.clear();

        echo.publish(10, |id| page(id, 2), &mut tx).unwrap();
        assert_eq!(tx.calls, vec![Call::Replace(TAG, page(1, 2))]);

        // With a second key on air the tag is rebuilt instead.
        echo.publish(11, |id| page(id, 0), &mut tx).unwrap();
        tx.clear();
        echo.publish(10, |id| page(id, 3), &mut tx).unwrap();
        assert_eq!(tx.cancels(TAG), 1);
        assert_eq!(tx.broadcasts(TAG), 2);
    }

    #[test]
    fn wrapped_id_never_collides_with_one_on_air() {
        let mut echo = broadcaster();
        let mut pool = PagePool::new(10);
        echo.publish(10, |id| page(id, 0), &mut pool).unwrap();
        for n in 0..=u8::MAX {
            echo.publish(11, |id| page(id, n), &mut pool).unwrap();
        }

        // Key 10 still holds id 0; key 11 must have skipped it on wrap.
        let id = echo.payload(11).unwrap()[1];
        assert_ne!(id, 0);
        assert!(echo.on_ack(&AckEvent { page: TAG, message_id: id }, &mut pool).unwrap());
        assert_eq!(echo.state(11), Some(SlotState::Superseded));
        assert_eq!(echo.state(10), Some(SlotState::Broadcasting));
        assert_eq!(pool.count(TAG), 1);
    }

    #[test]
    fn new_key_beyond_capacity_is_fatal() {
        let mut echo = broadcaster();
        let mut tx = RecordingTransport::default();
        for key in [1, 2, 3] {
            echo.publish(key, |id| page(id, 0), &mut tx).unwrap();
        }
        let err = echo.publish(4, |id| page(id, 0), &mut tx).unwrap_err();
        assert!(err.is_fatal());
        assert!(echo.publish(3, |id| page(id, 9), &mut tx).is_ok());
    }
}
