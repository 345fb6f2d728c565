//! [`PagePool`] – the fixed set of pages sharing one broadcast slot.
//!
//! The radio sends one 8-byte payload per channel period.  Every queued page
//! copy occupies one slot of the pool; the pool rotates through occupied
//! slots so each copy gets airtime in turn.  A page queued with several
//! replicas therefore appears proportionally more often, which is how
//! important messages buy redundancy on a lossy link.
//!
//! When nothing is queued the outgoing payload is all zeros.
//!
//! # Example
//!
//! ```
//! use roadwatch_middleware::page_pool::PagePool;
//! use roadwatch_types::{IDLE_PAYLOAD, PageTag};
//!
//! let mut pool = PagePool::new(10);
//! let page = [0x22, 1, 0, 0, 0, 0, 0, 0];
//! pool.add_page(PageTag::MOTION_SAMPLE, page, 2).unwrap();
//! assert_eq!(pool.outgoing(), page);
//!
//! pool.remove_all(PageTag::MOTION_SAMPLE);
//! assert_eq!(pool.outgoing(), IDLE_PAYLOAD);
//! ```

use roadwatch_types::{CoreError, IDLE_PAYLOAD, PageTag, Payload};
use tracing::{debug, trace};

use crate::transport::PageTransport;

#[derive(Debug, Clone, Copy)]
struct Slot {
    tag: PageTag,
    payload: Payload,
}

/// Fixed-capacity rotation of page copies.
#[derive(Debug, Clone)]
pub struct PagePool {
    slots: Vec<Option<Slot>>,
    cursor: usize,
    outgoing: Payload,
}

impl PagePool {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity], cursor: 0, outgoing: IDLE_PAYLOAD }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Number of copies queued under `tag`.
    pub fn count(&self, tag: PageTag) -> usize {
        self.slots.iter().flatten().filter(|s| s.tag == tag).count()
    }

    /// Payload currently on air.
    pub fn outgoing(&self) -> Payload {
        self.outgoing
    }

    /// Queue `replicas` copies of `payload`.
    ///
    /// If the pool was empty the payload goes on air immediately instead of
    /// waiting for the next channel period.
    ///
    /// # Errors
    ///
    /// [`CoreError::CapacityExhausted`] if fewer than `replicas` slots are
    /// free.  The pool is left untouched.
    pub fn add_page(&mut self, tag: PageTag, payload: Payload, replicas: usize) -> Result<(), CoreError> {
        let free: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .take(replicas)
            .collect();
        if free.len() < replicas {
            return Err(CoreError::CapacityExhausted { pool: "page pool", capacity: self.slots.len() });
        }

        let was_empty = self.occupied() == 0;
        for &i in &free {
            self.slots[i] = Some(Slot { tag, payload });
        }
        if was_empty {
            if let Some(&first) = free.first() {
                self.cursor = first;
                self.outgoing = payload;
            }
        }
        debug!(page = %tag, replicas, occupied = self.occupied(), "page queued");
        Ok(())
    }

    /// Drop every copy of `tag`.  Returns how many were removed.
    pub fn remove_all(&mut self, tag: PageTag) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if matches!(slot, Some(s) if s.tag == tag) {
                *slot = None;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(page = %tag, removed, "page cancelled");
        }
        self.idle_if_empty();
        removed
    }

    /// Overwrite every copy of `tag` in place, keeping its rotation order.
    pub fn replace_all(&mut self, tag: PageTag, payload: Payload) {
        for slot in self.slots.iter_mut().flatten().filter(|s| s.tag == tag) {
            slot.payload = payload;
        }
        if matches!(self.slots.get(self.cursor), Some(Some(s)) if s.tag == tag) {
            self.outgoing = payload;
        }
    }

    /// Move to the next occupied slot and put it on air.
    pub fn on_channel_period(&mut self) -> Payload {
        let n = self.slots.len();
        let next = (1..=n)
            .map(|step| (self.cursor + step) % n)
            .find(|&i| self.slots[i].is_some());
        match next {
            Some(i) => {
                self.cursor = i;
                if let Some(slot) = self.slots[i] {
                    self.outgoing = slot.payload;
                }
            }
            None => self.outgoing = IDLE_PAYLOAD,
        }
        trace!(cursor = self.cursor, page = self.outgoing[0], "channel period");
        self.outgoing
    }

    fn idle_if_empty(&mut self) {
        if self.occupied() == 0 {
            self.outgoing = IDLE_PAYLOAD;
        }
    }
}

impl PageTransport for PagePool {
    fn broadcast(&mut self, tag: PageTag, payload: Payload, replicas: usize) -> Result<(), CoreError> {
        self.add_page(tag, payload, replicas)
    }

    fn cancel(&mut self, tag: PageTag) {
        self.remove_all(tag);
    }

    fn replace(&mut self, tag: PageTag, payload: Payload) {
        self.replace_all(tag, payload);
    }
}
