//! [`MonitoringDispatch`] – ordered delivery of raw sensor samples.
//!
//! Every sensor event is forwarded to the monitoring application as a motion
//! (0x22) or ranging (0x21) page.  Samples are queued FIFO and only the front
//! of the queue is on air, with two replicas.  The front leaves the queue
//! when the monitoring application acknowledges its message id.
//!
//! A full queue sheds its oldest sample: fresh samples matter more to the
//! operator than stale ones that were never acknowledged.

use std::collections::VecDeque;

use roadwatch_types::{AckEvent, CoreError, NodeId, Octant, PageTag, Payload};
use tracing::{debug, warn};

use crate::codec;
use crate::transport::PageTransport;

pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const SAMPLE_REPLICAS: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Sample {
    tag: PageTag,
    message_id: u8,
    payload: Payload,
}

/// FIFO of sample pages with one page on air at a time.
#[derive(Debug, Clone)]
pub struct MonitoringDispatch {
    queue: VecDeque<Sample>,
    capacity: usize,
    next_id: u8,
}

impl Default for MonitoringDispatch {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl MonitoringDispatch {
    pub fn new(capacity: usize) -> Self {
        Self { queue: VecDeque::with_capacity(capacity), capacity: capacity.max(1), next_id: 0 }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Message id of the sample currently on air.
    pub fn front_id(&self) -> Option<u8> {
        self.queue.front().map(|s| s.message_id)
    }

    pub fn push_motion(
        &mut self,
        node_id: NodeId,
        rotation: Octant,
        detected: bool,
        transport: &mut impl PageTransport,
    ) -> Result<(), CoreError> {
        self.push(
            PageTag::MOTION_SAMPLE,
            |id| codec::encode_motion_sample(id, node_id, rotation, detected),
            transport,
        )
    }

    pub fn push_ranging(
        &mut self,
        node_id: NodeId,
        rotation: Octant,
        distance_cm: u16,
        zone: u8,
        transport: &mut impl PageTransport,
    ) -> Result<(), CoreError> {
        self.push(
            PageTag::RANGING_SAMPLE,
            |id| codec::encode_ranging_sample(id, node_id, rotation, distance_cm, zone),
            transport,
        )
    }

    fn push(
        &mut self,
        tag: PageTag,
        build: impl FnOnce(u8) -> Payload,
        transport: &mut impl PageTransport,
    ) -> Result<(), CoreError> {
        let message_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let sample = Sample { tag, message_id, payload: build(message_id) };

        if self.queue.len() >= self.capacity {
            if let Some(evicted) = self.queue.pop_front() {
                warn!(page = %evicted.tag, message_id = evicted.message_id, "sample queue full, dropping oldest");
                transport.cancel(evicted.tag);
            }
            self.queue.push_back(sample);
            return self.broadcast_front(transport);
        }

        let was_empty = self.queue.is_empty();
        self.queue.push_back(sample);
        if was_empty {
            self.broadcast_front(transport)?;
        }
        Ok(())
    }

    /// Handle an acknowledgment.  Returns `true` when it retired the front.
    pub fn on_ack(&mut self, ack: &AckEvent, transport: &mut impl PageTransport) -> Result<bool, CoreError> {
        let matches = self
            .queue
            .front()
            .is_some_and(|s| s.tag == ack.page && s.message_id == ack.message_id);
        if !matches {
            debug!(page = %ack.page, message_id = ack.message_id, "stale sample ack ignored");
            return Ok(false);
        }
        if let Some(done) = self.queue.pop_front() {
            transport.cancel(done.tag);
        }
        self.broadcast_front(transport)?;
        Ok(true)
    }

    fn broadcast_front(&self, transport: &mut impl PageTransport) -> Result<(), CoreError> {
        match self.queue.front() {
            Some(front) => transport.broadcast(front.tag, front.payload, SAMPLE_REPLICAS),
            None => Ok(()),
        }
    }
}
