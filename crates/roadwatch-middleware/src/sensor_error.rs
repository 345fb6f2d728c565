//! [`SensorErrorReporter`] – hyperactive and inactive sensor reports.
//!
//! Reports are keyed by sensor, so a newer condition for the same sensor
//! replaces the older one.  Only one report is on air at a time; the
//! reporter walks its table round-robin, moving on whenever the monitoring
//! application acknowledges the report on air.  When the table runs dry the
//! page is cancelled.  A new condition for the report on air is written over
//! the queued page when the tag is unchanged.

use roadwatch_types::{AckEvent, CoreError, PageTag, SensorKey};
use tracing::{debug, info};

use crate::codec;
use crate::transport::PageTransport;

pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Report {
    key: SensorKey,
    tag: PageTag,
    flag: bool,
}

#[derive(Debug, Clone, Copy)]
struct OnAir {
    slot: usize,
    tag: PageTag,
    message_id: u8,
}

/// Round-robin sender of sensor error pages.
#[derive(Debug, Clone)]
pub struct SensorErrorReporter {
    slots: Vec<Option<Report>>,
    on_air: Option<OnAir>,
    next_id: u8,
}

impl Default for SensorErrorReporter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SensorErrorReporter {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity], on_air: None, next_id: 0 }
    }

    /// Number of reports waiting for acknowledgment.
    pub fn pending(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Key of the report on air.
    pub fn on_air(&self) -> Option<SensorKey> {
        self.on_air.and_then(|a| self.slots[a.slot]).map(|r| r.key)
    }

    /// Queue a report for `key` under `tag` (0x25 or 0x26).
    ///
    /// # Errors
    ///
    /// [`CoreError::CapacityExhausted`] when `key` is new and the table is
    /// full, or when the transport cannot fit the page.
    pub fn report(
        &mut self,
        key: SensorKey,
        tag: PageTag,
        flag: bool,
        transport: &mut impl PageTransport,
    ) -> Result<(), CoreError> {
        let existing = self.slots.iter().position(|s| matches!(s, Some(r) if r.key == key));
        let slot = match existing.or_else(|| self.slots.iter().position(Option::is_none)) {
            Some(i) => i,
            None => {
                return Err(CoreError::CapacityExhausted {
                    pool: "sensor error reports",
                    capacity: self.slots.len(),
                });
            }
        };
        self.slots[slot] = Some(Report { key, tag, flag });
        info!(node_id = key.node_id, rotation = %key.rotation, page = %tag, flag, "sensor error queued");

        match self.on_air {
            None => self.broadcast_from(slot, transport),
            Some(a) if a.slot == slot && a.tag == tag => {
                self.replace_on_air(slot, transport);
                Ok(())
            }
            // The report on air changed page; put the new content on air.
            Some(a) if a.slot == slot => self.broadcast_from(slot, transport),
            Some(_) => Ok(()),
        }
    }

    /// Handle an acknowledgment.  Returns `true` when it retired the report
    /// on air.
    pub fn on_ack(&mut self, ack: &AckEvent, transport: &mut impl PageTransport) -> Result<bool, CoreError> {
        let Some(a) = self.on_air.filter(|a| a.tag == ack.page && a.message_id == ack.message_id) else {
            debug!(page = %ack.page, message_id = ack.message_id, "stale sensor error ack ignored");
            return Ok(false);
        };
        self.slots[a.slot] = None;
        self.broadcast_from(a.slot + 1, transport)?;
        Ok(true)
    }

    /// Overwrite the page on air with the current content of `slot` under a
    /// fresh message id.
    fn replace_on_air(&mut self, slot: usize, transport: &mut impl PageTransport) {
        let (Some(report), Some(on_air)) = (self.slots[slot], self.on_air.as_mut()) else {
            return;
        };
        let message_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        transport.replace(report.tag, codec::encode_sensor_error(report.tag, message_id, &report.key, report.flag));
        on_air.message_id = message_id;
    }

    /// Put the first pending report at or after `start` (wrapping) on air,
    /// or cancel the page when nothing is pending.
    fn broadcast_from(&mut self, start: usize, transport: &mut impl PageTransport) -> Result<(), CoreError> {
        if let Some(previous) = self.on_air.take() {
            transport.cancel(previous.tag);
        }
        let n = self.slots.len();
        let next = (0..n)
            .map(|step| (start + step) % n)
            .find_map(|i| self.slots[i].map(|r| (i, r)));
        let Some((slot, report)) = next else {
            return Ok(());
        };

        let message_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let payload = codec::encode_sensor_error(report.tag, message_id, &report.key, report.flag);
        transport.broadcast(report.tag, payload, 1)?;
        self.on_air = Some(OnAir { slot, tag: report.tag, message_id });
        Ok(())
    }
}
