//! The seam between the senders and the radio slot.
//!
//! Senders never touch the pool directly.  They speak [`PageTransport`],
//! which lets tests swap in a recording double and keeps the pool free to
//! change its scheduling.

use roadwatch_types::{CoreError, PageTag, Payload};

/// Primitives every page sender relies on.
pub trait PageTransport {
    /// Queue `replicas` copies of `payload` under `tag`.
    ///
    /// # Errors
    ///
    /// [`CoreError::CapacityExhausted`] when the copies do not fit.  Nothing
    /// is queued in that case.
    fn broadcast(&mut self, tag: PageTag, payload: Payload, replicas: usize) -> Result<(), CoreError>;

    /// Drop every copy queued under `tag`.
    fn cancel(&mut self, tag: PageTag);

    /// Overwrite the payload of every copy queued under `tag`.
    fn replace(&mut self, tag: PageTag, payload: Payload);
}
