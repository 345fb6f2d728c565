//! `roadwatch-middleware` – The Broadcast Slot
//!
//! Multiplexes every outbound message onto a single 8-byte broadcast slot
//! and recovers reliability from application-level acknowledgments.  The
//! crate does not care what the pages mean; senders hand it encoded
//! payloads and the page tags they answer to.
//!
//! # Modules
//!
//! - [`transport`] – [`PageTransport`][transport::PageTransport]: the
//!   broadcast / cancel / replace seam every sender talks through.
//! - [`page_pool`] – [`PagePool`][page_pool::PagePool]: fixed rotation of
//!   page copies that feeds the radio once per channel period.
//! - [`codec`] – byte layouts of inbound and outbound pages.
//! - [`dispatch`] – [`MonitoringDispatch`][dispatch::MonitoringDispatch]:
//!   FIFO of raw sensor samples, one on air at a time.
//! - [`keyed`] – [`KeyedBroadcaster`][keyed::KeyedBroadcaster]: latest-value
//!   status echoes, one slot per subject.
//! - [`sensor_error`] – [`SensorErrorReporter`][sensor_error::SensorErrorReporter]:
//!   round-robin hyperactive and inactive sensor reports.

pub mod codec;
pub mod dispatch;
pub mod keyed;
pub mod page_pool;
pub mod sensor_error;
pub mod transport;

pub use dispatch::MonitoringDispatch;
pub use keyed::{KeyedBroadcaster, SlotState};
pub use page_pool::PagePool;
pub use sensor_error::SensorErrorReporter;
pub use transport::PageTransport;
