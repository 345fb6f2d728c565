//! `roadwatch-runtime` – The Gateway Process
//!
//! Wires the spatial model, the alerting kernel and the broadcast slot into
//! one owned [`Gateway`][gateway::Gateway] and drives it from time and
//! transport stimuli.
//!
//! # Modules
//!
//! - [`gateway`] – [`Gateway`][gateway::Gateway]: owns every component and
//!   runs the per-second pipeline (topology sync, decay, trickle, alerting,
//!   activity echo).  [`GatewayConfig`][gateway::GatewayConfig] sizes its
//!   pools.
//! - [`scheduler`] – [`TickScheduler`][scheduler::TickScheduler]: derives
//!   minute, hour and day boundaries from the 1 s tick.
//! - [`driver`] – [`run`][driver::run]: the Tokio task that serialises
//!   inbound messages and timer ticks onto the gateway.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   `tracing` subscriber with optional OTLP export.

pub mod driver;
pub mod gateway;
pub mod scheduler;
pub mod telemetry;

pub use driver::{Inbound, run};
pub use gateway::{Gateway, GatewayConfig};
pub use scheduler::{TickScheduler, Ticks};
pub use telemetry::{TracerProviderGuard, init_tracing};
