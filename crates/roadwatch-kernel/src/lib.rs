//! `roadwatch-kernel` – Alerting & Sensor Supervision
//!
//! Decides what the roadside sees and which sensors the operator should
//! distrust.  Neither module touches the transport; both return the changes
//! the caller must publish.
//!
//! # Modules
//!
//! - [`alert`] – [`AlertStateMachine`][alert::AlertStateMachine]: folds the
//!   classified activity field into per-indicator raw levels and applies
//!   dwell hysteresis before commanding the LED strips.
//! - [`health`] – [`SensorHealthMonitor`][health::SensorHealthMonitor]:
//!   flags sensors that fire too often (hyperactive) or not at all during a
//!   day (inactive), and clears those flags when the evidence goes away.

pub mod alert;
pub mod health;

pub use alert::{AlertStateMachine, IndicatorState};
pub use health::{HealthChange, HealthCondition, SensorHealthMonitor};
