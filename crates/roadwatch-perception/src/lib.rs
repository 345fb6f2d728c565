//! `roadwatch-perception` – spatial model of the gateway.
//!
//! Turns directional, heterogeneous sensor reports into a decaying scalar
//! field over the cells between field nodes.
//!
//! # Modules
//!
//! - [`topology`] – [`TopologyRegistry`][topology::TopologyRegistry]: node id
//!   → provisioned grid placement, with an edge-triggered change flag.
//! - [`grid`] – [`ActivityGrid`][grid::ActivityGrid] and
//!   [`GridGeometry`][grid::GridGeometry]: bounded activity field, roadside
//!   aware classification, and the position ↔ array coordinate mapping.
//! - [`translator`] – [`DetectionTranslator`][translator::DetectionTranslator]:
//!   per-sensor debouncing, ranging zones, growth and per-second trickle.
//! - [`decay`] – [`DecayEngine`][decay::DecayEngine]: uniform decay toward the
//!   floor.

pub mod decay;
pub mod grid;
pub mod topology;
pub mod translator;

pub use decay::DecayEngine;
pub use grid::{ActivityGrid, CellIndex, GridGeometry};
pub use topology::{NodeRecord, TopologyRegistry};
pub use translator::{DebounceState, DetectionTranslator, RangeZone, Translation};
