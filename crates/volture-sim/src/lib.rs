//! ---
//! volture_section: "02-telemetry-simulation"
//! volture_subsection: "01-bootstrap"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Simulation module exports and shared battery types."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
//! Battery pack reading synthesis for the Volture telemetry service.
//!
//! The [`TelemetrySource`] owns the single live [`BatterySnapshot`] and is the only
//! mutation surface; everything else in this crate is either a value type or a
//! stateless helper driven by a [`RandomSource`].

pub mod faults;
pub mod generator;
pub mod history;
pub mod random;
pub mod snapshot;
pub mod source;

pub use faults::FaultInjector;
pub use generator::{FieldWalk, ReadingSynthesizer, WalkProfile};
pub use history::{HistoryBand, HistoryPoint, SyntheticHistory};
pub use random::{RandomSource, SeededRandom};
pub use snapshot::{BatterySnapshot, FaultCode, FaultEvent, FaultFlags, Parameter};
pub use source::TelemetrySource;
