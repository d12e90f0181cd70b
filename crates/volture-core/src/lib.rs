//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Alerting, fan-out distribution and query services."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
//! Telemetry core for Volture: threshold alerting, the distribution hub that fans
//! each tick out to subscriber sinks, the pull-side query service, and the
//! periodic driver that ties them to a fixed schedule.

pub mod alerts;
pub mod driver;
pub mod history;
pub mod hub;
pub mod query;
pub mod sink;

pub use alerts::{evaluate, Alert, AlertKind, Breach, ThresholdRule, ThresholdTable};
pub use driver::{TickDriver, TickDriverHandle};
pub use history::{HistorySource, RetentionBuffer};
pub use hub::{DistributionHub, HubError, HubSettings, TelemetryUpdate, TickReport};
pub use query::{CurrentReading, QueryError, QueryService};
pub use sink::{ChannelSink, DeliveryError, SubscriptionId, TelemetrySink};
