//! ---
//! volture_section: "01-core-functionality"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Subscriber sink abstraction used by the distribution hub."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hub::TelemetryUpdate;

/// Identifier returned by [`crate::DistributionHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Reasons a sink failed to accept a tick payload.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The transport behind the sink has gone away.
    #[error("subscriber disconnected")]
    Disconnected,
    /// The sink did not accept the payload within the hub's delivery timeout.
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
    /// The sink panicked while handling the payload.
    #[error("sink panicked during delivery")]
    Panicked,
    #[error("delivery failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryError::Disconnected => "disconnected",
            DeliveryError::TimedOut(_) => "timeout",
            DeliveryError::Panicked => "panicked",
            DeliveryError::Failed(_) => "failed",
        }
    }
}

/// Delivery target registered with the hub, typically one connected client.
#[async_trait]
pub trait TelemetrySink: Send + Sync + 'static {
    async fn deliver(&self, update: Arc<TelemetryUpdate>) -> Result<(), DeliveryError>;
}

/// Sink backed by a bounded mpsc channel. A full channel applies backpressure
/// until the hub's delivery timeout; a dropped receiver reports a disconnect.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Arc<TelemetryUpdate>>,
}

impl ChannelSink {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Arc<TelemetryUpdate>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn deliver(&self, update: Arc<TelemetryUpdate>) -> Result<(), DeliveryError> {
        self.tx
            .send(update)
            .await
            .map_err(|_| DeliveryError::Disconnected)
    }
}
