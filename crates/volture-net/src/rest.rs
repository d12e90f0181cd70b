//! ---
//! volture_section: "05-networking-external-interfaces"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "REST pull interface for readings, history and health."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use volture_core::{CurrentReading, DistributionHub, QueryError, QueryService};
use volture_sim::HistoryPoint;

/// Body of `GET /api/battery/history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    /// Points newest first.
    pub data: Vec<HistoryPoint>,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server answers.
    pub status: String,
    /// Time the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Server version string.
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    hours: Option<String>,
}

struct RestState {
    query: Arc<QueryService>,
    version: String,
}

/// Builder used to configure and spawn the API server.
#[derive(Clone)]
pub struct RestApiBuilder {
    listen: SocketAddr,
    query: Arc<QueryService>,
    hub: Arc<DistributionHub>,
    version: String,
    sink_buffer: usize,
    allow_any_origin: bool,
}

impl RestApiBuilder {
    /// Construct a builder serving `query` on the REST routes and `hub` on `/ws`.
    pub fn new(listen: SocketAddr, query: Arc<QueryService>, hub: Arc<DistributionHub>) -> Self {
        Self {
            listen,
            query,
            hub,
            version: env!("CARGO_PKG_VERSION").to_owned(),
            sink_buffer: 16,
            allow_any_origin: true,
        }
    }

    /// Version reported by the health endpoint.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Per-client queue depth for pushed updates.
    pub fn with_sink_buffer(mut self, sink_buffer: usize) -> Self {
        self.sink_buffer = sink_buffer;
        self
    }

    /// Answer cross-origin requests from any origin.
    pub fn allow_any_origin(mut self, allow: bool) -> Self {
        self.allow_any_origin = allow;
        self
    }

    fn router(self, shutdown: watch::Receiver<bool>) -> Router {
        let state = RestState {
            query: self.query,
            version: self.version,
        };
        let router = Router::new()
            .route("/api/battery", get(get_battery))
            .route("/api/battery/history", get(get_history))
            .route("/api/health", get(get_health))
            .with_state(Arc::new(state))
            .merge(crate::websocket::router(self.hub, self.sink_buffer, shutdown));
        let router = if self.allow_any_origin {
            router.layer(CorsLayer::permissive())
        } else {
            router
        };
        router.layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve until [`RestApiHandle::shutdown`] is called.
    pub async fn spawn(self) -> anyhow::Result<RestApiHandle> {
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "api server listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let router = self.router(shutdown_rx.clone());
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "api server exited with error");
            }
        });

        Ok(RestApiHandle {
            address: local_addr,
            task,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle returned from [`RestApiBuilder::spawn`].
pub struct RestApiHandle {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl RestApiHandle {
    /// Socket address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Request graceful shutdown and wait for the server task to finish. Open
    /// WebSocket clients receive a close frame.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(join) => Err(anyhow::anyhow!(join)),
        }
    }
}

async fn get_battery(State(state): State<Arc<RestState>>) -> Json<CurrentReading> {
    Json(state.query.snapshot())
}

async fn get_history(
    State(state): State<Arc<RestState>>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let points = state
        .query
        .parse_hours(params.hours.as_deref())
        .and_then(|hours| state.query.history(hours));
    match points {
        Ok(data) => Json(HistoryResponse { data }).into_response(),
        Err(err) => bad_request(err),
    }
}

async fn get_health(State(state): State<Arc<RestState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now(),
        version: state.version.clone(),
    })
}

fn bad_request(err: QueryError) -> Response {
    debug!(error = %err, "rejected history request");
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
