//! ---
//! volture_section: "05-networking-external-interfaces"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "Pull and push interfaces served over HTTP."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! HTTP surfaces of the battery monitor: the REST pull endpoints under `/api`
//! and the WebSocket push channel at `/ws`, served from one listener.

pub mod rest;
pub mod websocket;

pub use rest::{HealthResponse, HistoryResponse, RestApiBuilder, RestApiHandle};
pub use websocket::{ServerEvent, GREETING};
