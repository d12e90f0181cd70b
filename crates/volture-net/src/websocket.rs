//! ---
//! volture_section: "05-networking-external-interfaces"
//! volture_subsection: "module"
//! volture_type: "source"
//! volture_scope: "code"
//! volture_description: "WebSocket push channel for per-tick battery updates."
//! volture_version: "v0.1.0"
//! volture_owner: "tbd"
//! ---
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use volture_core::{ChannelSink, DistributionHub, SubscriptionId, TelemetryUpdate};

/// Status message sent to every client right after the upgrade.
pub const GREETING: &str = "Connected to Volture battery monitor";

/// Event envelope written to clients as `{"event": ..., "data": ...}`.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent<'a> {
    /// Connection and subscription state changes.
    Status {
        /// Human readable status line.
        message: &'a str,
    },
    /// One tick's reading and its alerts.
    BatteryUpdate(&'a TelemetryUpdate),
    /// Rejected command or subscription.
    Error {
        /// Why the request was rejected.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ClientCommand {
    action: String,
}

struct WebSocketState {
    hub: Arc<DistributionHub>,
    sink_buffer: usize,
    shutdown: watch::Receiver<bool>,
}

struct ClientSubscription {
    id: SubscriptionId,
    updates: mpsc::Receiver<Arc<TelemetryUpdate>>,
}

/// Routes serving the push channel at `/ws`.
pub(crate) fn router(
    hub: Arc<DistributionHub>,
    sink_buffer: usize,
    shutdown: watch::Receiver<bool>,
) -> Router {
    Router::new()
        .route("/ws", get(upgrade_handler))
        .with_state(Arc::new(WebSocketState {
            hub,
            sink_buffer,
            shutdown,
        }))
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WebSocketState>>,
) -> axum::response::Response {
    ws.on_upgrade(|socket| client_loop(socket, state))
}

async fn client_loop(mut socket: WebSocket, state: Arc<WebSocketState>) {
    info!("websocket client connected");
    if send_event(&mut socket, &ServerEvent::Status { message: GREETING })
        .await
        .is_err()
    {
        return;
    }

    let mut shutdown = state.shutdown.clone();
    let mut subscription: Option<ClientSubscription> = None;
    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            update = next_update(&mut subscription) => {
                let Some(update) = update else {
                    // The hub dropped our sink after a failed delivery.
                    subscription = None;
                    let event = ServerEvent::Error {
                        message: "subscription dropped by server".into(),
                    };
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                    continue;
                };
                if send_event(&mut socket, &ServerEvent::BatteryUpdate(&update)).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                let Some(Ok(message)) = message else {
                    break;
                };

                let reply = match message {
                    Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(cmd) => handle_command(cmd, &state, &mut subscription),
                        Err(err) => {
                            warn!(error = %err, "invalid websocket command payload");
                            Reply::Error("invalid command".into())
                        }
                    },
                    Message::Binary(_) => Reply::Error("binary unsupported".into()),
                    Message::Ping(payload) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Message::Pong(_) => continue,
                    Message::Close(_) => break,
                };

                let event = match &reply {
                    Reply::Status(message) => ServerEvent::Status { message: *message },
                    Reply::Error(message) => ServerEvent::Error { message: message.clone() },
                };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(subscription) = subscription {
        state.hub.unsubscribe(subscription.id);
    }
    info!("websocket client disconnected");
}

enum Reply {
    Status(&'static str),
    Error(String),
}

async fn next_update(
    subscription: &mut Option<ClientSubscription>,
) -> Option<Arc<TelemetryUpdate>> {
    match subscription {
        Some(subscription) => subscription.updates.recv().await,
        None => std::future::pending().await,
    }
}

fn handle_command(
    cmd: ClientCommand,
    state: &WebSocketState,
    subscription: &mut Option<ClientSubscription>,
) -> Reply {
    match cmd.action.as_str() {
        "subscribe" | "subscribe_battery" => {
            if subscription.is_some() {
                return Reply::Status("Already subscribed to battery updates");
            }
            let (sink, updates) = ChannelSink::channel(state.sink_buffer);
            match state.hub.subscribe(Arc::new(sink)) {
                Ok(id) => {
                    debug!(subscription = %id, "websocket client subscribed");
                    *subscription = Some(ClientSubscription { id, updates });
                    Reply::Status("Subscribed to battery updates")
                }
                Err(err) => Reply::Error(err.to_string()),
            }
        }
        "unsubscribe" => match subscription.take() {
            Some(current) => {
                state.hub.unsubscribe(current.id);
                debug!(subscription = %current.id, "websocket client unsubscribed");
                Reply::Status("Unsubscribed from battery updates")
            }
            None => Reply::Status("Not subscribed to battery updates"),
        },
        other => {
            warn!(action = %other, "unknown websocket command received");
            Reply::Error(format!("unknown action '{other}'"))
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent<'_>) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "failed to serialise websocket event");
            return Ok(());
        }
    };
    socket.send(Message::Text(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use volture_sim::BatterySnapshot;

    #[test]
    fn events_use_event_and_data_envelope() {
        let greeting = serde_json::to_value(ServerEvent::Status { message: GREETING }).unwrap();
        assert_eq!(
            greeting,
            json!({"event": "status", "data": {"message": GREETING}})
        );

        let update = TelemetryUpdate {
            data: BatterySnapshot::seed(Utc::now()),
            alerts: Vec::new(),
        };
        let value = serde_json::to_value(ServerEvent::BatteryUpdate(&update)).unwrap();
        assert_eq!(value["event"], "battery_update");
        assert_eq!(value["data"]["data"]["voltage"], 48.5);
        assert_eq!(value["data"]["alerts"], json!([]));

        let error = serde_json::to_value(ServerEvent::Error {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(error, json!({"event": "error", "data": {"message": "nope"}}));
    }
}
