//! Streaming surface: one WebSocket path, typed JSON events out.
//!
//! The client sends one JSON payload per request (same fields as
//! /api/auto plus requestId). Events stream back in write order; `done`
//! or `error` is always last for a request. Socket close cancels the
//! in-flight request.

use crate::pipeline::{self, EventSink};
use crate::routes::{build_request, AutoBody};
use crate::server::AppState;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use relay_shared::StreamEvent;
use std::sync::Arc;
use tracing::{debug, info, warn};

type AppStateArc = Arc<AppState>;

pub fn ws_routes() -> Router<AppStateArc> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppStateArc>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn error_frame(kind: &str, message: &str) -> String {
    serde_json::to_string(&StreamEvent::Error {
        kind: kind.to_string(),
        message: message.to_string(),
    })
    .unwrap_or_else(|_| format!("{{\"type\":\"error\",\"kind\":\"{}\"}}", kind))
}

async fn handle_socket(socket: WebSocket, state: AppStateArc) {
    let (mut tx, mut rx) = socket.split();

    while let Some(frame) = rx.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                debug!("ws read error: {}", e);
                break;
            }
        };
        let text = match frame {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let body: AutoBody = match serde_json::from_str(&text) {
            Ok(b) => b,
            Err(e) => {
                let _ = tx.send(Message::Text(error_frame("bad_request", &e.to_string()))).await;
                continue;
            }
        };
        let req = match build_request(body, None) {
            Ok(r) => r,
            Err(_) => {
                let _ = tx
                    .send(Message::Text(error_frame("bad_request", "invalid request")))
                    .await;
                continue;
            }
        };
        let request_id = req.request_id.clone();
        info!("ws request {}", request_id);

        let (sink, mut events) = EventSink::new();
        let pipeline_state = state.clone();
        let mut run = tokio::spawn(async move {
            let _ = pipeline::run(&pipeline_state, req, &sink).await;
        });

        // Forward events until the terminal one. If the socket dies first,
        // cancel the request; disconnect is equivalent to cancel.
        let mut socket_alive = true;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let terminal = event.is_terminal();
                        let frame = match serde_json::to_string(&event) {
                            Ok(f) => f,
                            Err(e) => {
                                warn!("event serialization failed: {}", e);
                                continue;
                            }
                        };
                        if tx.send(Message::Text(frame)).await.is_err() {
                            socket_alive = false;
                            state.active.cancel(&request_id).await;
                            break;
                        }
                        if terminal {
                            break;
                        }
                    }
                    // Pipeline finished and dropped its sink.
                    None => break,
                },
                _ = &mut run => {
                    // Drain whatever the pipeline emitted before finishing.
                    while let Some(event) = events.recv().await {
                        let terminal = event.is_terminal();
                        if let Ok(frame) = serde_json::to_string(&event) {
                            if tx.send(Message::Text(frame)).await.is_err() {
                                socket_alive = false;
                                break;
                            }
                        }
                        if terminal {
                            break;
                        }
                    }
                    break;
                }
            }
        }
        if !run.is_finished() {
            // Keep the pipeline running to completion only while its
            // client is still there.
            if socket_alive {
                let _ = (&mut run).await;
            } else {
                state.active.cancel(&request_id).await;
                run.abort();
            }
        }
        if !socket_alive {
            break;
        }
    }
    debug!("ws closed");
}
