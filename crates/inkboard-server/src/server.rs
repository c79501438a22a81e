//! HTTP surface of the relay: the WebSocket endpoint and a health check.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::relay::Relay;

/// Build the relay router.
pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(relay)
}

/// Serve the relay on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, relay: Arc<Relay>) -> std::io::Result<()> {
    axum::serve(
        listener,
        router(relay).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    participants: usize,
}

/// Health check
async fn health(State(relay): State<Arc<Relay>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        participants: relay.participant_count(),
    })
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(origin): ConnectInfo<SocketAddr>,
    State(relay): State<Arc<Relay>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, origin, relay))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, origin: SocketAddr, relay: Arc<Relay>) {
    let (id, mut outbound) = relay.connect();
    info!(participant = %id, %origin, "Participant connected");

    let (mut sender, mut receiver) = socket.split();

    // Drain this participant's queue into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Feed everything this participant sends into the relay.
    let recv_relay = relay.clone();
    let recv_id = id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let forwarded = match msg {
                Ok(Message::Text(text)) => recv_relay.on_message(&recv_id, text.as_str()),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => recv_relay.on_message(&recv_id, text),
                    Err(e) => {
                        warn!(participant = %recv_id, "Dropping non UTF-8 binary message: {}", e);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue, // Ping/pong
                Err(e) => {
                    warn!(participant = %recv_id, "WebSocket error: {}", e);
                    break;
                }
            };
            if let Err(e) = forwarded {
                warn!(participant = %recv_id, "Dropping message: {}", e);
            }
        }
    });

    let recv_finished = tokio::select! {
        _ = &mut send_task => false,
        _ = &mut recv_task => true,
    };

    // Stop forwarding before announcing the departure, so `leave` is the last
    // thing peers hear from this participant.
    if !recv_finished {
        recv_task.abort();
        let _ = recv_task.await;
    }
    relay.disconnect(&id);
    send_task.abort();

    info!(participant = %id, %origin, "Participant disconnected");
}
