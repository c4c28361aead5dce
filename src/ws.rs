use crate::http::AppState;
use crate::hub::FanOutHub;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

/// Message accepted from viewers over the real-time channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
enum ViewerCommand {
    #[serde(rename = "pumpCommand")]
    PumpCommand(String),
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

async fn handle_socket(socket: WebSocket, hub: FanOutHub) {
    let (session, mut events) = hub.connect();
    let (mut sink, mut stream) = socket.split();

    // Drains this session's queue; the hub never blocks on us.
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to encode viewer event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ViewerCommand>(text.as_str()) {
                Ok(ViewerCommand::PumpCommand(command)) => {
                    hub.forward_command(session, command).await;
                }
                Err(_) => {
                    tracing::debug!(%session, "ignoring unrecognized viewer message");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    hub.disconnect(session);
    send_task.abort();
}
