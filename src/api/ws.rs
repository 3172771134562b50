//! Websocket transport for [`TokenizeSession`].
//!
//! One loop per connection: client frames are answered strictly in order,
//! hub notifications are interleaved between them. Closing the socket drops
//! the session, which deregisters it from the hub.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};

use super::AppState;
use crate::error::VocabError;
use crate::session::{ServerFrame, TokenizeSession};

/// GET /ws/tokenize
pub async fn tokenize_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(mut socket: WebSocket, state: AppState) {
    let mut session = TokenizeSession::open(Arc::clone(&state.store), &state.hub);

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::debug!(session = %session.id(), error = %e, "websocket receive failed");
                        break;
                    }
                    None => break,
                };

                let reply = match message {
                    Message::Text(text) => session.handle_frame(&text).await,
                    Message::Binary(_) => ServerFrame::from_error(&VocabError::Protocol(
                        "binary frames are not supported".to_string(),
                    )),
                    Message::Close(_) => break,
                    // Pings are answered by axum
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                if send_frame(&mut socket, &reply).await.is_err() {
                    break;
                }
            }
            notification = session.next_notification() => {
                let Some(frame) = notification else { break };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    session.close();
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), ()> {
    let json = match frame.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode frame");
            return Ok(());
        }
    };
    socket.send(Message::Text(json)).await.map_err(|e| {
        tracing::debug!(error = %e, "websocket send failed");
    })
}
