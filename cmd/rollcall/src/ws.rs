//! WebSocket handler hosting one attendance session per connection.

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use rollcall_attendance::transport::{Inbound, SessionTransport};
use rollcall_attendance::{Event, MatchSession, TransportError};
use tracing::{debug, info, warn};

use crate::server::AppState;

/// WebSocket upgrade handler for /ws/start_attendance.
pub async fn start_attendance(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("attendance session opened");
    let mut transport = WsTransport { socket };
    let mut session = MatchSession::new(
        state.roster.clone(),
        state.detector.clone(),
        state.session.clone(),
    );
    match session.run(&mut transport).await {
        Ok(summary) => info!(?summary, "attendance session finished"),
        Err(e) => warn!(error = %e, phase = ?session.phase(), "attendance session failed"),
    }
    // Best effort; the peer may already be gone.
    let _ = transport.socket.send(Message::Close(None)).await;
}

/// Adapts an axum WebSocket to the session transport.
struct WsTransport {
    socket: WebSocket,
}

/// What a received WebSocket frame means to the session.
#[derive(Debug, PartialEq)]
enum Received {
    Deliver(Inbound),
    Ignore,
    Closed,
}

/// Classifies one `WebSocket::recv` result. A receive error means the
/// connection is gone, which the session treats like a close.
fn classify(msg: Option<Result<Message, axum::Error>>) -> Received {
    match msg {
        Some(Ok(Message::Text(text))) => Received::Deliver(Inbound::Text(text.to_string())),
        Some(Ok(Message::Binary(bytes))) => Received::Deliver(Inbound::Binary(bytes.to_vec())),
        Some(Ok(Message::Close(_))) | None => Received::Closed,
        Some(Ok(_)) => Received::Ignore,
        Some(Err(e)) => {
            debug!(error = %e, "websocket receive failed, treating as disconnect");
            Received::Closed
        }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        loop {
            match classify(self.socket.recv().await) {
                Received::Deliver(inbound) => return Ok(Some(inbound)),
                Received::Ignore => continue,
                Received::Closed => return Ok(None),
            }
        }
    }

    async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        let json =
            serde_json::to_string(event).map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.socket
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }
}
