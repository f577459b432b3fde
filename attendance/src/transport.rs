//! Session transport seam and an in-process pipe implementation.
//!
//! A [`SessionTransport`] delivers inbound messages in order and carries
//! [`Event`]s back to the client. The server binary adapts WebSocket
//! connections to it; tests use [`new_pipe`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::event::Event;

/// One message received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

/// Bidirectional, ordered message channel owned by one session.
#[async_trait]
pub trait SessionTransport: Send {
    /// Receives the next message.
    /// Returns `Ok(None)` when the client closed the connection normally.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;

    /// Sends one event to the client.
    async fn send(&mut self, event: &Event) -> Result<(), TransportError>;
}

const PIPE_CAPACITY: usize = 1024;

/// Creates a connected session-side transport and client handle.
pub fn new_pipe() -> (PipeTransport, PipeClient) {
    let (inbound_tx, inbound_rx) = mpsc::channel(PIPE_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(PIPE_CAPACITY);
    (
        PipeTransport {
            inbound: inbound_rx,
            events: events_tx,
        },
        PipeClient {
            inbound: Some(inbound_tx),
            events: events_rx,
        },
    )
}

/// Session side of a pipe.
pub struct PipeTransport {
    inbound: mpsc::Receiver<Inbound>,
    events: mpsc::Sender<Event>,
}

#[async_trait]
impl SessionTransport for PipeTransport {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        self.events
            .send(event.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Client side of a pipe.
pub struct PipeClient {
    inbound: Option<mpsc::Sender<Inbound>>,
    events: mpsc::Receiver<Event>,
}

impl PipeClient {
    pub async fn send(&self, msg: Inbound) -> Result<(), TransportError> {
        let tx = self.inbound.as_ref().ok_or(TransportError::Closed)?;
        tx.send(msg).await.map_err(|_| TransportError::Closed)
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(Inbound::Text(text.into())).await
    }

    pub async fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.send(Inbound::Binary(bytes.into())).await
    }

    /// Receives the next event, or `None` once the session has ended and
    /// every buffered event was read.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Closes the client's sending half. Buffered messages are still
    /// delivered before the session sees the close.
    pub fn close(&mut self) {
        self.inbound = None;
    }
}
