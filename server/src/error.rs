use crate::client_manager::EndpointId;

/// Errors surfaced by the session engine.
///
/// None of these are fatal to the process: the worst case, `CorruptState`,
/// tears down the one session it was raised for.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Inbound text that does not parse as a control message.
    #[error("Invalid message format: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// Two endpoints are already bound to the session.
    #[error("Session {0} is full")]
    SessionFull(String),

    /// The session does not exist or was already reaped.
    #[error("Session {0} not found")]
    NotFound(String),

    /// The match is over; no further input is accepted.
    #[error("Game has already finished")]
    GameFinished,

    /// The simulation produced non-finite state.
    #[error("Session {0} has corrupt simulation state")]
    CorruptState(String),

    /// The endpoint's outbound queue is closed or full.
    #[error("Failed to deliver to endpoint {endpoint}: {reason}")]
    SendFailed {
        endpoint: EndpointId,
        reason: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
