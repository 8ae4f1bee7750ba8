//! Error types for the chat server
//!
//! Defines application-level errors, room engine errors, and message send
//! errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::{ConnectionId, RoomName};

/// Application-level errors
///
/// Fatal for a single connection, or for the process when the
/// listener cannot be bound.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Room engine errors
///
/// Always local to the request that caused them. None of these leave
/// partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Connection id registered twice
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// Operation on a connection that was never registered (or already gone)
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// Private room key mismatch (or missing key)
    #[error("Invalid key for room {0}")]
    InvalidRoomKey(RoomName),

    /// Strict mode only: the connection has no membership in the room
    #[error("Not in room {0}")]
    NotInRoom(RoomName),
}

/// Message send errors
///
/// Occurs when handing a message to a connection's outbound channel.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection is not draining its channel fast enough
    #[error("Channel full")]
    ChannelFull,
}
