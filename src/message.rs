//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, EngineError};

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a public room, or a private room with its key
    Join {
        room: String,
        username: String,
        #[serde(default)]
        private: bool,
        #[serde(default)]
        key: Option<String>,
    },
    /// Leave a room. `private` falls back to the visibility the room was joined with.
    Leave {
        room: String,
        username: String,
        #[serde(default)]
        private: Option<bool>,
    },
    /// Broadcast a chat line into a room
    SendMessage {
        room: String,
        username: String,
        msg: String,
    },
}

/// Kind of room broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Joined,
    Left,
    Chat,
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted, connection ID issued
    Connected { connection_id: String },
    /// Room broadcast
    Message { kind: MessageKind, msg: String },
    /// Error addressed to the requesting connection only
    Error { code: ErrorCode, msg: String },
}

impl ServerMessage {
    pub fn joined(display_name: &str, room: &str) -> Self {
        ServerMessage::Message {
            kind: MessageKind::Joined,
            msg: format!("{} has joined {}", display_name, room),
        }
    }

    pub fn left(display_name: &str, room: &str) -> Self {
        ServerMessage::Message {
            kind: MessageKind::Left,
            msg: format!("{} has left {}", display_name, room),
        }
    }

    pub fn chat(display_name: &str, text: &str) -> Self {
        ServerMessage::Message {
            kind: MessageKind::Chat,
            msg: format!("{}: {}", display_name, text),
        }
    }
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Private room key did not match
    InvalidRoomKey,
    /// Sent or left a room without being in it (strict mode)
    NotInRoom,
    /// Frame could not be parsed
    InvalidMessage,
    /// Anything the client cannot act on
    Internal,
}

/// Convert EngineError to ServerMessage for client notification
impl From<EngineError> for ServerMessage {
    fn from(err: EngineError) -> Self {
        let (code, msg) = match &err {
            EngineError::InvalidRoomKey(_) => {
                (ErrorCode::InvalidRoomKey, "Invalid room key.".to_string())
            }
            EngineError::NotInRoom(room) => {
                (ErrorCode::NotInRoom, format!("You are not in room {}.", room))
            }
            // Registry bookkeeping errors are server-side faults
            EngineError::DuplicateConnection(_) | EngineError::UnknownConnection(_) => {
                (ErrorCode::Internal, "Internal error".to_string())
            }
        };
        ServerMessage::Error { code, msg }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Json(e) => ServerMessage::Error {
                code: ErrorCode::InvalidMessage,
                msg: format!("Invalid message format: {}", e),
            },
            // Fatal errors are not typically converted (connection closes)
            _ => ServerMessage::Error {
                code: ErrorCode::Internal,
                msg: "Internal error".to_string(),
            },
        }
    }
}
