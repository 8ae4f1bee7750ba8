//! Multi-room WebSocket Chat Server Library
//!
//! A WebSocket chat server built with tokio-tungstenite. Clients join
//! named rooms, either public or private (guarded by an access key),
//! and every chat line is broadcast to all connections in the room.
//!
//! # Features
//! - Public rooms, created on first join
//! - Private rooms locked with a key by their first joiner
//! - Join / leave notices and chat broadcast to every room member
//! - Membership in several rooms at once
//! - Disconnect cleanup that leaves every joined room
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomEngine` holds the room directory and connection registry and
//!   applies each operation as one synchronous state transition
//! - `ChatServer` is the central actor that owns the engine and delivers
//!   its output to connections
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_room_server::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx, 32));
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use config::ServerConfig;
pub use directory::{KeyPolicy, RoomDirectory};
pub use engine::{EngineOptions, Outbound, RoomEngine};
pub use error::{AppError, EngineError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ErrorCode, MessageKind, ServerMessage};
pub use registry::{ConnectionRegistry, Membership};
pub use room::PrivateRoom;
pub use server::{ChatServer, ServerCommand};
pub use types::{ConnectionId, RoomName, Visibility};
