//! Multi-room WebSocket Chat Server - Entry Point
//!
//! Parses configuration, starts the TCP listener and ChatServer actor,
//! and accepts connections.

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_room_server::{
    handle_connection, AppError, ChatServer, KeyPolicy, RoomEngine, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ServerConfig::parse();

    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_room_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let listener = TcpListener::bind(&config.addr).await?;
    info!("WebSocket Chat Server listening on {}", config.addr);

    let key_policy = config.key_policy();
    match &key_policy {
        KeyPolicy::PerRoom => info!("Private room keys are set by the first joiner"),
        KeyPolicy::Shared(_) => info!("Private rooms use the shared key"),
    }
    let options = config.engine_options();
    info!("Engine options: {:?}", options);

    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.get());
    let engine = RoomEngine::new(key_policy, options);
    tokio::spawn(ChatServer::with_engine(cmd_rx, engine).run());

    info!("ChatServer actor started");

    let client_buffer = config.client_buffer.get();

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, client_buffer).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
