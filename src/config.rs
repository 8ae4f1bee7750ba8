//! Server configuration
//!
//! Command line arguments, each with a `CHAT_*` environment variable
//! fallback, parsed with clap.

use std::num::NonZeroUsize;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::directory::KeyPolicy;
use crate::engine::EngineOptions;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Log filter used when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "chat_room_server=info";

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "chat_room_server")]
#[command(about = "Multi-room WebSocket chat server", long_about = None)]
pub struct ServerConfig {
    /// Address to bind the TCP listener to
    #[arg(env = "CHAT_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Capacity of the actor's command channel
    #[arg(long, env = "CHAT_COMMAND_BUFFER", default_value = "256")]
    pub command_buffer: NonZeroUsize,

    /// Capacity of each connection's outbound channel
    #[arg(long, env = "CHAT_CLIENT_BUFFER", default_value = "32")]
    pub client_buffer: NonZeroUsize,

    /// One key for every private room; unset lets the first joiner pick it
    #[arg(long, env = "CHAT_SHARED_KEY")]
    pub shared_key: Option<String>,

    /// Reject messages from connections that have not joined the room
    #[arg(
        long,
        env = "CHAT_STRICT_SEND",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub strict_send: bool,

    /// Skip the leave notice for rooms that were never joined
    #[arg(
        long,
        env = "CHAT_STRICT_LEAVE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub strict_leave: bool,

    /// Delete rooms once their last member is gone
    #[arg(
        long,
        env = "CHAT_EVICT_EMPTY_ROOMS",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub evict_empty_rooms: bool,

    /// Fallback tracing filter
    #[arg(long, env = "CHAT_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl ServerConfig {
    /// How private room keys are checked
    pub fn key_policy(&self) -> KeyPolicy {
        match &self.shared_key {
            Some(secret) => KeyPolicy::Shared(secret.clone()),
            None => KeyPolicy::PerRoom,
        }
    }

    /// Room engine behavior switches
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            strict_send: self.strict_send,
            strict_leave: self.strict_leave,
            evict_empty_rooms: self.evict_empty_rooms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ServerConfig, clap::Error> {
        ServerConfig::try_parse_from(std::iter::once("chat_room_server").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.addr, "127.0.0.1:8080");
        assert_eq!(config.command_buffer.get(), 256);
        assert_eq!(config.client_buffer.get(), 32);
        assert_eq!(config.key_policy(), KeyPolicy::PerRoom);
        assert_eq!(config.engine_options(), EngineOptions::default());
        assert_eq!(config.log_filter, "chat_room_server=info");
    }

    #[test]
    fn test_positional_addr() {
        let config = parse(&["0.0.0.0:5001"]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:5001");
    }

    #[test]
    fn test_all_options() {
        let config = parse(&[
            "127.0.0.1:9000",
            "--command-buffer",
            "1024",
            "--client-buffer",
            "8",
            "--shared-key",
            "letmein",
            "--strict-send",
            "--strict-leave=yes",
            "--evict-empty-rooms=1",
            "--log-filter",
            "chat_room_server=debug",
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.command_buffer.get(), 1024);
        assert_eq!(config.client_buffer.get(), 8);
        assert_eq!(config.key_policy(), KeyPolicy::Shared("letmein".to_string()));
        assert_eq!(
            config.engine_options(),
            EngineOptions {
                strict_send: true,
                strict_leave: true,
                evict_empty_rooms: true,
            }
        );
        assert_eq!(config.log_filter, "chat_room_server=debug");
    }

    #[test]
    fn test_flag_can_be_turned_off() {
        let config = parse(&["--strict-send=false", "--evict-empty-rooms=off"]).unwrap();
        assert!(!config.strict_send);
        assert!(!config.evict_empty_rooms);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse(&["--client-buffer", "0"]).is_err());
        assert!(parse(&["--command-buffer", "lots"]).is_err());
        assert!(parse(&["--strict-send=maybe"]).is_err());
    }
}
