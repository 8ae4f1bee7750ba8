//! ChatServer Actor implementation
//!
//! The session gateway. A single actor owns the room engine and the
//! outbound channel of every connection; commands from connection
//! handlers arrive over an mpsc channel and are applied one at a time,
//! which serializes every membership change and broadcast.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::engine::{Outbound, RoomEngine};
use crate::error::EngineError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, RoomName, Visibility};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Connection closed
    Disconnect {
        connection_id: ConnectionId,
    },
    /// Join a room
    Join {
        connection_id: ConnectionId,
        room: String,
        username: String,
        private: bool,
        key: Option<String>,
    },
    /// Leave a room
    Leave {
        connection_id: ConnectionId,
        room: String,
        username: String,
        private: Option<bool>,
    },
    /// Broadcast a chat line
    SendMessage {
        connection_id: ConnectionId,
        room: String,
        username: String,
        msg: String,
    },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Outbound channels: ConnectionId -> Client
    clients: HashMap<ConnectionId, Client>,
    /// All chat state
    engine: RoomEngine,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with default engine settings
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self::with_engine(receiver, RoomEngine::default())
    }

    /// Create a new ChatServer backed by the given engine
    pub fn with_engine(receiver: mpsc::Receiver<ServerCommand>, engine: RoomEngine) -> Self {
        Self {
            clients: HashMap::new(),
            engine,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                connection_id,
                sender,
            } => self.handle_connect(connection_id, sender),
            ServerCommand::Disconnect { connection_id } => self.handle_disconnect(connection_id),
            ServerCommand::Join {
                connection_id,
                room,
                username,
                private,
                key,
            } => self.handle_join(connection_id, room, username, private, key),
            ServerCommand::Leave {
                connection_id,
                room,
                username,
                private,
            } => self.handle_leave(connection_id, room, username, private),
            ServerCommand::SendMessage {
                connection_id,
                room,
                username,
                msg,
            } => self.handle_send(connection_id, room, username, msg),
        }
    }

    fn handle_connect(&mut self, connection_id: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        if let Err(e) = self.engine.connect(connection_id) {
            warn!("Rejected connect: {}", e);
            return;
        }

        info!("Connection {} registered", connection_id);
        self.clients
            .insert(connection_id, Client::new(connection_id, sender));
        debug!(
            "Total connections: {}, Total rooms: {}",
            self.engine.connection_count(),
            self.engine.room_count()
        );
    }

    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        match self.engine.disconnect(connection_id) {
            Ok(outbound) => {
                info!("Connection {} unregistered", connection_id);
                self.deliver(outbound);
            }
            Err(e) => debug!("Disconnect ignored: {}", e),
        }

        self.clients.remove(&connection_id);
        debug!(
            "Total connections: {}, Total rooms: {}",
            self.engine.connection_count(),
            self.engine.room_count()
        );
    }

    fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        room: String,
        username: String,
        private: bool,
        key: Option<String>,
    ) {
        let room = RoomName::from(room);
        let visibility = Visibility::from_private_flag(private);

        match self
            .engine
            .join(connection_id, &room, &username, visibility, key.as_deref())
        {
            Ok(outbound) => {
                info!(
                    "Connection {} joined {:?} room {} as '{}'",
                    connection_id, visibility, room, username
                );
                self.deliver(outbound);
            }
            Err(e) => self.reply_error(connection_id, e),
        }
    }

    fn handle_leave(
        &mut self,
        connection_id: ConnectionId,
        room: String,
        username: String,
        private: Option<bool>,
    ) {
        let room = RoomName::from(room);
        let visibility = private
            .map(Visibility::from_private_flag)
            .or_else(|| self.engine.membership_visibility(connection_id, &room))
            .unwrap_or_default();

        match self.engine.leave(connection_id, &room, &username, visibility) {
            Ok(outbound) => {
                info!("Connection {} left room {}", connection_id, room);
                self.deliver(outbound);
            }
            Err(e) => self.reply_error(connection_id, e),
        }
    }

    fn handle_send(&mut self, connection_id: ConnectionId, room: String, username: String, msg: String) {
        let room = RoomName::from(room);

        match self.engine.send(connection_id, &room, &username, &msg) {
            Ok(outbound) => {
                debug!(
                    "Connection {} sent to {} ({} recipients)",
                    connection_id,
                    room,
                    outbound.len()
                );
                self.deliver(outbound);
            }
            Err(e) => self.reply_error(connection_id, e),
        }
    }

    /// Hand engine output to each target's write task
    fn deliver(&self, outbound: Vec<Outbound>) {
        for Outbound { target, message } in outbound {
            let Some(client) = self.clients.get(&target) else {
                debug!("No channel for {}, dropping message", target);
                continue;
            };
            if let Err(e) = client.try_send(message) {
                warn!("Dropped message for {}: {}", client.id, e);
            }
        }
    }

    /// Send a request error back to the requester only
    fn reply_error(&self, connection_id: ConnectionId, err: EngineError) {
        info!("Request from {} failed: {}", connection_id, err);

        if let Some(client) = self.clients.get(&connection_id) {
            if let Err(e) = client.try_send(err.into()) {
                warn!("Dropped error for {}: {}", connection_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::directory::{KeyPolicy, DEFAULT_SHARED_KEY};
    use crate::engine::EngineOptions;
    use crate::message::{ErrorCode, MessageKind};

    struct TestClient {
        id: ConnectionId,
        rx: mpsc::Receiver<ServerMessage>,
    }

    impl TestClient {
        async fn next(&mut self) -> ServerMessage {
            tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("timed out waiting for message")
                .expect("channel closed")
        }

        async fn next_text(&mut self) -> String {
            match self.next().await {
                ServerMessage::Message { msg, .. } => msg,
                other => panic!("expected message, got {:?}", other),
            }
        }

        fn assert_idle(&mut self) {
            assert!(self.rx.try_recv().is_err(), "unexpected message queued");
        }
    }

    fn spawn_server(engine: RoomEngine) -> mpsc::Sender<ServerCommand> {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(ChatServer::with_engine(cmd_rx, engine).run());
        cmd_tx
    }

    async fn connect(cmd_tx: &mpsc::Sender<ServerCommand>) -> TestClient {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(32);
        cmd_tx
            .send(ServerCommand::Connect {
                connection_id: id,
                sender: tx,
            })
            .await
            .unwrap();
        TestClient { id, rx }
    }

    async fn join(
        cmd_tx: &mpsc::Sender<ServerCommand>,
        client: &TestClient,
        room: &str,
        username: &str,
        key: Option<&str>,
    ) {
        cmd_tx
            .send(ServerCommand::Join {
                connection_id: client.id,
                room: room.to_string(),
                username: username.to_string(),
                private: key.is_some(),
                key: key.map(str::to_string),
            })
            .await
            .unwrap();
    }

    async fn say(cmd_tx: &mpsc::Sender<ServerCommand>, client: &TestClient, room: &str, username: &str, msg: &str) {
        cmd_tx
            .send(ServerCommand::SendMessage {
                connection_id: client.id,
                room: room.to_string(),
                username: username.to_string(),
                msg: msg.to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lobby_scenario() {
        let cmd_tx = spawn_server(RoomEngine::default());
        let mut a = connect(&cmd_tx).await;
        let mut b = connect(&cmd_tx).await;

        join(&cmd_tx, &a, "lobby", "alice", None).await;
        assert_eq!(
            a.next().await,
            ServerMessage::Message {
                kind: MessageKind::Joined,
                msg: "alice has joined lobby".to_string(),
            }
        );

        join(&cmd_tx, &b, "lobby", "bob", None).await;
        assert_eq!(a.next_text().await, "bob has joined lobby");
        assert_eq!(b.next_text().await, "bob has joined lobby");

        say(&cmd_tx, &a, "lobby", "alice", "hi").await;
        assert_eq!(a.next_text().await, "alice: hi");
        assert_eq!(b.next_text().await, "alice: hi");

        cmd_tx
            .send(ServerCommand::Leave {
                connection_id: b.id,
                room: "lobby".to_string(),
                username: "bob".to_string(),
                private: None,
            })
            .await
            .unwrap();
        assert_eq!(a.next_text().await, "bob has left lobby");
        b.assert_idle();
    }

    #[tokio::test]
    async fn test_private_room_wrong_key() {
        let engine = RoomEngine::new(
            KeyPolicy::Shared(DEFAULT_SHARED_KEY.to_string()),
            EngineOptions::default(),
        );
        let cmd_tx = spawn_server(engine);
        let mut a = connect(&cmd_tx).await;
        let mut b = connect(&cmd_tx).await;

        join(&cmd_tx, &a, "secret", "alice", Some("letmein")).await;
        assert_eq!(a.next_text().await, "alice has joined secret");

        join(&cmd_tx, &b, "secret", "bob", Some("wrong")).await;
        assert_eq!(
            b.next().await,
            ServerMessage::Error {
                code: ErrorCode::InvalidRoomKey,
                msg: "Invalid room key.".to_string(),
            }
        );

        // Bob never joined, so he is not a broadcast target
        say(&cmd_tx, &a, "secret", "alice", "anyone?").await;
        assert_eq!(a.next_text().await, "alice: anyone?");
        b.assert_idle();
    }

    #[tokio::test]
    async fn test_disconnect_cascade() {
        let cmd_tx = spawn_server(RoomEngine::default());
        let mut a = connect(&cmd_tx).await;
        let mut b = connect(&cmd_tx).await;

        join(&cmd_tx, &a, "r1", "alice", None).await;
        join(&cmd_tx, &a, "r2", "alice", None).await;
        join(&cmd_tx, &b, "r1", "bob", None).await;
        join(&cmd_tx, &b, "r2", "bob", None).await;
        assert_eq!(a.next_text().await, "alice has joined r1");
        assert_eq!(a.next_text().await, "alice has joined r2");
        assert_eq!(a.next_text().await, "bob has joined r1");
        assert_eq!(a.next_text().await, "bob has joined r2");
        for _ in 0..2 {
            b.next().await;
        }

        cmd_tx
            .send(ServerCommand::Disconnect { connection_id: a.id })
            .await
            .unwrap();
        assert_eq!(b.next_text().await, "alice has left r1");
        assert_eq!(b.next_text().await, "alice has left r2");

        say(&cmd_tx, &b, "r1", "bob", "gone?").await;
        assert_eq!(b.next_text().await, "bob: gone?");

        // The actor dropped a's sender on disconnect
        assert_eq!(a.rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_strict_send_reports_not_in_room() {
        let engine = RoomEngine::new(
            KeyPolicy::PerRoom,
            EngineOptions {
                strict_send: true,
                ..EngineOptions::default()
            },
        );
        let cmd_tx = spawn_server(engine);
        let mut a = connect(&cmd_tx).await;

        say(&cmd_tx, &a, "lobby", "alice", "hi").await;
        match a.next().await {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotInRoom),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_client_does_not_block_others() {
        let cmd_tx = spawn_server(RoomEngine::default());
        let mut a = connect(&cmd_tx).await;

        // A client whose channel holds a single message and is never drained
        let slow_id = ConnectionId::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        cmd_tx
            .send(ServerCommand::Connect {
                connection_id: slow_id,
                sender: slow_tx,
            })
            .await
            .unwrap();
        let slow = TestClient {
            id: slow_id,
            rx: mpsc::channel(1).1,
        };

        join(&cmd_tx, &slow, "lobby", "slow", None).await;
        join(&cmd_tx, &a, "lobby", "alice", None).await;
        assert_eq!(a.next_text().await, "alice has joined lobby");

        for i in 0..5 {
            say(&cmd_tx, &a, "lobby", "alice", &i.to_string()).await;
        }
        for i in 0..5 {
            assert_eq!(a.next_text().await, format!("alice: {}", i));
        }
    }

    #[tokio::test]
    async fn test_leave_uses_joined_visibility() {
        let (_cmd_tx, cmd_rx) = mpsc::channel(1);
        let mut server = ChatServer::new(cmd_rx);
        let r1 = RoomName::from("r1");

        let mut clients = Vec::new();
        for username in ["alice", "bob"] {
            let connection_id = ConnectionId::new();
            let (tx, rx) = mpsc::channel(32);
            server.handle_command(ServerCommand::Connect {
                connection_id,
                sender: tx,
            });
            server.handle_command(ServerCommand::Join {
                connection_id,
                room: "r1".to_string(),
                username: username.to_string(),
                private: true,
                key: Some("k1".to_string()),
            });
            clients.push(TestClient {
                id: connection_id,
                rx,
            });
        }
        let (mut alice, mut bob) = {
            let bob = clients.pop().unwrap();
            (clients.pop().unwrap(), bob)
        };
        assert_eq!(alice.next_text().await, "alice has joined r1");
        assert_eq!(alice.next_text().await, "bob has joined r1");
        assert_eq!(bob.next_text().await, "bob has joined r1");

        server.handle_command(ServerCommand::Leave {
            connection_id: bob.id,
            room: "r1".to_string(),
            username: "bob".to_string(),
            private: None,
        });

        assert_eq!(alice.next_text().await, "bob has left r1");
        bob.assert_idle();

        let members = server.engine.private_members(&r1).unwrap();
        assert!(!members.contains("bob"));
        assert!(members.contains("alice"));
    }
}
