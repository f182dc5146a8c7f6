//! WebSocket Game Server
//!
//! Transport adapter in front of the session controller. The request path
//! picks the mode (`/ws`, `/ws/2v2`, `/ws/3d`); the query carries the
//! upstream-resolved `userId`, an optional display `name`, and an optional
//! `roomId` for invited matches.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};
use url::form_urlencoded;

use crate::config::ServerConfig;
use crate::error::MatchError;
use crate::game::mode::GameMode;
use crate::game::state::{PlayerId, RoomId};
use crate::network::connection::{Connection, Player, OUTBOUND_CAPACITY};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::session::controller::SessionController;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// What a client asked for when it connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Upstream-resolved id
    pub player_id: PlayerId,
    /// Display name (defaults to the id)
    pub name: String,
    /// Queue to join
    pub mode: GameMode,
    /// Invitation to take a seat in, instead of queueing
    pub room_id: Option<RoomId>,
}

/// Parse the handshake path and query string.
pub fn parse_request(path: &str, query: &str) -> Result<ConnectRequest, MatchError> {
    let mode = match path.trim_end_matches('/') {
        "" | "/ws" => GameMode::OneVsOne,
        "/ws/2v2" => GameMode::TwoVsTwo,
        "/ws/3d" => GameMode::ThreeD,
        other => return Err(MatchError::Validation(format!("unknown endpoint {other}"))),
    };

    let mut player_id = None;
    let mut name = None;
    let mut room_id = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match &*key {
            "userId" => player_id = Some(value.into_owned()),
            "name" => name = Some(value.into_owned()),
            "roomId" => room_id = Some(RoomId::from(value.into_owned())),
            _ => {}
        }
    }

    let player_id =
        player_id.ok_or_else(|| MatchError::Validation("missing userId".to_string()))?;

    Ok(ConnectRequest {
        name: name.unwrap_or_else(|| player_id.clone()),
        player_id: PlayerId::new(player_id),
        mode,
        room_id,
    })
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    controller: SessionController,
    connections: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, controller: SessionController) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            controller,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count() >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Signal the accept loop and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let controller = self.controller.clone();
        let connections = self.connections.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            serve_client(stream, addr, controller, shutdown_rx).await;
            connections.fetch_sub(1, Ordering::SeqCst);
            info!("Client {} cleaned up", addr);
        });
    }
}

async fn serve_client(
    stream: TcpStream,
    addr: SocketAddr,
    controller: SessionController,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut target: Option<(String, String)> = None;
    let capture = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let uri = request.uri();
        target = Some((uri.path().to_string(), uri.query().unwrap_or_default().to_string()));
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, capture).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (connection, mut outbound) = Connection::channel(OUTBOUND_CAPACITY);

    // Spawn message sender task
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let (path, query) = target.unwrap_or_default();
    let request = match parse_request(&path, &query) {
        Ok(r) => r,
        Err(e) => {
            debug!("Rejecting {}: {}", addr, e);
            let _ = connection.send(ServerMessage::error(&e));
            drop(connection);
            let _ = sender_task.await;
            return;
        }
    };

    let player = Player::new(request.player_id.clone(), request.name.clone(), connection);
    let player_id = player.id.clone();
    player.notify(ServerMessage::Connected { player_id: player_id.clone() });

    let entered = match &request.room_id {
        Some(room_id) => controller.join_invite(player.clone(), room_id).await,
        None => controller.enqueue(player.clone(), request.mode).await.map(|_| ()),
    };
    if let Err(e) = entered {
        info!(player = %player_id, %addr, error = %e, "entry rejected");
        player.notify(ServerMessage::error(&e));
        drop(player);
        let _ = sender_task.await;
        return;
    }

    // Handle incoming messages
    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match ClientMessage::from_json(&text) {
                            Ok(client_msg) => {
                                handle_client_message(&controller, &player, client_msg).await;
                            }
                            Err(e) => {
                                debug!("Invalid message from {}: {}", addr, e);
                                player.notify(ServerMessage::error(&MatchError::Validation(
                                    "Invalid message format".to_string(),
                                )));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", addr, e);
                        break;
                    }
                    _ => {}
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    // Only the socket the player entered with may release them.
    controller.handle_connection_closed(&player).await;
    sender_task.abort();
}

async fn handle_client_message(controller: &SessionController, player: &Player, msg: ClientMessage) {
    if let Some(command) = msg.paddle_command() {
        match controller.handle_input(&player.id, command).await {
            Ok(()) => {}
            // Held keys during the countdown are expected.
            Err(MatchError::Phase(e)) => debug!(player = %player.id, error = %e, "input ignored"),
            Err(e) => player.notify(ServerMessage::error(&e)),
        }
        return;
    }

    match msg {
        ClientMessage::CancelQueue => {
            let left = controller.cancel_queue(&player.id).await;
            debug!(player = %player.id, left, "cancel queue");
        }
        ClientMessage::Ping { timestamp } => {
            player.notify(ServerMessage::Pong { timestamp });
        }
        ClientMessage::PaddleMove { .. } | ClientMessage::PaddleMove3d { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    use crate::config::SessionConfig;
    use crate::session::{MatchmakingQueues, RoomRegistry};
    use crate::sink::MemoryResultSink;

    #[test]
    fn test_parse_request_modes() {
        let req = parse_request("/ws", "userId=u1&name=Alice").unwrap();
        assert_eq!(req.player_id, PlayerId::from("u1"));
        assert_eq!(req.name, "Alice");
        assert_eq!(req.mode, GameMode::OneVsOne);
        assert!(req.room_id.is_none());

        assert_eq!(parse_request("/ws/2v2", "userId=u").unwrap().mode, GameMode::TwoVsTwo);
        assert_eq!(parse_request("/ws/3d/", "userId=u").unwrap().mode, GameMode::ThreeD);
    }

    #[test]
    fn test_parse_request_defaults_and_invites() {
        let req = parse_request("/ws", "userId=u2&roomId=m1&extra=1").unwrap();
        assert_eq!(req.name, "u2");
        assert_eq!(req.room_id, Some(RoomId::from("m1")));
    }

    #[test]
    fn test_parse_request_decodes_values() {
        let req = parse_request("/ws", "userId=a%20b&name=J%C3%BCrgen+K&roomId=t%2F1").unwrap();
        assert_eq!(req.player_id, PlayerId::from("a b"));
        assert_eq!(req.name, "Jürgen K");
        assert_eq!(req.room_id, Some(RoomId::from("t/1")));
    }

    #[test]
    fn test_parse_request_rejects() {
        assert!(matches!(parse_request("/ws", "name=x"), Err(MatchError::Validation(_))));
        assert!(matches!(parse_request("/ws", "userId="), Err(MatchError::Validation(_))));
        assert!(matches!(parse_request("/ws/4v4", "userId=u"), Err(MatchError::Validation(_))));
    }

    fn controller() -> SessionController {
        SessionController::new(
            MatchmakingQueues::new(),
            Arc::new(RoomRegistry::new()),
            Arc::new(MemoryResultSink::new()),
            None,
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(ServerConfig::default(), controller());
        assert_eq!(server.connection_count(), 0);
        server.shutdown();
    }

    async fn next_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for message")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_pairing_and_disconnect_over_websocket() {
        let controller = controller();
        let server = Arc::new(GameServer::new(ServerConfig::default(), controller.clone()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let running = server.clone();
        let handle = tokio::spawn(async move { running.serve(listener).await });

        let (mut a, _) = connect_async(format!("ws://{addr}/ws?userId=a")).await.unwrap();
        assert!(matches!(next_message(&mut a).await, ServerMessage::Connected { .. }));
        assert!(matches!(next_message(&mut a).await, ServerMessage::Waiting { position: 1, .. }));

        let (mut b, _) = connect_async(format!("ws://{addr}/ws?userId=b&name=Bee")).await.unwrap();
        assert!(matches!(next_message(&mut b).await, ServerMessage::Connected { .. }));
        assert!(matches!(next_message(&mut b).await, ServerMessage::Waiting { .. }));
        match next_message(&mut b).await {
            ServerMessage::MatchFound { your_slot, players, .. } => {
                assert_eq!(your_slot, 1);
                assert_eq!(players[1].name, "Bee");
            }
            other => panic!("expected matchFound, got {other:?}"),
        }

        a.send(Message::Text(r#"{"type":"ping","timestamp":42}"#.into())).await.unwrap();
        loop {
            if let ServerMessage::Pong { timestamp } = next_message(&mut a).await {
                assert_eq!(timestamp, 42);
                break;
            }
        }

        drop(a);
        loop {
            if let ServerMessage::OpponentDisconnected { .. } = next_message(&mut b).await {
                break;
            }
        }
        // Eviction follows the notification.
        for _ in 0..50 {
            if controller.rooms().is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(controller.rooms().is_empty().await);

        server.shutdown();
        let _ = timeout(Duration::from_secs(5), handle).await;
    }

    async fn wait_for_connections(server: &GameServer, count: usize) {
        for _ in 0..100 {
            if server.connection_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} connections, have {}", server.connection_count());
    }

    #[tokio::test]
    async fn test_stale_socket_close_keeps_new_queue_entry() {
        use crate::session::controller::Eligibility;

        let controller = controller();
        let server = Arc::new(GameServer::new(ServerConfig::default(), controller.clone()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let running = server.clone();
        tokio::spawn(async move { running.serve(listener).await });

        // First match: A on socket 1, B leaves, A wins by forfeit.
        let (mut first, _) = connect_async(format!("ws://{addr}/ws?userId=a")).await.unwrap();
        assert!(matches!(next_message(&mut first).await, ServerMessage::Connected { .. }));
        assert!(matches!(next_message(&mut first).await, ServerMessage::Waiting { .. }));
        let (b, _) = connect_async(format!("ws://{addr}/ws?userId=b")).await.unwrap();
        drop(b);
        loop {
            if let ServerMessage::OpponentDisconnected { .. } = next_message(&mut first).await {
                break;
            }
        }
        for _ in 0..50 {
            if controller.rooms().is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(controller.rooms().is_empty().await);

        // A queues again on socket 2 while socket 1 is still open.
        let (mut second, _) = connect_async(format!("ws://{addr}/ws?userId=a")).await.unwrap();
        assert!(matches!(next_message(&mut second).await, ServerMessage::Connected { .. }));
        assert!(matches!(next_message(&mut second).await, ServerMessage::Waiting { position: 1, .. }));
        wait_for_connections(&server, 2).await;

        drop(first);
        wait_for_connections(&server, 1).await;

        assert_eq!(
            controller.can_join(&"a".into()).await,
            Eligibility::Queued(GameMode::OneVsOne)
        );

        drop(second);
        wait_for_connections(&server, 0).await;
        assert_eq!(controller.can_join(&"a".into()).await, Eligibility::Free);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_connection_gets_error() {
        let controller = controller();
        let server = Arc::new(GameServer::new(ServerConfig::default(), controller));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let running = server.clone();
        tokio::spawn(async move { running.serve(listener).await });

        let (mut first, _) = connect_async(format!("ws://{addr}/ws/3d?userId=dup")).await.unwrap();
        assert!(matches!(next_message(&mut first).await, ServerMessage::Connected { .. }));
        assert!(matches!(next_message(&mut first).await, ServerMessage::Waiting { .. }));

        let (mut second, _) = connect_async(format!("ws://{addr}/ws?userId=dup")).await.unwrap();
        assert!(matches!(next_message(&mut second).await, ServerMessage::Connected { .. }));
        match next_message(&mut second).await {
            ServerMessage::Error { code, .. } => assert_eq!(code, "duplicate_entry"),
            other => panic!("expected error, got {other:?}"),
        }

        server.shutdown();
    }
}
