//! Integration tests for the session server
//!
//! These tests validate cross-component interactions: sessions, connection
//! handling and tick drivers working together, both over in-memory endpoints
//! and over real WebSocket connections.

use futures_util::{SinkExt, StreamExt};
use server::client_manager::{ConnectionManager, Endpoint, EndpointReceiver, Outbound};
use server::config::ServerConfig;
use server::network::NetworkServer;
use server::session::SessionRegistry;
use server::SessionError;
use shared::{
    ClientMessage, Direction, GameStatus, ServerMessage, ServerMessageType, Side,
    CLOSE_SESSION_ENDED, CLOSE_SESSION_FULL,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

fn fast_config() -> ServerConfig {
    ServerConfig {
        tick_rate: 10,
        finished_grace: Duration::from_secs(1),
        idle_timeout: Duration::from_secs(30),
        ..ServerConfig::default()
    }
}

fn drain(rx: &mut EndpointReceiver) -> Vec<Outbound> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

fn messages(frames: &[Outbound]) -> Vec<ServerMessage> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            Outbound::Text(text) => ServerMessage::from_json(text).ok(),
            Outbound::Close { .. } => None,
        })
        .collect()
}

/// SESSION FLOW TESTS (in-memory endpoints)
mod session_flow_tests {
    use super::*;

    /// Two players join, one starts the game and moves its paddle; both see
    /// identical snapshots with the left paddle moving up.
    #[tokio::test(start_paused = true)]
    async fn two_players_share_identical_snapshots() {
        let registry = SessionRegistry::new(fast_config());
        let manager = ConnectionManager::new(Arc::clone(&registry));
        let (e1, mut rx1) = Endpoint::channel(64);
        let (e2, mut rx2) = Endpoint::channel(64);

        let c1 = assert_ok!(manager.connect(Some("s1"), e1).await);
        let c2 = assert_ok!(manager.connect(Some("s1"), e2).await);
        assert_eq!(c1.side(), Side::A);
        assert_eq!(c2.side(), Side::B);

        assert_ok!(c1.handle_text(r#"{"type":"start"}"#).await);
        assert_ok!(c1.handle_text(r#"{"type":"paddle","direction":"up"}"#).await);

        sleep(Duration::from_millis(350)).await;

        let frames1 = drain(&mut rx1);
        let frames2 = drain(&mut rx2);
        let messages1 = messages(&frames1);
        let messages2 = messages(&frames2);

        assert_eq!(messages1[0].kind, ServerMessageType::Connected);
        assert_eq!(messages1[0].message.as_deref(), Some("Player A"));
        assert_eq!(messages2[0].kind, ServerMessageType::Connected);
        assert_eq!(messages2[0].message.as_deref(), Some("Player B"));

        // After the acknowledgements both players receive the same stream
        assert_eq!(frames1[1..], frames2[1..]);
        assert_eq!(messages1[1].message.as_deref(), Some("Game started"));

        let last = messages1.last().unwrap().data.clone().unwrap();
        assert_eq!(last.status, GameStatus::Playing);
        assert!(last.paddles.left.y < 250.0);
        assert_eq!(last.paddles.right.y, 250.0);

        registry.shutdown().await;
    }

    /// A third endpoint is refused while the first two stay bound.
    #[tokio::test]
    async fn third_player_is_rejected() {
        let registry = SessionRegistry::new(fast_config());
        let manager = ConnectionManager::new(Arc::clone(&registry));
        let (e1, _rx1) = Endpoint::channel(64);
        let (e2, _rx2) = Endpoint::channel(64);
        let (e3, mut rx3) = Endpoint::channel(64);

        let _c1 = assert_ok!(manager.connect(Some("crowded"), e1).await);
        let _c2 = assert_ok!(manager.connect(Some("crowded"), e2).await);
        let err = assert_err!(manager.connect(Some("crowded"), e3).await);
        assert!(matches!(err, SessionError::SessionFull(_)));
        assert_eq!(
            drain(&mut rx3),
            vec![Outbound::Close {
                code: CLOSE_SESSION_FULL,
                reason: "Session full".to_string()
            }]
        );

        let listing = registry.list().await;
        assert_eq!(listing.endpoint_count(), 2);
        registry.shutdown().await;
    }

    /// Many concurrent first references create exactly one session.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_references_create_one_session() {
        let registry = SessionRegistry::new(fast_config());
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create("race").await })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }

        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(registry.len().await, 1);
        registry.shutdown().await;
    }

    /// A stopped game is announced once and reaped after the grace period.
    #[tokio::test(start_paused = true)]
    async fn stopped_session_is_reaped_after_grace() {
        let registry = SessionRegistry::new(fast_config());
        let manager = ConnectionManager::new(Arc::clone(&registry));
        let (e1, mut rx1) = Endpoint::channel(256);
        let c1 = assert_ok!(manager.connect(Some("reaped"), e1).await);

        assert_ok!(c1.handle_message(ClientMessage::Stop).await);
        sleep(Duration::from_millis(500)).await;
        assert!(registry.get("reaped").await.is_some());

        sleep(Duration::from_secs(1)).await;
        assert!(registry.get("reaped").await.is_none());

        let frames = drain(&mut rx1);
        let game_overs = messages(&frames)
            .into_iter()
            .filter(|m| m.kind == ServerMessageType::GameOver)
            .count();
        assert_eq!(game_overs, 1);
        assert_eq!(
            frames.last(),
            Some(&Outbound::Close {
                code: CLOSE_SESSION_ENDED,
                reason: "Session ended".to_string()
            })
        );

        // Late input on the dead connection is rejected
        let err = assert_err!(
            c1.handle_message(ClientMessage::Paddle {
                paddle: None,
                direction: Direction::Up
            })
            .await
        );
        assert!(matches!(err, SessionError::GameFinished));
    }

    /// Removing a session invalidates it for new binds.
    #[tokio::test]
    async fn removed_session_rejects_binds() {
        let registry = SessionRegistry::new(fast_config());
        let manager = ConnectionManager::new(Arc::clone(&registry));
        let session = registry.get_or_create("gone").await;

        assert_ok!(registry.remove("gone").await);
        let (endpoint, _rx) = Endpoint::channel(8);
        let err = assert_err!(manager.bind(session, endpoint).await);
        assert!(matches!(err, SessionError::NotFound(_)));
        assert!(matches!(
            registry.remove("gone").await,
            Err(SessionError::NotFound(_))
        ));
    }

    /// A client that stopped reading still gets the close frame on removal,
    /// after whatever was already queued for it.
    #[tokio::test(start_paused = true)]
    async fn removal_reaches_client_with_full_queue() {
        let registry = SessionRegistry::new(fast_config());
        let manager = ConnectionManager::new(Arc::clone(&registry));
        let (endpoint, mut rx) = Endpoint::channel(1);

        // The acknowledgement fills the queue and every tick after it is dropped
        let connection = assert_ok!(manager.connect(Some("stalled"), endpoint).await);
        sleep(Duration::from_millis(350)).await;

        assert_ok!(registry.remove("stalled").await);

        match timeout(Duration::from_secs(1), rx.recv()).await.unwrap() {
            Some(Outbound::Text(text)) => {
                let ack = ServerMessage::from_json(&text).unwrap();
                assert_eq!(ack.kind, ServerMessageType::Connected);
            }
            other => panic!("Expected the queued acknowledgement, got {:?}", other),
        }
        assert_eq!(
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap(),
            Some(Outbound::Close {
                code: CLOSE_SESSION_ENDED,
                reason: "Session ended".to_string()
            })
        );
        assert_eq!(rx.recv().await, None);

        // The connection still holds its endpoint; unbinding it is a no-op now
        connection.close().await;
    }

    /// An id freed by removal can be used again, and the new session is
    /// independent of the old one's driver.
    #[tokio::test(start_paused = true)]
    async fn reused_id_survives_old_session_teardown() {
        let registry = SessionRegistry::new(ServerConfig {
            finished_grace: Duration::ZERO,
            ..fast_config()
        });
        let manager = ConnectionManager::new(Arc::clone(&registry));
        let (e1, _rx1) = Endpoint::channel(64);
        let old = assert_ok!(manager.connect(Some("again"), e1).await);
        assert_ok!(old.handle_message(ClientMessage::Stop).await);

        assert_ok!(registry.remove("again").await);
        let (e2, mut rx2) = Endpoint::channel(64);
        let fresh = assert_ok!(manager.connect(Some("again"), e2).await);
        assert!(!Arc::ptr_eq(old.session(), fresh.session()));

        sleep(Duration::from_millis(500)).await;
        let current = registry.get("again").await.unwrap();
        assert!(Arc::ptr_eq(&current, fresh.session()));
        assert_eq!(current.status().await, GameStatus::Waiting);
        assert!(drain(&mut rx2)
            .iter()
            .all(|frame| matches!(frame, Outbound::Text(_))));
        registry.shutdown().await;
    }
}

/// WEBSOCKET TESTS
mod websocket_tests {
    use super::*;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server() -> (Arc<SessionRegistry>, String) {
        let registry = SessionRegistry::new(ServerConfig {
            tick_rate: 30,
            ..ServerConfig::default()
        });
        let server = NetworkServer::bind("127.0.0.1:0", Arc::clone(&registry))
            .await
            .unwrap();
        let url = format!("ws://{}", server.local_addr().unwrap());
        tokio::spawn(async move { server.run().await });
        (registry, url)
    }

    async fn connect(url: &str, session: &str) -> Client {
        let (ws, _) = connect_async(format!("{}/game/{}", url, session))
            .await
            .unwrap();
        ws
    }

    async fn send(ws: &mut Client, text: &str) {
        ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    /// Reads until a message matching `pred` arrives.
    async fn wait_for<F>(ws: &mut Client, pred: F) -> ServerMessage
    where
        F: Fn(&ServerMessage) -> bool,
    {
        timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let message = ServerMessage::from_json(&text).unwrap();
                        if pred(&message) {
                            return message;
                        }
                    }
                    Some(Ok(_)) => continue,
                    other => panic!("Connection ended early: {:?}", other),
                }
            }
        })
        .await
        .expect("Timed out waiting for message")
    }

    async fn wait_for_close(ws: &mut Client) -> u16 {
        timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
                    Some(Ok(_)) => continue,
                    other => panic!("Expected a close frame, got {:?}", other),
                }
            }
        })
        .await
        .expect("Timed out waiting for close")
    }

    #[tokio::test]
    async fn players_play_over_websocket() {
        let (registry, url) = start_server().await;
        let mut a = connect(&url, "ws-match").await;
        let ack_a = wait_for(&mut a, |m| m.kind == ServerMessageType::Connected).await;
        let mut b = connect(&url, "ws-match").await;
        let ack_b = wait_for(&mut b, |m| m.kind == ServerMessageType::Connected).await;
        assert_eq!(ack_a.message.as_deref(), Some("Player A"));
        assert_eq!(ack_b.message.as_deref(), Some("Player B"));
        assert_eq!(ack_b.session_id.as_deref(), Some("ws-match"));

        send(&mut a, r#"{"type":"start"}"#).await;
        for ws in [&mut a, &mut b] {
            let started = wait_for(ws, |m| m.message.as_deref() == Some("Game started")).await;
            assert_eq!(started.data.unwrap().status, GameStatus::Playing);
        }

        send(&mut b, r#"{"type":"paddle","direction":"down"}"#).await;
        let moved = wait_for(&mut a, |m| {
            m.data
                .as_ref()
                .map_or(false, |state| state.paddles.right.y > 250.0)
        })
        .await;
        assert_eq!(moved.kind, ServerMessageType::State);

        send(&mut a, r#"{"type":"ping"}"#).await;
        wait_for(&mut a, |m| m.kind == ServerMessageType::Pong).await;

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn third_websocket_client_is_closed() {
        let (registry, url) = start_server().await;
        let mut a = connect(&url, "ws-full").await;
        wait_for(&mut a, |m| m.kind == ServerMessageType::Connected).await;
        let mut b = connect(&url, "ws-full").await;
        wait_for(&mut b, |m| m.kind == ServerMessageType::Connected).await;

        let mut c = connect(&url, "ws-full").await;
        assert_eq!(wait_for_close(&mut c).await, CLOSE_SESSION_FULL);

        let session = registry.get("ws-full").await.unwrap();
        assert_eq!(session.player_count().await, 2);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_message_keeps_connection_open() {
        let (registry, url) = start_server().await;
        let mut a = connect(&url, "ws-bad").await;
        wait_for(&mut a, |m| m.kind == ServerMessageType::Connected).await;

        send(&mut a, "this is not json").await;
        let error = wait_for(&mut a, |m| m.kind == ServerMessageType::Error).await;
        assert_eq!(error.message.as_deref(), Some("Invalid message format"));

        send(&mut a, r#"{"type":"ping"}"#).await;
        wait_for(&mut a, |m| m.kind == ServerMessageType::Pong).await;
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn bare_path_creates_fresh_session() {
        let (registry, url) = start_server().await;
        let (mut ws, _) = connect_async(format!("{}/", url)).await.unwrap();
        let ack = wait_for(&mut ws, |m| m.kind == ServerMessageType::Connected).await;

        let id = ack.session_id.unwrap();
        assert_eq!(id.len(), 36);
        assert!(registry.get(&id).await.is_some());
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn removal_closes_connected_clients() {
        let (registry, url) = start_server().await;
        let mut a = connect(&url, "ws-removed").await;
        wait_for(&mut a, |m| m.kind == ServerMessageType::Connected).await;

        registry.remove("ws-removed").await.unwrap();
        assert_eq!(wait_for_close(&mut a).await, CLOSE_SESSION_ENDED);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn disconnect_mid_match_pauses_game() {
        let (registry, url) = start_server().await;
        let mut a = connect(&url, "ws-pause").await;
        wait_for(&mut a, |m| m.kind == ServerMessageType::Connected).await;
        let mut b = connect(&url, "ws-pause").await;
        wait_for(&mut b, |m| m.kind == ServerMessageType::Connected).await;

        send(&mut a, r#"{"type":"start"}"#).await;
        wait_for(&mut b, |m| m.message.as_deref() == Some("Game started")).await;

        b.close(None).await.unwrap();
        drop(b);

        let paused = wait_for(&mut a, |m| {
            m.data
                .as_ref()
                .map_or(false, |state| state.status == GameStatus::Paused)
        })
        .await;
        assert_eq!(paused.kind, ServerMessageType::State);
        registry.shutdown().await;
    }
}
