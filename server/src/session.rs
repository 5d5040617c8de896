//! Session registry: the owner of every running match.
//!
//! Each [`Session`] bundles one [`GameEngine`], the endpoints bound to it and
//! the handle of its tick driver. Sessions are created lazily on first
//! reference and destroyed only through [`SessionRegistry::remove`].

use crate::client_manager::PlayerSlots;
use crate::config::ServerConfig;
use crate::driver::{self, DriverHandle};
use crate::error::SessionError;
use crate::game::GameEngine;
use log::{debug, error, info, warn};
use serde::Serialize;
use shared::{GameStatus, ServerMessage, CLOSE_SESSION_ENDED};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One match and everything bound to it.
///
/// Lock order is `players` before `engine`. Binding and unbinding hold
/// `players` while they update the engine so that pause and resume always
/// see the current player count. Nothing takes `players` while holding
/// `engine`.
#[derive(Debug)]
pub struct Session {
    id: String,
    pub(crate) engine: RwLock<GameEngine>,
    pub(crate) players: RwLock<PlayerSlots>,
    driver: Mutex<Option<DriverHandle>>,
    closed: AtomicBool,
    game_over_sent: AtomicBool,
}

impl Session {
    fn new(id: &str, config: &ServerConfig) -> Self {
        Self {
            id: id.to_string(),
            engine: RwLock::new(GameEngine::new(id, config.game.clone())),
            players: RwLock::new(PlayerSlots::new()),
            driver: Mutex::new(None),
            closed: AtomicBool::new(false),
            game_over_sent: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the session has been removed from its registry.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Claims the single `gameOver` announcement. Only the first caller
    /// gets `true`.
    pub fn announce_game_over(&self) -> bool {
        !self.game_over_sent.swap(true, Ordering::AcqRel)
    }

    pub async fn status(&self) -> GameStatus {
        self.engine.read().await.status()
    }

    pub async fn player_count(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn summary(&self) -> SessionSummary {
        let status = self.status().await;
        let endpoint_count = self.player_count().await;
        SessionSummary {
            id: self.id.clone(),
            status,
            endpoint_count,
        }
    }

    /// Serializes once and queues the text on every bound endpoint.
    /// Returns how many endpoints accepted it.
    pub async fn broadcast(&self, message: &ServerMessage) -> usize {
        match message.to_json() {
            Ok(text) => self.broadcast_text(&text).await,
            Err(e) => {
                error!("[{}] Failed to serialize broadcast: {}", self.id, e);
                0
            }
        }
    }

    pub async fn broadcast_text(&self, text: &str) -> usize {
        let players = self.players.read().await;
        let mut delivered = 0;
        for (side, endpoint) in players.endpoints() {
            match endpoint.send_text(text.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("[{}] Player {}: {}", self.id, side, e),
            }
        }
        delivered
    }

    async fn install_driver(&self, handle: DriverHandle) {
        *self.driver.lock().await = Some(handle);
    }

    /// Tears the session down: driver, engine, then endpoints.
    async fn close(&self) {
        self.closed.store(true, Ordering::Release);

        if let Some(handle) = self.driver.lock().await.take() {
            handle.cancel();
        }
        self.engine.write().await.stop();

        let endpoints = self.players.write().await.take_all();
        for endpoint in &endpoints {
            endpoint.close(CLOSE_SESSION_ENDED, "Session ended");
        }
        info!(
            "[{}] Session removed, closed {} connection(s)",
            self.id,
            endpoints.len()
        );
    }
}

/// Read model entry for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub status: GameStatus,
    pub endpoint_count: usize,
}

/// Point-in-time listing of the registry, ordered by session id.
///
/// The listing owns its data, so it can be iterated any number of times
/// without touching the registry again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionListing {
    summaries: Vec<SessionSummary>,
}

impl SessionListing {
    pub fn iter(&self) -> std::slice::Iter<'_, SessionSummary> {
        self.summaries.iter()
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Total number of endpoints across the listed sessions.
    pub fn endpoint_count(&self) -> usize {
        self.iter().map(|summary| summary.endpoint_count).sum()
    }
}

impl<'a> IntoIterator for &'a SessionListing {
    type Item = &'a SessionSummary;
    type IntoIter = std::slice::Iter<'a, SessionSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Maps session identifiers to live sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    config: ServerConfig,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the session with this id, creating it (and starting its tick
    /// driver) if it does not exist. Concurrent callers for the same id all
    /// observe the same session.
    pub async fn get_or_create(self: &Arc<Self>, id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }

        let session = Arc::new(Session::new(id, &self.config));
        let handle = driver::spawn(Arc::downgrade(self), Arc::clone(&session), &self.config);
        session.install_driver(handle).await;
        sessions.insert(id.to_string(), Arc::clone(&session));
        info!("[{}] Session created. Active sessions: {}", id, sessions.len());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Creates a session under a fresh random identifier.
    pub async fn create(self: &Arc<Self>) -> Arc<Session> {
        loop {
            let id = generate_session_id();
            if !self.sessions.read().await.contains_key(&id) {
                return self.get_or_create(&id).await;
            }
        }
    }

    /// Cancels the session's driver, stops its engine, closes every bound
    /// endpoint and forgets it.
    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.close().await;
        Ok(())
    }

    /// Removes `session` only if it is still the one registered under its
    /// id. A session that was already removed and replaced by a newer one
    /// with the same id yields `NotFound` and the newer one is untouched.
    pub async fn remove_session(&self, session: &Arc<Session>) -> Result<(), SessionError> {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let registered = sessions
                .get(session.id())
                .map_or(false, |current| Arc::ptr_eq(current, session));
            if registered {
                sessions.remove(session.id())
            } else {
                None
            }
        };
        let removed = removed.ok_or_else(|| SessionError::NotFound(session.id().to_string()))?;
        removed.close().await;
        Ok(())
    }

    pub async fn list(&self) -> SessionListing {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(session.summary().await);
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        SessionListing { summaries }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Removes every session.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();
        debug!("Shutting down {} session(s)", drained.len());
        for session in drained {
            session.close().await;
        }
    }
}

/// Random identifier in the familiar 8-4-4-4-12 hex layout.
fn generate_session_id() -> String {
    let value: u128 = rand::random();
    let hex = format!("{:032x}", value);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
