//! Player connection management for match sessions
//!
//! This module binds network endpoints to sessions, including:
//! - Capacity enforcement (two players per session, one per side)
//! - Side assignment in order of arrival
//! - Routing inbound control messages into the session's engine
//! - Disconnection handling (pausing or abandoning the match)
//!
//! Endpoints are transport-agnostic: an [`Endpoint`] is the sending half of a
//! bounded queue plus a close signal, and the matching [`EndpointReceiver`] is
//! drained by whatever owns the socket.

use crate::error::SessionError;
use crate::session::{Session, SessionRegistry};
use log::{debug, info, warn};
use shared::{ClientMessage, GameStatus, ServerMessage, Side, CLOSE_SESSION_FULL};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

pub type EndpointId = u64;

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Frames queued for delivery to one client.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Close the channel with the given code and reason. Nothing is
    /// delivered after this.
    Close { code: u16, reason: String },
}

type CloseRequest = Option<(u16, String)>;

/// Sending half of a connected client's channel.
///
/// Text frames go through a bounded queue. Close requests bypass it, so a
/// client that stopped reading is still told to go away.
#[derive(Debug, Clone)]
pub struct Endpoint {
    id: EndpointId,
    sender: mpsc::Sender<Outbound>,
    closer: Arc<watch::Sender<CloseRequest>>,
}

impl Endpoint {
    /// Creates an endpoint and the receiver its owner must drain.
    pub fn channel(capacity: usize) -> (Endpoint, EndpointReceiver) {
        let (sender, frames) = mpsc::channel(capacity.max(1));
        let (closer, close) = watch::channel(None);
        let id = NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed);
        let endpoint = Endpoint {
            id,
            sender,
            closer: Arc::new(closer),
        };
        let receiver = EndpointReceiver {
            frames,
            close,
            finished: false,
        };
        (endpoint, receiver)
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Queues pre-serialized text without waiting.
    pub fn send_text(&self, text: String) -> Result<(), SessionError> {
        self.sender
            .try_send(Outbound::Text(text))
            .map_err(|e| SessionError::SendFailed {
                endpoint: self.id,
                reason: match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "channel closed",
                },
            })
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), SessionError> {
        self.send_text(message.to_json()?)
    }

    /// Asks the owner to close the channel. Never waits on the text queue.
    /// Only the first request counts.
    pub fn close(&self, code: u16, reason: &str) {
        let requested = self.closer.send_if_modified(|request| {
            if request.is_some() {
                return false;
            }
            *request = Some((code, reason.to_string()));
            true
        });
        if !requested {
            debug!("Endpoint {} already closing", self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.closer.borrow().is_some()
    }
}

/// Receiving half of an [`Endpoint`].
///
/// Frames already queued are delivered before a pending close, and the
/// close is delivered exactly once. After that the receiver is finished.
#[derive(Debug)]
pub struct EndpointReceiver {
    frames: mpsc::Receiver<Outbound>,
    close: watch::Receiver<CloseRequest>,
    finished: bool,
}

impl EndpointReceiver {
    /// Waits for the next frame. `None` once the close was delivered or
    /// every endpoint clone is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        if let Some(frame) = self.try_recv() {
            return Some(frame);
        }
        if self.finished {
            return None;
        }
        tokio::select! {
            frame = self.frames.recv() => frame,
            _ = self.close.changed() => self.try_recv(),
        }
    }

    /// Returns the next frame if one is ready.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        if self.finished {
            return None;
        }
        if let Ok(frame) = self.frames.try_recv() {
            return Some(frame);
        }
        let (code, reason) = self.close.borrow_and_update().clone()?;
        self.finished = true;
        Some(Outbound::Close { code, reason })
    }
}

/// The (at most two) endpoints bound to one session.
#[derive(Debug)]
pub struct PlayerSlots {
    a: Option<Endpoint>,
    b: Option<Endpoint>,
    /// When the session last became empty; `None` while anyone is bound.
    empty_since: Option<Instant>,
}

impl Default for PlayerSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerSlots {
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            empty_since: Some(Instant::now()),
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<Endpoint> {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    pub fn get(&self, side: Side) -> Option<&Endpoint> {
        match side {
            Side::A => self.a.as_ref(),
            Side::B => self.b.as_ref(),
        }
    }

    /// Binds the endpoint to the first free side, A before B.
    /// Returns `None` when both sides are taken.
    pub fn assign(&mut self, endpoint: Endpoint) -> Option<Side> {
        let side = Side::ALL.into_iter().find(|side| self.get(*side).is_none())?;
        *self.slot_mut(side) = Some(endpoint);
        self.empty_since = None;
        Some(side)
    }

    /// Unbinds the endpoint with the given id, returning the side it held.
    pub fn release(&mut self, id: EndpointId) -> Option<Side> {
        let side = self.side_of(id)?;
        *self.slot_mut(side) = None;
        if self.is_empty() {
            self.empty_since = Some(Instant::now());
        }
        Some(side)
    }

    pub fn side_of(&self, id: EndpointId) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.get(*side).map(Endpoint::id) == Some(id))
    }

    /// Unbinds everything, returning the endpoints that were bound.
    pub fn take_all(&mut self) -> Vec<Endpoint> {
        let taken: Vec<Endpoint> = [self.a.take(), self.b.take()].into_iter().flatten().collect();
        if !taken.is_empty() {
            self.empty_since = Some(Instant::now());
        }
        taken
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (Side, &Endpoint)> + '_ {
        Side::ALL
            .into_iter()
            .filter_map(move |side| self.get(side).map(|endpoint| (side, endpoint)))
    }

    pub fn empty_since(&self) -> Option<Instant> {
        self.empty_since
    }

    pub fn len(&self) -> usize {
        usize::from(self.a.is_some()) + usize::from(self.b.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == 2
    }
}

/// Binds incoming endpoints to sessions from the registry.
#[derive(Clone)]
pub struct ConnectionManager {
    registry: Arc<SessionRegistry>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Looks up (or creates) the session and binds the endpoint to it.
    /// Without an identifier a fresh session is created.
    pub async fn connect(
        &self,
        session_id: Option<&str>,
        endpoint: Endpoint,
    ) -> Result<PlayerConnection, SessionError> {
        let session = match session_id {
            Some(id) => self.registry.get_or_create(id).await,
            None => self.registry.create().await,
        };
        self.bind(session, endpoint).await
    }

    /// Binds the endpoint to the first free side of the session.
    ///
    /// A full session closes the endpoint with [`CLOSE_SESSION_FULL`]. On
    /// success the endpoint receives a `connected` message naming its side
    /// before any state broadcast.
    pub async fn bind(
        &self,
        session: Arc<Session>,
        endpoint: Endpoint,
    ) -> Result<PlayerConnection, SessionError> {
        let side = {
            let mut players = session.players.write().await;
            if session.is_closed() {
                endpoint.close(shared::CLOSE_SESSION_ENDED, "Session not found");
                return Err(SessionError::NotFound(session.id().to_string()));
            }

            let Some(side) = players.assign(endpoint.clone()) else {
                warn!("[{}] Rejecting connection: session full", session.id());
                endpoint.close(CLOSE_SESSION_FULL, "Session full");
                return Err(SessionError::SessionFull(session.id().to_string()));
            };

            if let Err(e) = endpoint.send(&ServerMessage::connected(session.id(), side)) {
                warn!("[{}] Failed to acknowledge player {}: {}", session.id(), side, e);
            }
            info!(
                "[{}] Player {} connected. Total: {}",
                session.id(),
                side,
                players.len()
            );
            if players.is_full() {
                session.engine.write().await.resume();
            }
            side
        };

        Ok(PlayerConnection {
            session,
            endpoint,
            side,
        })
    }
}

/// One player's binding to a session.
///
/// The owner of the socket feeds every inbound text frame to
/// [`handle_text`](Self::handle_text) and calls [`close`](Self::close) once
/// the socket is gone.
#[derive(Debug)]
pub struct PlayerConnection {
    session: Arc<Session>,
    endpoint: Endpoint,
    side: Side,
}

impl PlayerConnection {
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint.id()
    }

    /// Parses and applies one inbound frame.
    ///
    /// Bad input never drops the connection: the frame is logged, answered
    /// with an `error` message and otherwise ignored.
    pub async fn handle_text(&self, text: &str) -> Result<(), SessionError> {
        let message = match ClientMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "[{}] Invalid message from player {}: {}",
                    self.session.id(),
                    self.side,
                    e
                );
                self.reply(&ServerMessage::error("Invalid message format"));
                return Err(SessionError::InvalidMessage(e));
            }
        };
        self.handle_message(message).await
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), SessionError> {
        match message {
            ClientMessage::Paddle { paddle, direction } => {
                let side = paddle.unwrap_or(self.side);
                let result = self
                    .session
                    .engine
                    .write()
                    .await
                    .set_paddle_intent(side, direction);
                if let Err(e) = &result {
                    debug!("[{}] Ignoring paddle input: {}", self.session.id(), e);
                }
                result
            }
            ClientMessage::Start => {
                let snapshot = {
                    let mut engine = self.session.engine.write().await;
                    engine.start();
                    engine.get_state()
                };
                self.session
                    .broadcast(&ServerMessage::state(snapshot).with_message("Game started"))
                    .await;
                Ok(())
            }
            ClientMessage::Stop => {
                let snapshot = {
                    let mut engine = self.session.engine.write().await;
                    engine.stop();
                    engine.get_state()
                };
                if self.session.announce_game_over() {
                    self.session
                        .broadcast(&ServerMessage::game_over(snapshot).with_message("Game stopped"))
                        .await;
                }
                info!(
                    "[{}] Game stopped by player {}",
                    self.session.id(),
                    self.side
                );
                Ok(())
            }
            ClientMessage::Ping => {
                self.reply(&ServerMessage::pong());
                Ok(())
            }
        }
    }

    fn reply(&self, message: &ServerMessage) {
        if let Err(e) = self.endpoint.send(message) {
            warn!("[{}] {}", self.session.id(), e);
        }
    }

    /// Unbinds the endpoint from its session.
    ///
    /// If nobody is left and the match never started, the match is
    /// abandoned (finished). If one player is left mid-match, the match is
    /// paused until the free side is bound again.
    pub async fn close(self) {
        let mut players = self.session.players.write().await;
        if players.release(self.endpoint.id()).is_none() {
            return;
        }
        let remaining = players.len();
        info!(
            "[{}] Player {} disconnected. Remaining: {}",
            self.session.id(),
            self.side,
            remaining
        );

        // `players` stays locked so the count cannot change before the decision
        let mut engine = self.session.engine.write().await;
        match (remaining, engine.status()) {
            (0, GameStatus::Waiting) => {
                info!(
                    "[{}] All players left before the game started",
                    self.session.id()
                );
                engine.stop();
            }
            (1, GameStatus::Playing) => {
                engine.pause();
            }
            _ => {}
        }
    }
}
