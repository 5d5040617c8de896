//! Per-session tick driver.
//!
//! Every session gets one task that advances its engine at the configured
//! tick rate and broadcasts the resulting snapshot to the bound endpoints.
//! The same task applies the reap policy, asking the registry to remove the
//! session once it has been finished for the grace period.

use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::game::TickOutcome;
use crate::session::{Session, SessionRegistry};
use log::{debug, error, info, warn};
use shared::{GameStatus, ServerMessage};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Owner's handle on a running driver task.
#[derive(Debug)]
pub struct DriverHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Signals the driver to stop after its current tick.
    ///
    /// The task is not aborted: the driver may be the one removing its own
    /// session, in which case it is still running this call.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// What the reap policy wants done with a session after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapAction {
    Keep,
    /// Nobody has been connected for too long; end the match.
    Stop,
    /// The finished grace period has elapsed.
    Remove,
}

/// Tracks how long a session has been finished or unattended.
#[derive(Debug, Clone)]
pub struct ReapClock {
    finished_grace: Duration,
    idle_timeout: Duration,
    finished_since: Option<Instant>,
}

impl ReapClock {
    pub fn new(finished_grace: Duration, idle_timeout: Duration) -> Self {
        Self {
            finished_grace,
            idle_timeout,
            finished_since: None,
        }
    }

    pub fn observe(
        &mut self,
        status: GameStatus,
        empty_since: Option<Instant>,
        now: Instant,
    ) -> ReapAction {
        if status == GameStatus::Finished {
            let since = *self.finished_since.get_or_insert(now);
            return if now.saturating_duration_since(since) >= self.finished_grace {
                ReapAction::Remove
            } else {
                ReapAction::Keep
            };
        }

        self.finished_since = None;
        match empty_since {
            Some(since) if now.saturating_duration_since(since) >= self.idle_timeout => {
                ReapAction::Stop
            }
            _ => ReapAction::Keep,
        }
    }
}

/// Starts the driver for a freshly created session.
pub fn spawn(
    registry: Weak<SessionRegistry>,
    session: Arc<Session>,
    config: &ServerConfig,
) -> DriverHandle {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let tick_duration = config.tick_duration();
    let clock = ReapClock::new(config.finished_grace, config.idle_timeout);
    let task = tokio::spawn(run(registry, session, cancel_rx, tick_duration, clock));
    DriverHandle {
        cancel: Some(cancel_tx),
        task,
    }
}

async fn run(
    registry: Weak<SessionRegistry>,
    session: Arc<Session>,
    mut cancel_rx: oneshot::Receiver<()>,
    tick_duration: Duration,
    mut clock: ReapClock,
) {
    let mut timer = interval(tick_duration);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let dt = tick_duration.as_secs_f32();

    // Skip the first tick since it fires immediately
    timer.tick().await;

    debug!("[{}] Tick driver started ({:?})", session.id(), tick_duration);

    loop {
        tokio::select! {
            _ = &mut cancel_rx => break,
            _ = timer.tick() => {}
        }

        if session.is_closed() {
            break;
        }
        let Some(registry) = registry.upgrade() else {
            break;
        };

        let status = match advance(&session, dt).await {
            Ok(status) => status,
            Err(e) => {
                error!("[{}] {}; removing session", session.id(), e);
                session.engine.write().await.stop();
                reap(&registry, &session).await;
                break;
            }
        };

        let empty_since = session.players.read().await.empty_since();
        match clock.observe(status, empty_since, Instant::now()) {
            ReapAction::Keep => {}
            ReapAction::Stop => {
                info!("[{}] No players connected, ending game", session.id());
                session.engine.write().await.stop();
            }
            ReapAction::Remove => {
                reap(&registry, &session).await;
                break;
            }
        }
    }

    debug!("[{}] Tick driver stopped", session.id());
}

/// Removes this driver's own session. The driver may have been parked on a
/// lock while the session was removed and its id reused, so a closed
/// session is left alone and removal only matches this exact session.
async fn reap(registry: &SessionRegistry, session: &Arc<Session>) {
    if session.is_closed() {
        return;
    }
    if let Err(e) = registry.remove_session(session).await {
        debug!("[{}] {}", session.id(), e);
    }
}

/// Runs one tick and broadcasts its result.
async fn advance(session: &Session, dt: f32) -> Result<GameStatus, SessionError> {
    let snapshot = {
        let mut engine = session.engine.write().await;
        if let TickOutcome::Finished(winner) = engine.tick(dt)? {
            info!("[{}] Player {} wins", session.id(), winner);
        }
        engine.get_state()
    };

    let status = snapshot.status;
    let message = if status == GameStatus::Finished {
        if !session.announce_game_over() {
            return Ok(status);
        }
        ServerMessage::game_over(snapshot)
    } else {
        ServerMessage::state(snapshot)
    };

    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!("[{}] Failed to serialize snapshot: {}", session.id(), e);
            return Ok(status);
        }
    };
    session.broadcast_text(&text).await;
    Ok(status)
}
