//! Authoritative simulation of a single match.
//!
//! A [`GameEngine`] owns the ball, both paddles, the scores and the match
//! status. It is advanced in fixed time-steps by the session's tick driver
//! and mutated between ticks only through paddle intents and the status
//! transitions below:
//!
//! ```text
//! waiting ──start──▶ playing ──winning score / stop──▶ finished
//!                     │    ▲
//!                pause│    │resume
//!                     ▼    │
//!                     paused ──stop──▶ finished
//! ```
//!
//! `finished` is terminal: every later call is a no-op or is rejected.

use crate::config::GameConfig;
use crate::error::SessionError;
use crate::physics::{Ball, Paddle, PaddleSpan};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Direction, GameSnapshot, GameStatus, PaddlesSnapshot, Scores, Side, Vector2};
use std::f32::consts::FRAC_PI_4;

/// What a single call to [`GameEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The match is not being played; nothing moved.
    Idle,
    Advanced,
    /// A goal was scored by the given side and the ball was served again.
    Scored(Side),
    /// A goal ended the match in favour of the given side.
    Finished(Side),
}

#[derive(Debug, Clone)]
pub struct GameEngine {
    session_id: String,
    config: GameConfig,
    ball: Ball,
    left: Paddle,
    right: Paddle,
    scores: Scores,
    status: GameStatus,
    tick: u64,
    rng: StdRng,
    cosmic_background: Option<Vec<Vec<f32>>>,
}

impl GameEngine {
    pub fn new(session_id: &str, config: GameConfig) -> Self {
        Self::with_rng(session_id, config, StdRng::from_entropy())
    }

    /// Builds an engine whose serves are reproducible.
    pub fn with_seed(session_id: &str, config: GameConfig, seed: u64) -> Self {
        Self::with_rng(session_id, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(session_id: &str, config: GameConfig, rng: StdRng) -> Self {
        let center = Vector2::new(config.court_width / 2.0, config.court_height / 2.0);
        Self {
            session_id: session_id.to_string(),
            ball: Ball::at_rest(center, config.ball_radius),
            left: Paddle::centered(&config),
            right: Paddle::centered(&config),
            scores: Scores::default(),
            status: GameStatus::Waiting,
            tick: 0,
            rng,
            cosmic_background: None,
            config,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::A => &self.left,
            Side::B => &self.right,
        }
    }

    fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::A => &mut self.left,
            Side::B => &mut self.right,
        }
    }

    /// waiting → playing, serving the ball. The serve only sets the ball's
    /// velocity; nothing moves until the next tick. No-op in any other state.
    pub fn start(&mut self) -> bool {
        if self.status != GameStatus::Waiting {
            return false;
        }
        self.status = GameStatus::Playing;
        self.serve();
        info!("[{}] Game started", self.session_id);
        true
    }

    /// Ends the match from any state. Idempotent.
    pub fn stop(&mut self) -> bool {
        if self.status == GameStatus::Finished {
            return false;
        }
        self.status = GameStatus::Finished;
        self.left.moving = Direction::Stop;
        self.right.moving = Direction::Stop;
        info!(
            "[{}] Game over: {} - {}",
            self.session_id, self.scores.left, self.scores.right
        );
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        self.status = GameStatus::Paused;
        info!("[{}] Game paused", self.session_id);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != GameStatus::Paused {
            return false;
        }
        self.status = GameStatus::Playing;
        info!("[{}] Game resumed", self.session_id);
        true
    }

    /// Records the movement intent applied on the next tick.
    pub fn set_paddle_intent(
        &mut self,
        side: Side,
        direction: Direction,
    ) -> Result<(), SessionError> {
        if self.status == GameStatus::Finished {
            return Err(SessionError::GameFinished);
        }
        self.paddle_mut(side).moving = direction;
        debug!(
            "[{}] {} paddle moving {:?}",
            self.session_id,
            side.paddle_name(),
            direction
        );
        Ok(())
    }

    /// Replaces the decorative background grid forwarded to clients.
    pub fn set_cosmic_background(&mut self, field: Option<Vec<Vec<f32>>>) {
        self.cosmic_background = field;
    }

    /// Advances the match by `dt` seconds. Does nothing unless playing.
    pub fn tick(&mut self, dt: f32) -> Result<TickOutcome, SessionError> {
        if self.status != GameStatus::Playing {
            return Ok(TickOutcome::Idle);
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(SessionError::CorruptState(self.session_id.clone()));
        }

        self.tick += 1;
        let court_height = self.config.court_height;
        self.left.step(dt, court_height);
        self.right.step(dt, court_height);

        self.ball.integrate(dt);
        self.ball.bounce_walls(court_height);
        for side in Side::ALL {
            let paddle = *self.paddle(side);
            let span = PaddleSpan::for_side(side, &self.config);
            if self.ball.bounce_paddle(
                &paddle,
                side,
                span,
                self.config.spin_factor,
                self.config.max_ball_speed,
            ) {
                debug!("[{}] Ball hit {} paddle", self.session_id, side.paddle_name());
            }
        }

        if !self.ball.is_finite() {
            return Err(SessionError::CorruptState(self.session_id.clone()));
        }

        let scorer = if self.ball.position.x < 0.0 {
            Some(Side::B)
        } else if self.ball.position.x > self.config.court_width {
            Some(Side::A)
        } else {
            None
        };

        let Some(scorer) = scorer else {
            return Ok(TickOutcome::Advanced);
        };

        self.scores.increment(scorer);
        info!(
            "[{}] Score: {} - {}",
            self.session_id, self.scores.left, self.scores.right
        );

        if self.scores.get(scorer) >= self.config.winning_score {
            self.center_ball();
            self.stop();
            return Ok(TickOutcome::Finished(scorer));
        }

        self.serve();
        Ok(TickOutcome::Scored(scorer))
    }

    fn center_ball(&mut self) {
        self.ball.position = Vector2::new(self.config.court_width / 2.0, self.config.court_height / 2.0);
        self.ball.velocity = Vector2::ZERO;
    }

    /// Puts the ball back at the center heading left or right, within 45°
    /// of the horizontal.
    fn serve(&mut self) {
        self.center_ball();
        let angle = self.rng.gen_range(-FRAC_PI_4..=FRAC_PI_4);
        let heading = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        self.ball.velocity =
            Vector2::new(angle.cos() * heading, angle.sin()).scale(self.config.serve_speed);
    }

    /// Copies the current state out for serialization.
    pub fn get_state(&self) -> GameSnapshot {
        GameSnapshot {
            ball: self.ball.snapshot(),
            paddles: PaddlesSnapshot {
                left: self.left.snapshot(),
                right: self.right.snapshot(),
            },
            scores: self.scores,
            status: self.status,
            cosmic_background: self.cosmic_background.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn ball_mut(&mut self) -> &mut Ball {
        &mut self.ball
    }
}
