//! Runtime configuration for the session server.

use shared::{
    BALL_RADIUS, COURT_HEIGHT, COURT_WIDTH, DEFAULT_TICK_RATE, MAX_BALL_SPEED, PADDLE_HEIGHT,
    PADDLE_OFFSET, PADDLE_SPEED, PADDLE_WIDTH, SERVE_SPEED, SPIN_FACTOR, WINNING_SCORE,
};
use std::time::Duration;

/// Physics tuning for one match.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub court_width: f32,
    pub court_height: f32,
    pub paddle_width: f32,
    pub paddle_height: f32,
    pub paddle_offset: f32,
    pub paddle_speed: f32,
    pub ball_radius: f32,
    pub serve_speed: f32,
    pub max_ball_speed: f32,
    pub spin_factor: f32,
    pub winning_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            court_width: COURT_WIDTH,
            court_height: COURT_HEIGHT,
            paddle_width: PADDLE_WIDTH,
            paddle_height: PADDLE_HEIGHT,
            paddle_offset: PADDLE_OFFSET,
            paddle_speed: PADDLE_SPEED,
            ball_radius: BALL_RADIUS,
            serve_speed: SERVE_SPEED,
            max_ball_speed: MAX_BALL_SPEED,
            spin_factor: SPIN_FACTOR,
            winning_score: WINNING_SCORE,
        }
    }
}

/// Server-wide settings shared by every session.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation ticks (and broadcasts) per second.
    pub tick_rate: u32,
    /// How long a finished session stays readable before it is reaped.
    pub finished_grace: Duration,
    /// How long a session may sit with no bound endpoint before it is stopped.
    pub idle_timeout: Duration,
    /// Outbound messages queued per endpoint before sends start failing.
    pub outbound_buffer: usize,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3003,
            tick_rate: DEFAULT_TICK_RATE,
            finished_grace: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            outbound_buffer: 64,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Fixed interval between two ticks. A zero tick rate is treated as 1Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
