pub mod protocol;
pub mod vector;

pub use protocol::{
    BallSnapshot, ClientMessage, Direction, GameSnapshot, GameStatus, PaddleSnapshot,
    PaddlesSnapshot, Scores, ServerMessage, ServerMessageType, Side,
};
pub use vector::Vector2;

// Court geometry, in pixels. Speeds are in pixels per second.
pub const COURT_WIDTH: f32 = 800.0;
pub const COURT_HEIGHT: f32 = 600.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
/// Gap between a goal line and the outer face of its paddle.
pub const PADDLE_OFFSET: f32 = 20.0;
pub const PADDLE_SPEED: f32 = 480.0;
pub const BALL_RADIUS: f32 = 10.0;
pub const SERVE_SPEED: f32 = 300.0;
pub const MAX_BALL_SPEED: f32 = 600.0;
/// Fraction of the paddle's vertical velocity transferred to the ball on contact.
pub const SPIN_FACTOR: f32 = 0.25;
pub const WINNING_SCORE: u32 = 5;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Close code sent to a third connection on a full session.
pub const CLOSE_SESSION_FULL: u16 = 4000;
/// Close code sent to every endpoint when its session is reaped.
pub const CLOSE_SESSION_ENDED: u16 = 4001;
