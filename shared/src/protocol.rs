//! JSON wire protocol exchanged over a session's WebSocket.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two players in a match. Side A plays the left paddle,
/// side B the right one; on the wire they are `"left"` / `"right"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "left")]
    A,
    #[serde(rename = "right")]
    B,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Paddle name as rendered by clients.
    pub fn paddle_name(self) -> &'static str {
        match self {
            Side::A => "left",
            Side::B => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Paddle movement intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stop,
}

impl Direction {
    /// Sign applied to the paddle speed. Up moves toward y = 0.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
            Direction::Stop => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Playing,
    Paused,
    Finished,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Playing => "playing",
            GameStatus::Paused => "paused",
            GameStatus::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub left: u32,
    pub right: u32,
}

impl Scores {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::A => self.left,
            Side::B => self.right,
        }
    }

    pub fn increment(&mut self, side: Side) {
        match side {
            Side::A => self.left += 1,
            Side::B => self.right += 1,
        }
    }

    pub fn leader(&self) -> Option<Side> {
        match self.left.cmp(&self.right) {
            std::cmp::Ordering::Greater => Some(Side::A),
            std::cmp::Ordering::Less => Some(Side::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleSnapshot {
    pub y: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddlesSnapshot {
    pub left: PaddleSnapshot,
    pub right: PaddleSnapshot,
}

impl PaddlesSnapshot {
    pub fn get(&self, side: Side) -> &PaddleSnapshot {
        match side {
            Side::A => &self.left,
            Side::B => &self.right,
        }
    }
}

/// Immutable view of one match, as broadcast every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub ball: BallSnapshot,
    pub paddles: PaddlesSnapshot,
    pub scores: Scores,
    pub status: GameStatus,
    /// Decorative field rendered by clients. Never interpreted server-side.
    pub cosmic_background: Option<Vec<Vec<f32>>>,
}

/// Client → server control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Paddle {
        /// Paddle to move. Defaults to the sender's own side when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        paddle: Option<Side>,
        direction: Direction,
    },
    Start,
    Stop,
    Ping,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessageType {
    Connected,
    State,
    GameOver,
    Error,
    Pong,
}

/// Server → client message. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: ServerMessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<GameSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerMessage {
    fn new(kind: ServerMessageType) -> Self {
        Self {
            kind,
            session_id: None,
            data: None,
            message: None,
        }
    }

    pub fn connected(session_id: &str, side: Side) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            message: Some(format!("Player {}", side)),
            ..Self::new(ServerMessageType::Connected)
        }
    }

    pub fn state(snapshot: GameSnapshot) -> Self {
        Self {
            data: Some(snapshot),
            ..Self::new(ServerMessageType::State)
        }
    }

    pub fn game_over(snapshot: GameSnapshot) -> Self {
        Self {
            data: Some(snapshot),
            ..Self::new(ServerMessageType::GameOver)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(ServerMessageType::Error)
        }
    }

    pub fn pong() -> Self {
        Self::new(ServerMessageType::Pong)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
