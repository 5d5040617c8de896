//! # Pong Session Server Library
//!
//! This library provides the authoritative server for real-time two-player
//! pong matches. It hosts any number of independent sessions, simulates each
//! match on the server, and streams the resulting state to both players over
//! WebSocket.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every match is simulated server-side. Clients only send paddle movement
//! intents and lifecycle commands; ball movement, collisions and scoring are
//! decided here and broadcast as complete snapshots.
//!
//! ### Session Management
//! Sessions are addressed by an opaque identifier and created lazily the
//! first time a client references one. Concurrent first references to the
//! same identifier always end up in the same session.
//!
//! ### Player Management
//! Handles the lifecycle of player connections including:
//! - Binding at most two players per session, one per side
//! - Routing control messages into the match
//! - Pausing a match when a player drops and resuming when the side is filled
//!
//! ### State Broadcasting
//! Each session owns a tick driver that advances its match at a fixed rate
//! and sends the new snapshot to every bound player. A slow player never
//! delays a tick: delivery goes through bounded queues and full queues drop
//! the update for that player only.
//!
//! ## Architecture Design
//!
//! ### One Task Per Session
//! Sessions share nothing but the registry map. Each runs its own tick task,
//! so a stalled or failing match never affects the others.
//!
//! ### Reaping
//! A finished match stays readable for a grace period and is then removed,
//! closing any remaining connections. A match nobody is connected to is
//! ended after an idle timeout.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Server-wide settings and per-match physics tuning.
//!
//! ### Physics Module (`physics`)
//! Ball and paddle primitives: movement, wall and paddle bounces.
//!
//! ### Game Module (`game`)
//! The simulation engine for one match and its status transitions.
//!
//! ### Session Module (`session`)
//! The registry of live sessions and the session type itself.
//!
//! ### Client Manager Module (`client_manager`)
//! Endpoints, side assignment and inbound message handling.
//!
//! ### Driver Module (`driver`)
//! The per-session tick loop and its reap policy.
//!
//! ### Network Module (`network`)
//! The WebSocket listener that feeds sockets into the client manager.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::NetworkServer;
//! use server::session::SessionRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let address = config.bind_address();
//!     let registry = SessionRegistry::new(config);
//!
//!     // Clients connect to ws://127.0.0.1:3003/game/<session-id>
//!     let server = NetworkServer::bind(&address, registry).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod driver;
pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod session;

pub use client_manager::{
    ConnectionManager, Endpoint, EndpointReceiver, Outbound, PlayerConnection,
};
pub use config::{GameConfig, ServerConfig};
pub use error::SessionError;
pub use game::GameEngine;
pub use session::{Session, SessionListing, SessionRegistry, SessionSummary};
