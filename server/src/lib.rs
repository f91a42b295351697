//! # Arena Server Library
//!
//! This library provides the authoritative server for the real-time arena
//! game. It owns the canonical state of every player, validates movement,
//! resolves attacks and keeps all clients in sync with periodic snapshots.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Every position, mode and energy value lives in the [`store::EntityStore`].
//! Clients only ever send intent; the server decides what actually happens
//! and tells everyone.
//!
//! ### Input Validation
//! Movement is limited to one mode-dependent step per event, clamped to the
//! arena and blocked by walls in particle mode. Attacks are checked against
//! range, aim cone, line of sight and a per-attacker cooldown, and damage is
//! always computed server-side. Anything invalid is dropped silently.
//!
//! ### State Broadcasting
//! A full snapshot goes out every 50ms. Joins, mode changes, disconnects and
//! hits are additionally pushed immediately.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Each TCP connection is served by its own reader task plus a writer task
//! draining a bounded outbound queue. The snapshot broadcaster is a single
//! independent task. Nothing waits on a slow client: a full queue loses
//! packets for that client only.
//!
//! ### Lock Discipline
//! The store serializes mutations per entity id and lets different ids
//! proceed in parallel. Only the session manager, the combat resolver and
//! the respawn scheduler mutate it.
//!
//! ## Module Organization
//!
//! - `store`: entity state and its atomic per-id operations
//! - `session`: admission, join, movement, mode changes and disconnects
//! - `combat`: hit rules, occlusion, cooldowns and damage
//! - `respawn`: cancellable deferred respawns of killed players
//! - `broadcast`: non-blocking fan-out and the fixed-rate snapshot loop
//! - `arena`: wiring of the above and packet routing
//! - `network`: TCP listener and per-connection tasks
//! - `config`: server settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::new(ServerConfig::default()).await?;
//!
//!     // Accepts players and broadcasts snapshots until dropped
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod broadcast;
pub mod combat;
pub mod config;
pub mod network;
pub mod respawn;
pub mod session;
pub mod store;
