//! Session lifecycle for the arena server
//!
//! This module handles everything that happens to a connection outside of
//! combat:
//! - Admission and session id assignment (connect)
//! - Entity creation at a random spawn point (join)
//! - Movement and mode-change ingestion with server-side validation
//! - Cleanup of the entity and any pending respawn (disconnect)
//!
//! Rule and protocol violations are dropped without telling the client;
//! the only signal a client gets is the absence of the expected state change.

use crate::broadcast::{Broadcaster, Outbox};
use crate::respawn::RespawnScheduler;
use crate::store::{Entity, EntityStore};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use shared::geometry::step_toward;
use shared::{
    clamp_to_arena, Mode, ObstacleRegistry, Packet, SessionId, Vec2, PLAYER_RADIUS,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of one connection
///
/// `Connecting -> Joined -> Disconnected`; `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Joined,
    Disconnected,
}

/// Per-connection state, owned by the task serving that connection
#[derive(Debug)]
pub struct Session {
    /// Server-assigned identifier, also the id of the session's entity
    pub id: SessionId,
    /// Remote address, kept for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == SessionState::Joined
    }
}

/// What a movement request did to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Position updated, mode unchanged
    Moved,
    /// Position and mode updated
    MovedWithModeChange,
    /// Dropped: blocked, dead, not joined or entity gone
    Discarded,
}

/// Owns admission and the join/move/mode/disconnect handlers
///
/// Besides the combat resolver and the respawn scheduler, the SessionManager
/// is the only component that mutates the entity store. Join, mode changes
/// and disconnects are disseminated immediately through the broadcaster,
/// in addition to the periodic snapshot.
pub struct SessionManager {
    store: Arc<EntityStore>,
    obstacles: Arc<ObstacleRegistry>,
    broadcaster: Arc<Broadcaster>,
    respawns: Arc<RespawnScheduler>,
    /// Next id handed out; ids are never reused within a process
    next_session_id: AtomicU32,
    /// Maximum number of concurrent sessions
    max_clients: usize,
    rng: Mutex<StdRng>,
}

impl SessionManager {
    pub fn new(
        store: Arc<EntityStore>,
        obstacles: Arc<ObstacleRegistry>,
        broadcaster: Arc<Broadcaster>,
        respawns: Arc<RespawnScheduler>,
        max_clients: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            obstacles,
            broadcaster,
            respawns,
            next_session_id: AtomicU32::new(1),
            max_clients,
            rng: Mutex::new(rng),
        }
    }

    /// Admits a new connection
    ///
    /// Registers `outbox` for broadcasts and queues a `Welcome` carrying the
    /// session id. Returns None if the server is at capacity.
    pub fn connect(&self, addr: SocketAddr, outbox: Outbox) -> Option<Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        if !self.broadcaster.register(id, outbox, self.max_clients) {
            warn!("Rejecting connection from {}: server full", addr);
            return None;
        }

        info!("Session {} connected from {}", id, addr);
        self.broadcaster
            .send_to(id, Packet::Welcome { session_id: id });
        Some(Session::new(id, addr))
    }

    /// Creates the session's entity at a random spawn point
    ///
    /// A second join from the same session is dropped.
    pub fn join(&self, session: &mut Session) -> Option<Entity> {
        if session.state != SessionState::Connecting {
            warn!(
                "Ignoring join from session {} in state {:?}",
                session.id, session.state
            );
            return None;
        }

        let spawn_point = {
            let mut rng = self.rng.lock();
            self.obstacles.find_spawn_point(&mut *rng, PLAYER_RADIUS)
        };

        match self.store.create(session.id, spawn_point) {
            Ok(entity) => {
                session.state = SessionState::Joined;
                info!(
                    "Session {} joined at ({:.1}, {:.1})",
                    session.id, spawn_point.x, spawn_point.y
                );
                self.broadcaster.broadcast_snapshot(&self.store);
                Some(entity)
            }
            Err(e) => {
                warn!("Join of session {} dropped: {}", session.id, e);
                None
            }
        }
    }

    /// Validates and applies a movement request
    ///
    /// The requested point is clamped to the arena and shortened to one step
    /// of the declared mode's speed. Particle-mode steps into a wall are
    /// discarded; wave-mode steps ignore walls.
    pub fn handle_move(&self, session: &Session, requested: Vec2, mode: Mode) -> MoveOutcome {
        if !session.is_joined() {
            debug!("Move from session {} before join dropped", session.id);
            return MoveOutcome::Discarded;
        }
        if !requested.x.is_finite() || !requested.y.is_finite() {
            warn!("Non-finite move target from session {}", session.id);
            return MoveOutcome::Discarded;
        }

        let current = match self.store.get(session.id) {
            Some(entity) if !entity.is_dead() => entity,
            _ => return MoveOutcome::Discarded,
        };

        let candidate = clamp_to_arena(step_toward(current.position, requested, mode.speed()));
        if mode == Mode::Particle && self.obstacles.collides(candidate, PLAYER_RADIUS, mode) {
            return MoveOutcome::Discarded;
        }

        match self.store.apply_movement(session.id, candidate, mode) {
            Ok(_) if mode != current.mode => {
                self.broadcaster.broadcast_snapshot(&self.store);
                MoveOutcome::MovedWithModeChange
            }
            Ok(_) => MoveOutcome::Moved,
            Err(e) => {
                debug!("Move from session {} dropped: {}", session.id, e);
                MoveOutcome::Discarded
            }
        }
    }

    /// Switches the entity's mode and broadcasts immediately
    pub fn handle_mode_change(&self, session: &Session, mode: Mode) -> bool {
        if !session.is_joined() {
            debug!("Mode change from session {} before join dropped", session.id);
            return false;
        }

        match self.store.set_mode(session.id, mode) {
            Ok(entity) => {
                debug!("Session {} switched to {:?}", session.id, entity.mode);
                self.broadcaster.broadcast_snapshot(&self.store);
                true
            }
            Err(e) => {
                debug!("Mode change from session {} dropped: {}", session.id, e);
                false
            }
        }
    }

    /// Tears the session down
    ///
    /// Removes the entity, cancels any pending respawn, stops broadcasts to
    /// the session and tells everyone else. Calling it twice is harmless.
    pub fn disconnect(&self, session: &mut Session) {
        if session.state == SessionState::Disconnected {
            return;
        }
        let had_entity = session.state == SessionState::Joined;
        session.state = SessionState::Disconnected;

        let removed = self.store.remove(session.id).is_some();
        self.respawns.cancel(session.id);
        self.broadcaster.unregister(session.id);
        info!(
            "Session {} disconnected after {:?}",
            session.id,
            session.connected_at.elapsed()
        );

        if had_entity || removed {
            self.broadcaster.broadcast_snapshot(&self.store);
        }
    }

    /// Number of admitted, not yet disconnected sessions
    pub fn len(&self) -> usize {
        self.broadcaster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.broadcaster.is_empty()
    }
}
