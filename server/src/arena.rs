//! Wiring of the arena's components and routing of inbound packets

use crate::broadcast::{run_snapshot_loop, Broadcaster};
use crate::combat::{AttackRequest, CombatResolver};
use crate::config::ServerConfig;
use crate::respawn::RespawnScheduler;
use crate::session::{Session, SessionManager};
use crate::store::EntityStore;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ObstacleRegistry, Packet, Vec2};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One running arena: the authoritative store plus everything allowed to
/// read or mutate it.
pub struct Arena {
    config: ServerConfig,
    store: Arc<EntityStore>,
    obstacles: Arc<ObstacleRegistry>,
    broadcaster: Arc<Broadcaster>,
    respawns: Arc<RespawnScheduler>,
    sessions: SessionManager,
    combat: CombatResolver,
}

/// Independent RNG stream per component, reproducible when seeded.
fn component_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

impl Arena {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let store = Arc::new(EntityStore::new());
        let obstacles = Arc::new(ObstacleRegistry::arena());
        let broadcaster = Arc::new(Broadcaster::new());

        let respawns = Arc::new(RespawnScheduler::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            Arc::clone(&obstacles),
            config.respawn_delay,
            component_rng(config.rng_seed, 0),
        ));
        let sessions = SessionManager::new(
            Arc::clone(&store),
            Arc::clone(&obstacles),
            Arc::clone(&broadcaster),
            Arc::clone(&respawns),
            config.max_clients,
            component_rng(config.rng_seed, 1),
        );
        let combat = CombatResolver::new(
            Arc::clone(&store),
            Arc::clone(&obstacles),
            Arc::clone(&broadcaster),
            Arc::clone(&respawns),
            config.attack_cooldown,
            component_rng(config.rng_seed, 2),
        );

        Arc::new(Self {
            config,
            store,
            obstacles,
            broadcaster,
            respawns,
            sessions,
            combat,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn obstacles(&self) -> &ObstacleRegistry {
        &self.obstacles
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    /// Number of respawns waiting to fire
    pub fn pending_respawns(&self) -> usize {
        self.respawns.pending()
    }

    /// Starts the fixed-rate snapshot broadcast on the current runtime.
    pub fn spawn_snapshot_broadcaster(&self) -> JoinHandle<()> {
        tokio::spawn(run_snapshot_loop(
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.store),
            self.config.snapshot_interval,
        ))
    }

    /// Routes one packet from `session`.
    ///
    /// Returns false when the session asked to leave; the caller then runs
    /// the disconnect.
    pub fn dispatch(&self, session: &mut Session, packet: Packet) -> bool {
        match packet {
            Packet::PlayerJoin => {
                self.sessions.join(session);
            }
            Packet::PlayerMove { x, y, mode } => {
                self.sessions.handle_move(session, Vec2::new(x, y), mode);
            }
            Packet::PlayerStateChange { mode } => {
                self.sessions.handle_mode_change(session, mode);
            }
            Packet::PlayerAttack {
                target_id,
                damage,
                attacker_mode,
                angle,
            } => {
                if !session.is_joined() {
                    debug!("Attack from session {} before join dropped", session.id);
                } else if !angle.is_finite() {
                    warn!("Non-finite attack angle from session {}", session.id);
                } else {
                    self.combat.resolve(&AttackRequest {
                        attacker_id: session.id,
                        target_id,
                        declared_damage: damage,
                        declared_mode: attacker_mode,
                        angle,
                    });
                }
            }
            Packet::Disconnect => return false,
            other => {
                warn!(
                    "Session {} sent server-only packet {:?}, dropping",
                    session.id, other
                );
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use shared::{Mode, MAX_ENERGY, PARTICLE_DAMAGE};
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn seeded_arena() -> Arc<Arena> {
        Arena::new(ServerConfig {
            rng_seed: Some(11),
            ..ServerConfig::default()
        })
    }

    fn connect(arena: &Arena) -> (Session, mpsc::Receiver<Arc<Packet>>) {
        let (tx, rx) = mpsc::channel(64);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let mut session = arena.sessions().connect(addr, tx).unwrap();
        assert!(arena.dispatch(&mut session, Packet::PlayerJoin));
        (session, rx)
    }

    #[test]
    fn test_join_and_mode_change_through_dispatch() {
        let arena = seeded_arena();
        let (mut session, _rx) = connect(&arena);
        assert_eq!(session.state(), SessionState::Joined);

        arena.dispatch(&mut session, Packet::PlayerStateChange { mode: Mode::Wave });
        assert_eq!(arena.store().get(session.id).unwrap().mode, Mode::Wave);
    }

    #[test]
    fn test_attack_uses_transport_session_id() {
        let arena = seeded_arena();
        let (mut attacker, _rx1) = connect(&arena);
        let (target, _rx2) = connect(&arena);
        arena
            .store()
            .apply_movement(attacker.id, Vec2::new(500.0, 700.0), Mode::Particle)
            .unwrap();
        arena
            .store()
            .apply_movement(target.id, Vec2::new(600.0, 700.0), Mode::Particle)
            .unwrap();

        arena.dispatch(
            &mut attacker,
            Packet::PlayerAttack {
                target_id: target.id,
                damage: 99,
                attacker_mode: Mode::Particle,
                angle: 0.0,
            },
        );
        assert_eq!(
            arena.store().get(target.id).unwrap().energy,
            MAX_ENERGY - PARTICLE_DAMAGE
        );
    }

    #[test]
    fn test_server_only_packets_are_ignored() {
        let arena = seeded_arena();
        let (mut session, _rx) = connect(&arena);
        let before = arena.store().get(session.id).unwrap();

        assert!(arena.dispatch(&mut session, Packet::Welcome { session_id: 42 }));
        assert!(arena.dispatch(&mut session, Packet::PlayerUpdate { players: vec![] }));
        assert_eq!(arena.store().get(session.id).unwrap(), before);
    }

    #[test]
    fn test_non_finite_input_is_ignored() {
        let arena = seeded_arena();
        let (mut session, _rx) = connect(&arena);
        let before = arena.store().get(session.id).unwrap().position;

        arena.dispatch(
            &mut session,
            Packet::PlayerMove {
                x: f32::NAN,
                y: 10.0,
                mode: Mode::Particle,
            },
        );
        assert_eq!(arena.store().get(session.id).unwrap().position, before);
    }

    #[test]
    fn test_disconnect_packet_ends_session() {
        let arena = seeded_arena();
        let (mut session, _rx) = connect(&arena);
        assert!(!arena.dispatch(&mut session, Packet::Disconnect));
    }

    #[test]
    fn test_seeded_arenas_spawn_identically() {
        let first = seeded_arena();
        let second = seeded_arena();
        let (a, _rx1) = connect(&first);
        let (b, _rx2) = connect(&second);

        assert_eq!(
            first.store().get(a.id).unwrap().position,
            second.store().get(b.id).unwrap().position
        );
    }
}
