//! Protocol types, gameplay constants and arena geometry shared by the
//! arena server and its clients.

pub mod codec;
pub mod geometry;
pub mod obstacle;

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use geometry::Vec2;
pub use obstacle::{clamp_to_arena, Obstacle, ObstacleRegistry};

/// Server-assigned identifier of one connection and its entity.
pub type SessionId = u32;

pub const ARENA_WIDTH: f32 = 1000.0;
pub const ARENA_HEIGHT: f32 = 1000.0;
pub const PLAYER_RADIUS: f32 = 20.0;
pub const MAX_ENERGY: u32 = 100;

pub const PARTICLE_SPEED: f32 = 5.0;
pub const WAVE_SPEED: f32 = 8.0;

pub const PARTICLE_RANGE: f32 = 200.0;
pub const PARTICLE_HALF_ANGLE: f32 = PI / 4.0;
pub const PARTICLE_DAMAGE: u32 = 15;
pub const TUNNEL_CHANCE: f32 = 0.3;

pub const WAVE_RANGE: f32 = 150.0;
pub const WAVE_HALF_ANGLE: f32 = PI / 3.0;
pub const WAVE_MAX_DAMAGE: f32 = 40.0;

/// Line-of-sight probes sample `OCCLUSION_STEPS + 1` points.
pub const OCCLUSION_STEPS: usize = 10;
pub const OCCLUSION_PROBE_RADIUS: f32 = 5.0;

pub const ATTACK_COOLDOWN_MS: u64 = 300;
pub const RESPAWN_DELAY_MS: u64 = 3000;
pub const SNAPSHOT_INTERVAL_MS: u64 = 50;

/// Combat stance of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mode {
    /// Slow, blocked by obstacles, narrow beam with a tunneling chance.
    #[default]
    Particle,
    /// Fast, passes through obstacles, wide cone with distance falloff.
    Wave,
}

impl Mode {
    /// Distance covered by a single move event.
    pub fn speed(self) -> f32 {
        match self {
            Mode::Particle => PARTICLE_SPEED,
            Mode::Wave => WAVE_SPEED,
        }
    }

    pub fn passes_obstacles(self) -> bool {
        matches!(self, Mode::Wave)
    }

    pub fn toggled(self) -> Mode {
        match self {
            Mode::Particle => Mode::Wave,
            Mode::Wave => Mode::Particle,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    PlayerJoin,
    PlayerMove {
        x: f32,
        y: f32,
        mode: Mode,
    },
    PlayerStateChange {
        mode: Mode,
    },
    /// `damage` is only a client-side estimate; the server recomputes it.
    PlayerAttack {
        target_id: SessionId,
        damage: u32,
        attacker_mode: Mode,
        angle: f32,
    },
    Disconnect,

    // Server -> client
    Welcome {
        session_id: SessionId,
    },
    PlayerUpdate {
        players: Vec<PlayerSnapshot>,
    },
    AttackResolved(AttackEvent),
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// True for packets a client may send to the server.
    pub fn is_server_bound(&self) -> bool {
        matches!(
            self,
            Packet::PlayerJoin
                | Packet::PlayerMove { .. }
                | Packet::PlayerStateChange { .. }
                | Packet::PlayerAttack { .. }
                | Packet::Disconnect
        )
    }
}

/// One entry of a `PlayerUpdate` snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub mode: Mode,
    pub energy: u32,
    /// Milliseconds since the epoch of the last authoritative change.
    pub timestamp: u64,
}

impl PlayerSnapshot {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn is_dead(&self) -> bool {
        self.energy == 0
    }
}

/// Outcome of a resolved attack, used by clients to trigger effects.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AttackEvent {
    pub attacker_id: SessionId,
    pub target_id: SessionId,
    pub damage: u32,
    pub attacker_mode: Mode,
    pub attack_angle: f32,
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
