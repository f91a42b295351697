//! Server configuration

use shared::{ATTACK_COOLDOWN_MS, RESPAWN_DELAY_MS, SNAPSHOT_INTERVAL_MS};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Shortest snapshot period the broadcaster will run at
pub const MIN_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(1);

/// Highest accepted tick rate, matching [`MIN_SNAPSHOT_INTERVAL`]
pub const MAX_TICK_RATE: u32 = 1000;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: SocketAddr,
    /// Period of the full-state snapshot broadcast
    pub snapshot_interval: Duration,
    /// Maximum concurrent sessions
    pub max_clients: usize,
    /// Minimum time between two attacks of one attacker
    pub attack_cooldown: Duration,
    /// Time a killed entity stays dead
    pub respawn_delay: Duration,
    /// Packets buffered per session before broadcasts to it are dropped
    pub outbound_queue: usize,
    /// Seed for spawn points and tunneling rolls; random when unset
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            snapshot_interval: Duration::from_millis(SNAPSHOT_INTERVAL_MS),
            max_clients: 64,
            attack_cooldown: Duration::from_millis(ATTACK_COOLDOWN_MS),
            respawn_delay: Duration::from_millis(RESPAWN_DELAY_MS),
            outbound_queue: 256,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Snapshot period for a tick rate in Hz, clamped to 1..=MAX_TICK_RATE.
    pub fn interval_for_tick_rate(tick_rate: u32) -> Duration {
        let hz = tick_rate.clamp(1, MAX_TICK_RATE);
        Duration::from_micros(1_000_000 / u64::from(hz)).max(MIN_SNAPSHOT_INTERVAL)
    }
}
