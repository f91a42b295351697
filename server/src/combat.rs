//! Attack resolution.
//!
//! Clients declare intent only: who they aim at and in which direction. Hit
//! detection, damage, occlusion and cooldowns are all decided here against
//! the authoritative store. Every rejected attack is dropped silently.

use crate::broadcast::Broadcaster;
use crate::respawn::RespawnScheduler;
use crate::store::EntityStore;
use log::{debug, info};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use shared::geometry::{angle_between, distance, wrap_angle};
use shared::{
    AttackEvent, Mode, ObstacleRegistry, Packet, SessionId, OCCLUSION_PROBE_RADIUS,
    OCCLUSION_STEPS, PARTICLE_DAMAGE, PARTICLE_HALF_ANGLE, PARTICLE_RANGE, TUNNEL_CHANCE,
    WAVE_HALF_ANGLE, WAVE_MAX_DAMAGE, WAVE_RANGE,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A decoded `PlayerAttack`, tagged with the sender's session id.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackRequest {
    pub attacker_id: SessionId,
    pub target_id: SessionId,
    /// Client-side damage estimate, logged and otherwise ignored.
    pub declared_damage: u32,
    pub declared_mode: Mode,
    /// Aim direction in radians.
    pub angle: f32,
}

/// Damage of a wave attack landing at `distance`.
///
/// Falls off linearly from 40 at point blank to 0 at the range limit.
pub fn wave_damage(distance: f32) -> u32 {
    if distance >= WAVE_RANGE {
        return 0;
    }
    (WAVE_MAX_DAMAGE * (1.0 - distance / WAVE_RANGE)).floor().max(0.0) as u32
}

/// Pure hit rule, without occlusion.
///
/// `tunnel_roll` is a uniform draw in `[0, 1)`; it only matters for particle
/// attacks outside the beam. A wave hit that rounds down to zero damage is a
/// miss.
pub fn hit_damage(mode: Mode, distance: f32, angle_diff: f32, tunnel_roll: f32) -> Option<u32> {
    match mode {
        Mode::Particle => {
            let in_beam = distance < PARTICLE_RANGE && angle_diff.abs() < PARTICLE_HALF_ANGLE;
            if in_beam || tunnel_roll < TUNNEL_CHANCE {
                Some(PARTICLE_DAMAGE)
            } else {
                None
            }
        }
        Mode::Wave => {
            if distance < WAVE_RANGE && angle_diff.abs() < WAVE_HALF_ANGLE {
                Some(wave_damage(distance)).filter(|damage| *damage > 0)
            } else {
                None
            }
        }
    }
}

pub struct CombatResolver {
    store: Arc<EntityStore>,
    obstacles: Arc<ObstacleRegistry>,
    broadcaster: Arc<Broadcaster>,
    respawns: Arc<RespawnScheduler>,
    cooldown: Duration,
    rng: Mutex<StdRng>,
}

impl CombatResolver {
    pub fn new(
        store: Arc<EntityStore>,
        obstacles: Arc<ObstacleRegistry>,
        broadcaster: Arc<Broadcaster>,
        respawns: Arc<RespawnScheduler>,
        cooldown: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            obstacles,
            broadcaster,
            respawns,
            cooldown,
            rng: Mutex::new(rng),
        }
    }

    /// Resolves an attack arriving now.
    ///
    /// Returns the broadcast event on a hit, None for any dropped attack.
    pub fn resolve(&self, request: &AttackRequest) -> Option<AttackEvent> {
        self.resolve_at(request, Instant::now())
    }

    pub(crate) fn resolve_at(&self, request: &AttackRequest, now: Instant) -> Option<AttackEvent> {
        if request.attacker_id == request.target_id {
            debug!("Session {} attacked itself, dropping", request.attacker_id);
            return None;
        }

        let target = match self.store.get(request.target_id) {
            Some(target) if !target.is_dead() => target,
            _ => {
                debug!(
                    "Attack by {} on missing or dead target {} dropped",
                    request.attacker_id, request.target_id
                );
                return None;
            }
        };

        // Stamps the cooldown even if the attack goes on to miss
        let attacker = match self.store.begin_attack(request.attacker_id, now, self.cooldown) {
            Ok(attacker) => attacker,
            Err(e) => {
                debug!("Attack by {} dropped: {}", request.attacker_id, e);
                return None;
            }
        };

        if attacker.mode != request.declared_mode {
            debug!(
                "Session {} declared {:?} but is in {:?}",
                attacker.id, request.declared_mode, attacker.mode
            );
        }

        let distance = distance(attacker.position, target.position);
        let angle_diff = wrap_angle(angle_between(attacker.position, target.position) - request.angle);
        let tunnel_roll = match attacker.mode {
            Mode::Particle => self.rng.lock().gen::<f32>(),
            Mode::Wave => 1.0,
        };

        let damage = hit_damage(attacker.mode, distance, angle_diff, tunnel_roll)?;

        if attacker.mode == Mode::Particle
            && self.obstacles.blocks_line(
                attacker.position,
                target.position,
                OCCLUSION_STEPS,
                OCCLUSION_PROBE_RADIUS,
            )
        {
            debug!(
                "Particle attack by {} on {} occluded",
                attacker.id, target.id
            );
            return None;
        }

        if request.declared_damage != damage {
            debug!(
                "Session {} declared {} damage, applying {}",
                attacker.id, request.declared_damage, damage
            );
        }

        // The target may have died or left since it was read
        let remaining = match self.store.apply_damage(target.id, damage) {
            Ok(remaining) => remaining,
            Err(e) => {
                debug!("Damage from {} dropped: {}", attacker.id, e);
                return None;
            }
        };

        if remaining == 0 {
            info!("Entity {} was killed by {}", target.id, attacker.id);
            self.respawns.schedule(target.id);
        }

        let event = AttackEvent {
            attacker_id: attacker.id,
            target_id: target.id,
            damage,
            attacker_mode: attacker.mode,
            attack_angle: request.angle,
        };
        self.broadcaster
            .broadcast(Packet::AttackResolved(event.clone()));
        self.broadcaster.broadcast_snapshot(&self.store);
        Some(event)
    }
}
