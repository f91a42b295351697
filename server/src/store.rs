//! Authoritative entity state, keyed by session id.
//!
//! The map itself sits behind a read-write lock that is only taken for
//! writing on insert and remove. Every other operation holds the read lock
//! plus the mutex of the single entity it touches, so work on different ids
//! never serializes, and a removal waits for in-flight mutations of that id
//! before the id starts failing with [`StoreError::NotFound`].

use parking_lot::{Mutex, RwLock};
use shared::{now_millis, Mode, PlayerSnapshot, SessionId, Vec2, MAX_ENERGY};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity {0} already exists")]
    DuplicateEntity(SessionId),
    #[error("entity {0} does not exist")]
    NotFound(SessionId),
    #[error("entity {0} is dead")]
    Dead(SessionId),
    #[error("entity {0} is still on attack cooldown")]
    OnCooldown(SessionId),
}

/// One player's authoritative state.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: SessionId,
    pub position: Vec2,
    pub mode: Mode,
    /// Always within `0..=MAX_ENERGY`; zero means dead.
    pub energy: u32,
    /// Milliseconds since the epoch of the last mutation.
    pub last_update: u64,
    /// Start of the most recent attack that reached the hit check.
    pub last_attack: Option<Instant>,
}

impl Entity {
    pub fn new(id: SessionId, position: Vec2) -> Self {
        Self {
            id,
            position,
            mode: Mode::Particle,
            energy: MAX_ENERGY,
            last_update: now_millis(),
            last_attack: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.energy == 0
    }

    pub fn to_snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            mode: self.mode,
            energy: self.energy,
            timestamp: self.last_update,
        }
    }

    fn ensure_alive(&self) -> Result<(), StoreError> {
        if self.is_dead() {
            Err(StoreError::Dead(self.id))
        } else {
            Ok(())
        }
    }

    fn touch(&mut self) {
        self.last_update = now_millis();
    }
}

#[derive(Debug, Default)]
pub struct EntityStore {
    entities: RwLock<HashMap<SessionId, Mutex<Entity>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on one entity while holding its lock.
    fn with_entity<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Entity) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let entities = self.entities.read();
        let cell = entities.get(&id).ok_or(StoreError::NotFound(id))?;
        let mut entity = cell.lock();
        f(&mut entity)
    }

    /// Inserts a fresh entity with full energy in particle mode.
    pub(crate) fn create(&self, id: SessionId, spawn_point: Vec2) -> Result<Entity, StoreError> {
        let mut entities = self.entities.write();
        if entities.contains_key(&id) {
            return Err(StoreError::DuplicateEntity(id));
        }
        let entity = Entity::new(id, spawn_point);
        entities.insert(id, Mutex::new(entity.clone()));
        Ok(entity)
    }

    pub fn get(&self, id: SessionId) -> Option<Entity> {
        self.with_entity(id, |entity| Ok(entity.clone())).ok()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.entities.read().contains_key(&id)
    }

    pub(crate) fn remove(&self, id: SessionId) -> Option<Entity> {
        self.entities
            .write()
            .remove(&id)
            .map(|cell| cell.into_inner())
    }

    /// Copies every entity, ordered by id.
    ///
    /// Each entity is read under its own lock; the copy as a whole is not a
    /// transaction across entities.
    pub fn snapshot(&self) -> Vec<Entity> {
        let entities = self.entities.read();
        let mut copies: Vec<Entity> = entities.values().map(|cell| cell.lock().clone()).collect();
        copies.sort_by_key(|entity| entity.id);
        copies
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Moves a living entity. Obstacle legality is checked by the caller.
    pub(crate) fn apply_movement(
        &self,
        id: SessionId,
        position: Vec2,
        mode: Mode,
    ) -> Result<Entity, StoreError> {
        self.with_entity(id, |entity| {
            entity.ensure_alive()?;
            entity.position = position;
            entity.mode = mode;
            entity.touch();
            Ok(entity.clone())
        })
    }

    pub(crate) fn set_mode(&self, id: SessionId, mode: Mode) -> Result<Entity, StoreError> {
        self.with_entity(id, |entity| {
            entity.mode = mode;
            entity.touch();
            Ok(entity.clone())
        })
    }

    /// Subtracts energy, saturating at zero, and returns what is left.
    ///
    /// A dead entity takes no further damage.
    pub(crate) fn apply_damage(&self, id: SessionId, amount: u32) -> Result<u32, StoreError> {
        self.with_entity(id, |entity| {
            entity.ensure_alive()?;
            entity.energy = entity.energy.saturating_sub(amount).min(MAX_ENERGY);
            entity.touch();
            Ok(entity.energy)
        })
    }

    /// Restores a dead entity to full energy at `spawn_point`.
    pub(crate) fn respawn(&self, id: SessionId, spawn_point: Vec2) -> Result<Entity, StoreError> {
        self.with_entity(id, |entity| {
            entity.energy = MAX_ENERGY;
            entity.position = spawn_point;
            entity.touch();
            Ok(entity.clone())
        })
    }

    /// Claims the attacker's attack slot.
    ///
    /// Fails if the attacker is dead or attacked less than `cooldown` ago;
    /// otherwise stamps `now` and returns the attacker's state.
    pub(crate) fn begin_attack(
        &self,
        id: SessionId,
        now: Instant,
        cooldown: Duration,
    ) -> Result<Entity, StoreError> {
        self.with_entity(id, |entity| {
            entity.ensure_alive()?;
            if let Some(last) = entity.last_attack {
                if now.saturating_duration_since(last) < cooldown {
                    return Err(StoreError::OnCooldown(id));
                }
            }
            entity.last_attack = Some(now);
            Ok(entity.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn spawn() -> Vec2 {
        Vec2::new(50.0, 60.0)
    }

    #[test]
    fn test_create_entity_defaults() {
        let store = EntityStore::new();
        let entity = store.create(1, spawn()).unwrap();

        assert_eq!(entity.id, 1);
        assert_eq!(entity.position, spawn());
        assert_eq!(entity.mode, Mode::Particle);
        assert_eq!(entity.energy, MAX_ENERGY);
        assert!(entity.last_update > 0);
        assert!(!entity.is_dead());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();

        assert_eq!(store.create(1, Vec2::default()), Err(StoreError::DuplicateEntity(1)));
        assert_eq!(store.get(1).unwrap().position, spawn());
    }

    #[test]
    fn test_remove_then_operations_fail_closed() {
        let store = EntityStore::new();
        store.create(4, spawn()).unwrap();

        assert!(store.remove(4).is_some());
        assert!(store.remove(4).is_none());
        assert!(store.get(4).is_none());
        assert!(!store.contains(4));
        assert_eq!(store.apply_damage(4, 10), Err(StoreError::NotFound(4)));
        assert_eq!(store.respawn(4, spawn()), Err(StoreError::NotFound(4)));
        assert_eq!(
            store.apply_movement(4, spawn(), Mode::Wave),
            Err(StoreError::NotFound(4))
        );
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();

        assert_eq!(store.apply_damage(1, 40), Ok(60));
        assert_eq!(store.apply_damage(1, 500), Ok(0));
        assert!(store.get(1).unwrap().is_dead());
        // Dead entities take no further damage
        assert_eq!(store.apply_damage(1, 5), Err(StoreError::Dead(1)));
        assert_eq!(store.get(1).unwrap().energy, 0);
    }

    #[test]
    fn test_energy_stays_in_range_for_any_damage_sequence() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();

        for amount in [0, 1, 7, 15, 40, 99, u32::MAX] {
            let _ = store.apply_damage(1, amount);
            let energy = store.get(1).unwrap().energy;
            assert!(energy <= MAX_ENERGY);
            if energy == 0 {
                store.respawn(1, spawn()).unwrap();
            }
        }
    }

    #[test]
    fn test_dead_entity_cannot_move() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();
        store.apply_damage(1, MAX_ENERGY).unwrap();

        assert_eq!(
            store.apply_movement(1, Vec2::new(70.0, 70.0), Mode::Particle),
            Err(StoreError::Dead(1))
        );
        assert_eq!(store.get(1).unwrap().position, spawn());
    }

    #[test]
    fn test_movement_updates_position_and_mode() {
        let store = EntityStore::new();
        let created = store.create(1, spawn()).unwrap();

        let moved = store.apply_movement(1, Vec2::new(55.0, 60.0), Mode::Wave).unwrap();
        assert_eq!(moved.position, Vec2::new(55.0, 60.0));
        assert_eq!(moved.mode, Mode::Wave);
        assert!(moved.last_update >= created.last_update);
    }

    #[test]
    fn test_respawn_restores_full_energy() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();
        store.apply_damage(1, MAX_ENERGY).unwrap();

        let respawned = store.respawn(1, Vec2::new(900.0, 900.0)).unwrap();
        assert_eq!(respawned.energy, MAX_ENERGY);
        assert_eq!(respawned.position, Vec2::new(900.0, 900.0));
        assert!(!respawned.is_dead());
    }

    #[test]
    fn test_attack_cooldown() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();
        let cooldown = Duration::from_millis(300);
        let start = Instant::now();

        assert!(store.begin_attack(1, start, cooldown).is_ok());
        assert_eq!(
            store.begin_attack(1, start + Duration::from_millis(299), cooldown),
            Err(StoreError::OnCooldown(1))
        );
        assert!(store
            .begin_attack(1, start + Duration::from_millis(300), cooldown)
            .is_ok());
    }

    #[test]
    fn test_dead_attacker_cannot_begin_attack() {
        let store = EntityStore::new();
        store.create(1, spawn()).unwrap();
        store.apply_damage(1, MAX_ENERGY).unwrap();

        assert_eq!(
            store.begin_attack(1, Instant::now(), Duration::from_millis(300)),
            Err(StoreError::Dead(1))
        );
    }

    #[test]
    fn test_snapshot_contains_each_entity_once() {
        let store = EntityStore::new();
        for id in [3, 1, 2] {
            store.create(id, spawn()).unwrap();
        }

        let snapshot = store.snapshot();
        let ids: Vec<SessionId> = snapshot.iter().map(|entity| entity.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshot[0].to_snapshot().energy, MAX_ENERGY);
    }

    #[test]
    fn test_concurrent_damage_is_serialized_per_entity() {
        let store = Arc::new(EntityStore::new());
        store.create(1, spawn()).unwrap();
        store.create(2, spawn()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..5 {
                        let _ = store.apply_damage(1 + (i % 2), 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(1).unwrap().energy, MAX_ENERGY - 20);
        assert_eq!(store.get(2).unwrap().energy, MAX_ENERGY - 20);
    }
}
