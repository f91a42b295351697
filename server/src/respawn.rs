//! Deferred respawns of killed entities.
//!
//! Every pending respawn is a tokio task tracked by entity id. Disconnecting
//! aborts it, and a respawn that fires anyway re-checks that the entity
//! still exists and is still dead before touching it.

use crate::broadcast::Broadcaster;
use crate::store::EntityStore;
use log::{debug, info};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use shared::{ObstacleRegistry, SessionId, PLAYER_RADIUS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct RespawnScheduler {
    store: Arc<EntityStore>,
    broadcaster: Arc<Broadcaster>,
    obstacles: Arc<ObstacleRegistry>,
    rng: Mutex<StdRng>,
    delay: Duration,
    pending: Mutex<HashMap<SessionId, JoinHandle<()>>>,
}

impl RespawnScheduler {
    pub fn new(
        store: Arc<EntityStore>,
        broadcaster: Arc<Broadcaster>,
        obstacles: Arc<ObstacleRegistry>,
        delay: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            broadcaster,
            obstacles,
            rng: Mutex::new(rng),
            delay,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Respawns `id` after the configured delay, replacing any earlier
    /// pending respawn for the same id.
    pub fn schedule(self: &Arc<Self>, id: SessionId) {
        let scheduler = Arc::clone(self);
        let delay = self.delay;

        let mut pending = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.respawn_now(id);
        });
        if let Some(previous) = pending.insert(id, handle) {
            previous.abort();
        }
        debug!("Respawn of entity {} scheduled in {:?}", id, delay);
    }

    /// Aborts the pending respawn of `id`, if any.
    pub fn cancel(&self, id: SessionId) -> bool {
        match self.pending.lock().remove(&id) {
            Some(handle) => {
                handle.abort();
                debug!("Cancelled pending respawn of entity {}", id);
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Brings a dead entity back at a fresh spawn point.
    ///
    /// No-op when the entity is gone or alive.
    pub(crate) fn respawn_now(&self, id: SessionId) -> bool {
        self.pending.lock().remove(&id);

        match self.store.get(id) {
            Some(entity) if entity.is_dead() => {}
            Some(_) => return false,
            None => {
                debug!("Entity {} left before its respawn, skipping", id);
                return false;
            }
        }

        let spawn_point = {
            let mut rng = self.rng.lock();
            self.obstacles.find_spawn_point(&mut *rng, PLAYER_RADIUS)
        };

        match self.store.respawn(id, spawn_point) {
            Ok(entity) => {
                info!(
                    "Entity {} respawned at ({:.1}, {:.1})",
                    id, entity.position.x, entity.position.y
                );
                self.broadcaster.broadcast_snapshot(&self.store);
                true
            }
            Err(e) => {
                debug!("Respawn of entity {} dropped: {}", id, e);
                false
            }
        }
    }
}
