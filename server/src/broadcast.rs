//! Fan-out of packets to every connected session.
//!
//! Each session owns a bounded outbound queue drained by its connection's
//! writer task. Broadcasting only ever uses `try_send`, so a session whose
//! queue is full loses that packet and nobody else waits for it. Queues carry
//! `Arc<Packet>` so one snapshot is shared by every recipient.

use crate::config::MIN_SNAPSHOT_INTERVAL;
use crate::store::EntityStore;
use log::{debug, info};
use parking_lot::RwLock;
use shared::{Packet, PlayerSnapshot, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};

/// Sending half of a session's outbound queue.
pub type Outbox = mpsc::Sender<Arc<Packet>>;

#[derive(Debug, Default)]
pub struct Broadcaster {
    recipients: RwLock<HashMap<SessionId, Outbox>>,
    ticks: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recipient unless `capacity` sessions are already registered.
    pub fn register(
        &self,
        id: SessionId,
        outbox: Outbox,
        capacity: usize,
    ) -> bool {
        let mut recipients = self.recipients.write();
        if recipients.len() >= capacity {
            return false;
        }
        recipients.insert(id, outbox);
        true
    }

    pub fn unregister(&self, id: SessionId) -> bool {
        self.recipients.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.recipients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.read().is_empty()
    }

    /// Number of timer-driven snapshot ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn send_to(&self, id: SessionId, packet: Packet) -> bool {
        let outbox = self.recipients.read().get(&id).cloned();
        match outbox {
            Some(outbox) => self.deliver(id, &outbox, Arc::new(packet)),
            None => false,
        }
    }

    /// Queues `packet` for every recipient and returns how many accepted it.
    pub fn broadcast(&self, packet: Packet) -> usize {
        let recipients: Vec<(SessionId, Outbox)> = self
            .recipients
            .read()
            .iter()
            .map(|(id, outbox)| (*id, outbox.clone()))
            .collect();

        let shared = Arc::new(packet);
        let mut delivered = 0;
        for (id, outbox) in &recipients {
            if self.deliver(*id, outbox, Arc::clone(&shared)) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Broadcasts the current state of every entity.
    pub fn broadcast_snapshot(&self, store: &EntityStore) -> usize {
        let players: Vec<PlayerSnapshot> = store
            .snapshot()
            .iter()
            .map(|entity| entity.to_snapshot())
            .collect();
        self.broadcast(Packet::PlayerUpdate { players })
    }

    fn deliver(&self, id: SessionId, outbox: &Outbox, packet: Arc<Packet>) -> bool {
        match outbox.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue of session {} is full, dropping packet", id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Session {} stopped receiving, unregistering", id);
                self.unregister(id);
                false
            }
        }
    }
}

/// Broadcasts a full snapshot every `period` until the task is dropped.
///
/// Periods shorter than [`MIN_SNAPSHOT_INTERVAL`] are raised to it.
pub async fn run_snapshot_loop(
    broadcaster: Arc<Broadcaster>,
    store: Arc<EntityStore>,
    period: Duration,
) {
    let period = period.max(MIN_SNAPSHOT_INTERVAL);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        "Snapshot broadcaster running at {:.1}Hz",
        1.0 / period.as_secs_f32()
    );

    loop {
        ticker.tick().await;
        let tick = broadcaster.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let delivered = broadcaster.broadcast_snapshot(&store);

        // Periodic monitoring
        if tick % 200 == 0 {
            debug!(
                "Tick {}: {} entities, delivered to {} sessions",
                tick,
                store.len(),
                delivered
            );
        }
    }
}
