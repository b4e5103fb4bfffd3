//! Shared order store and status fan-out. Every lifecycle transition lands
//! here once, is folded into the snapshot, and is pushed to any WebSocket
//! subscribers of that order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{OrderPhase, StatusUpdate};

const CHANNEL_CAPACITY: usize = 64;

/// Current view of one order, merged over all transitions seen so far.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOrder {
    pub order_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub pool_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub status: OrderPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_amount_out: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedOrder {
    /// The current state reshaped as a push update (used as the opening
    /// frame of a WebSocket subscription).
    pub fn as_update(&self) -> StatusUpdate {
        StatusUpdate {
            order_id: self.order_id,
            status: self.status,
            sequence: self.sequence,
            signature: self.signature.clone(),
            actual_amount_out: self.actual_amount_out,
            execution_price: self.execution_price.clone(),
            error: self.error.clone(),
            at: self.updated_at,
        }
    }
}

/// Field deltas carried by a transition. Anything `None` leaves the stored
/// value untouched.
#[derive(Debug, Default, Clone)]
pub struct Patch {
    pub sequence: Option<u64>,
    pub signature: Option<String>,
    pub actual_amount_out: Option<u64>,
    pub execution_price: Option<u128>,
    pub error: Option<String>,
}

pub struct StatusStore {
    orders: DashMap<Uuid, TrackedOrder>,
    by_sequence: DashMap<u64, Uuid>,
    channels: DashMap<Uuid, broadcast::Sender<StatusUpdate>>,
    pub stats: RelayerStats,
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            by_sequence: DashMap::new(),
            channels: DashMap::new(),
            stats: RelayerStats::new(),
        }
    }

    /// Registers a new order in `Received` state and returns its id.
    pub fn track(&self, pool_id: String, user: Option<Pubkey>) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.orders.insert(
            id,
            TrackedOrder {
                order_id: id,
                sequence: None,
                pool_id,
                user: user.map(|u| u.to_string()),
                status: OrderPhase::Received,
                signature: None,
                actual_amount_out: None,
                execution_price: None,
                error: None,
                received_at: now,
                updated_at: now,
            },
        );
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Returns the tracked id for a sequence, creating an entry when the
    /// order was discovered on-ledger rather than submitted through the API.
    pub fn track_discovered(&self, sequence: u64, pool_id: String, user: Pubkey) -> Uuid {
        if let Some(existing) = self.by_sequence.get(&sequence) {
            return *existing.value();
        }
        let id = self.track(pool_id, Some(user));
        self.assign_sequence(id, sequence);
        id
    }

    pub fn assign_sequence(&self, id: Uuid, sequence: u64) {
        self.by_sequence.insert(sequence, id);
        if let Some(mut order) = self.orders.get_mut(&id) {
            order.sequence = Some(sequence);
        }
    }

    pub fn id_for_sequence(&self, sequence: u64) -> Option<Uuid> {
        self.by_sequence.get(&sequence).map(|r| *r.value())
    }

    pub fn get(&self, id: Uuid) -> Option<TrackedOrder> {
        self.orders.get(&id).map(|r| r.value().clone())
    }

    /// Applies a transition, publishes it, and updates the aggregate
    /// counters on terminal states.
    pub fn transition(&self, id: Uuid, status: OrderPhase, patch: Patch) {
        let update = {
            let Some(mut order) = self.orders.get_mut(&id) else {
                return;
            };
            order.status = status;
            order.updated_at = Utc::now();
            if let Some(sequence) = patch.sequence {
                order.sequence = Some(sequence);
            }
            if let Some(signature) = &patch.signature {
                order.signature = Some(signature.clone());
            }
            if let Some(amount) = patch.actual_amount_out {
                order.actual_amount_out = Some(amount);
            }
            if let Some(price) = patch.execution_price {
                order.execution_price = Some(price.to_string());
            }
            if let Some(error) = &patch.error {
                order.error = Some(error.clone());
            }
            StatusUpdate {
                order_id: id,
                status,
                sequence: order.sequence,
                signature: order.signature.clone(),
                actual_amount_out: order.actual_amount_out,
                execution_price: order.execution_price.clone(),
                error: patch.error,
                at: order.updated_at,
            }
        };
        if let Some(sequence) = patch.sequence {
            self.by_sequence.insert(sequence, id);
        }
        match status {
            OrderPhase::Executed => {
                self.stats.executed.fetch_add(1, Ordering::Relaxed);
            }
            OrderPhase::Failed => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
            OrderPhase::TimedOut => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            OrderPhase::Cancelled => {
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if let Some(tx) = self.channels.get(&id) {
            // Nobody listening is fine; the snapshot already holds the state.
            let _ = tx.send(update);
        }
    }

    /// Snapshot plus a live feed of subsequent transitions.
    pub fn subscribe(&self, id: Uuid) -> Option<(TrackedOrder, broadcast::Receiver<StatusUpdate>)> {
        let snapshot = self.get(id)?;
        let tx = self
            .channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Some((snapshot, tx.subscribe()))
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RelayerStats {
    pub received: AtomicU64,
    pub executed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub cancelled: AtomicU64,
    pub retries: AtomicU64,
    started: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub orders_received: u64,
    pub orders_executed: u64,
    pub orders_failed: u64,
    pub orders_timed_out: u64,
    pub orders_cancelled: u64,
    pub retries: u64,
    pub uptime_secs: u64,
}

impl RelayerStats {
    fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            orders_received: self.received.load(Ordering::Relaxed),
            orders_executed: self.executed.load(Ordering::Relaxed),
            orders_failed: self.failed.load(Ordering::Relaxed),
            orders_timed_out: self.timed_out.load(Ordering::Relaxed),
            orders_cancelled: self.cancelled.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_merge_into_snapshot() {
        let store = StatusStore::new();
        let id = store.track("pool".into(), None);
        store.transition(
            id,
            OrderPhase::Queued,
            Patch {
                sequence: Some(9),
                ..Default::default()
            },
        );
        store.transition(
            id,
            OrderPhase::Executed,
            Patch {
                signature: Some("sig".into()),
                actual_amount_out: Some(97),
                execution_price: Some(970_000_000),
                ..Default::default()
            },
        );
        let order = store.get(id).unwrap();
        assert_eq!(order.status, OrderPhase::Executed);
        assert_eq!(order.sequence, Some(9));
        assert_eq!(order.signature.as_deref(), Some("sig"));
        assert_eq!(order.actual_amount_out, Some(97));
        assert_eq!(order.execution_price.as_deref(), Some("970000000"));
        assert_eq!(store.id_for_sequence(9), Some(id));
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let store = StatusStore::new();
        let id = store.track("pool".into(), None);
        let (snapshot, mut rx) = store.subscribe(id).unwrap();
        assert_eq!(snapshot.status, OrderPhase::Received);

        store.transition(id, OrderPhase::Submitting, Patch::default());
        let update = rx.recv().await.unwrap();
        assert_eq!(update.status, OrderPhase::Submitting);
    }

    #[test]
    fn terminal_states_count_in_stats() {
        let store = StatusStore::new();
        for (phase, expect_executed, expect_failed) in [
            (OrderPhase::Executed, 1u64, 0u64),
            (OrderPhase::Failed, 1, 1),
        ] {
            let id = store.track("pool".into(), None);
            store.transition(id, phase, Patch::default());
            let stats = store.stats.snapshot();
            assert_eq!(stats.orders_executed, expect_executed);
            assert_eq!(stats.orders_failed, expect_failed);
        }
        assert_eq!(store.stats.snapshot().orders_received, 2);
    }

    #[test]
    fn discovered_orders_reuse_existing_entry() {
        let store = StatusStore::new();
        let user = Pubkey::new_unique();
        let a = store.track_discovered(5, "pool".into(), user);
        let b = store.track_discovered(5, "pool".into(), user);
        assert_eq!(a, b);
        assert_eq!(store.stats.snapshot().orders_received, 1);
    }
}
