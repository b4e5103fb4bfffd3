//! The FIFO execution engine. A single dispatcher drives the head of the
//! global queue: the ledger's watermark decides what runs next, the engine
//! just mirrors it faithfully and absorbs transport noise (retries,
//! timeouts, races with other relayers).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use fairqueue::state::OrderStatus;

use crate::config::{RelayerConfig, RetryConfig};
use crate::error::RelayerError;
use crate::ledger::{OrderSnapshot, SequencerLedger};
use crate::status::{Patch, StatusStore};
use crate::types::OrderPhase;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub confirm_timeout: Duration,
    pub confirm_poll: Duration,
    pub retry: RetryConfig,
}

impl EngineConfig {
    pub fn from_relayer_config(cfg: &RelayerConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            confirm_timeout: cfg.confirm_timeout(),
            confirm_poll: Duration::from_millis(500),
            retry: cfg.retry.clone(),
        }
    }
}

/// What a single dispatch pass did; exposed for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue empty.
    Idle,
    /// The head order's record is not visible yet (RPC lag).
    AwaitingRecord(u64),
    Executed(u64),
    /// Terminal head released past the watermark.
    Released(u64),
    /// Attempt ended without resolving the order; it stays Pending
    /// on-ledger for a later pass.
    AttemptAbandoned(u64),
    CancelledDetected(u64),
    TimedOut(u64),
}

pub struct ExecutionEngine<L: ?Sized> {
    ledger: Arc<L>,
    store: Arc<StatusStore>,
    cfg: EngineConfig,
}

impl<L: SequencerLedger + ?Sized> ExecutionEngine<L> {
    pub fn new(ledger: Arc<L>, store: Arc<StatusStore>, cfg: EngineConfig) -> Self {
        Self { ledger, store, cfg }
    }

    /// Dispatcher loop. Runs until shutdown flips; the single-task design is
    /// what serializes execution attempts per sequence.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("execution engine started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("execution engine stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.cfg.poll_interval) => {
                    match self.tick().await {
                        Ok(TickOutcome::Idle) | Ok(TickOutcome::AwaitingRecord(_)) => {}
                        Ok(outcome) => debug!(?outcome, "dispatch pass finished"),
                        Err(error) => warn!(%error, "dispatch pass failed"),
                    }
                }
            }
        }
    }

    /// One dispatch pass over the queue head.
    pub async fn tick(&self) -> Result<TickOutcome, RelayerError> {
        let fifo = self.ledger.fifo_state().await?;
        if fifo.next_execution > fifo.current_sequence {
            return Ok(TickOutcome::Idle);
        }
        let head = fifo.next_execution;
        let Some(order) = self.ledger.order_by_sequence(head).await? else {
            return Ok(TickOutcome::AwaitingRecord(head));
        };
        match order.status {
            OrderStatus::Pending => self.attempt_execution(order).await,
            // Cancelled by the submitter, or filled by the fast path; either
            // way the watermark has to move past it.
            OrderStatus::Cancelled | OrderStatus::Executed => self.release_head(order).await,
        }
    }

    async fn release_head(&self, order: OrderSnapshot) -> Result<TickOutcome, RelayerError> {
        if order.status == OrderStatus::Cancelled {
            if let Some(id) = self.store.id_for_sequence(order.sequence) {
                self.store
                    .transition(id, OrderPhase::Cancelled, Patch::default());
            }
        }
        match self.ledger.release_sequence(&order).await {
            Ok(_) => Ok(TickOutcome::Released(order.sequence)),
            // Another relayer released it first; the next pass re-syncs.
            Err(RelayerError::OutOfOrder(_)) => Ok(TickOutcome::Released(order.sequence)),
            Err(error) => Err(error),
        }
    }

    async fn attempt_execution(&self, order: OrderSnapshot) -> Result<TickOutcome, RelayerError> {
        let id = self
            .store
            .track_discovered(order.sequence, order.pool_id.to_string(), order.user);
        self.store.transition(
            id,
            OrderPhase::Submitting,
            Patch {
                sequence: Some(order.sequence),
                ..Default::default()
            },
        );

        let mut attempt = 0u32;
        loop {
            match self.ledger.execute_order(&order).await {
                Ok(signature) => {
                    self.store.transition(
                        id,
                        OrderPhase::Confirming,
                        Patch {
                            signature: Some(signature.clone()),
                            ..Default::default()
                        },
                    );
                    return self.await_confirmation(id, &order, signature).await;
                }
                Err(error) if error.is_retryable() => {
                    attempt += 1;
                    if attempt >= self.cfg.retry.max_attempts {
                        warn!(
                            sequence = order.sequence,
                            %error,
                            "giving up after {} attempts",
                            attempt
                        );
                        self.store.transition(
                            id,
                            OrderPhase::Queued,
                            Patch {
                                error: Some(format!("retries exhausted: {error}")),
                                ..Default::default()
                            },
                        );
                        return Ok(TickOutcome::AttemptAbandoned(order.sequence));
                    }
                    self.store.stats.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(self.cfg.retry.delay_for(attempt)).await;
                    // A cancellation may have landed while we were backing
                    // off; stop retrying a dead order.
                    if let Some(fresh) = self.ledger.order_by_sequence(order.sequence).await? {
                        if fresh.status == OrderStatus::Cancelled {
                            self.store
                                .transition(id, OrderPhase::Cancelled, Patch::default());
                            return Ok(TickOutcome::CancelledDetected(order.sequence));
                        }
                    }
                }
                // Lost the race: some other relayer resolved the head. The
                // next pass reads the fresh watermark.
                Err(RelayerError::OutOfOrder(_)) => {
                    debug!(sequence = order.sequence, "execution raced, resyncing");
                    return Ok(TickOutcome::AttemptAbandoned(order.sequence));
                }
                // Ledger said no (slippage and friends). The order stays
                // Pending on-ledger; surface the reason and leave it for a
                // later attempt or a user cancellation.
                Err(error) => {
                    self.store.transition(
                        id,
                        OrderPhase::Queued,
                        Patch {
                            error: Some(error.to_string()),
                            ..Default::default()
                        },
                    );
                    return Ok(TickOutcome::AttemptAbandoned(order.sequence));
                }
            }
        }
    }

    async fn await_confirmation(
        &self,
        id: uuid::Uuid,
        order: &OrderSnapshot,
        signature: String,
    ) -> Result<TickOutcome, RelayerError> {
        let deadline = Instant::now() + self.cfg.confirm_timeout;
        loop {
            match self.ledger.confirm_signature(&signature).await {
                Ok(true) => return self.finalize(id, order, signature).await,
                Ok(false) => {}
                // Transport noise while polling is not a verdict.
                Err(error) => debug!(%error, "confirmation poll failed"),
            }
            if Instant::now() >= deadline {
                // The transaction may have landed after the deadline; the
                // ledger, not the clock, decides.
                match self.ledger.order_by_sequence(order.sequence).await? {
                    Some(fresh) if fresh.status == OrderStatus::Executed => {
                        return self.finalize(id, order, signature).await;
                    }
                    Some(fresh) if fresh.status == OrderStatus::Cancelled => {
                        self.store
                            .transition(id, OrderPhase::Cancelled, Patch::default());
                        return Ok(TickOutcome::CancelledDetected(order.sequence));
                    }
                    _ => {
                        self.store.transition(
                            id,
                            OrderPhase::TimedOut,
                            Patch {
                                error: Some(RelayerError::Timeout(signature).to_string()),
                                ..Default::default()
                            },
                        );
                        return Ok(TickOutcome::TimedOut(order.sequence));
                    }
                }
            }
            tokio::time::sleep(self.cfg.confirm_poll).await;
        }
    }

    /// Reads the authoritative fill off the order record and publishes the
    /// terminal transition.
    async fn finalize(
        &self,
        id: uuid::Uuid,
        order: &OrderSnapshot,
        signature: String,
    ) -> Result<TickOutcome, RelayerError> {
        let fresh = self.ledger.order_by_sequence(order.sequence).await?;
        let (amount_out, price) = match fresh {
            Some(record) if record.status == OrderStatus::Executed => {
                (Some(record.actual_amount_out), Some(record.execution_price))
            }
            _ => (None, None),
        };
        self.store.transition(
            id,
            OrderPhase::Executed,
            Patch {
                signature: Some(signature),
                actual_amount_out: amount_out,
                execution_price: price,
                ..Default::default()
            },
        );
        info!(sequence = order.sequence, ?amount_out, "order executed");
        Ok(TickOutcome::Executed(order.sequence))
    }
}
