//! HTTP and WebSocket surface of the relayer.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::sink::SinkExt;
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fairqueue::state::OrderStatus;

use crate::config::{parse_pubkey, RelayerConfig};
use crate::error::RelayerError;
use crate::ledger::SequencerLedger;
use crate::price::PoolPrice;
use crate::status::{Patch, StatusStore};
use crate::txcheck::{self, SwapMode};
use crate::types::{OrderPhase, SubmitOrderRequest, SubmitOrderResponse};

/// Rough per-order execution latency used for queue-position estimates.
const PER_ORDER_ESTIMATE_MS: u64 = 1_500;
const SUBMISSION_CONFIRM_POLL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StatusStore>,
    pub ledger: Arc<dyn SequencerLedger>,
    pub cfg: Arc<RelayerConfig>,
    pub program_id: solana_sdk::pubkey::Pubkey,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/info", get(info_handler))
        .route("/api/v1/orders", post(submit_order))
        .route("/api/v1/orders/{id}", get(get_order))
        .route("/api/v1/pools", get(list_pools))
        .route("/api/v1/pools/{id}/price", get(pool_price))
        .route("/api/v1/stats", get(stats))
        .route("/ws/orders/{id}", get(order_feed))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: String) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("relayer API listening on {}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Error envelope for the HTTP surface.
struct ApiError(RelayerError);

impl From<RelayerError> for ApiError {
    fn from(error: RelayerError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayerError::InvalidTransaction(_) | RelayerError::RelayerRequired => {
                StatusCode::BAD_REQUEST
            }
            RelayerError::OrderNotFound(_) | RelayerError::UnsupportedPool(_) => {
                StatusCode::NOT_FOUND
            }
            RelayerError::Network(_) | RelayerError::Timeout(_) => StatusCode::BAD_GATEWAY,
            RelayerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolInfo {
    pool_id: String,
    token_0_symbol: String,
    token_1_symbol: String,
}

async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pools: Vec<PoolInfo> = state
        .cfg
        .pools
        .iter()
        .map(|p| PoolInfo {
            pool_id: p.pool_id.clone(),
            token_0_symbol: p.token_0_symbol.clone(),
            token_1_symbol: p.token_1_symbol.clone(),
        })
        .collect();
    Json(json!({
        "relayer": state.ledger.identity().to_string(),
        "feeBps": state.cfg.fee_bps,
        "pools": pools,
    }))
}

async fn list_pools(State(state): State<AppState>) -> impl IntoResponse {
    let pools: Vec<PoolInfo> = state
        .cfg
        .pools
        .iter()
        .map(|p| PoolInfo {
            pool_id: p.pool_id.clone(),
            token_0_symbol: p.token_0_symbol.clone(),
            token_1_symbol: p.token_1_symbol.clone(),
        })
        .collect();
    Json(pools)
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.stats.snapshot())
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .store
        .get(id)
        .ok_or_else(|| RelayerError::OrderNotFound(id.to_string()))?;
    Ok(Json(order))
}

async fn pool_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pool_id = parse_pubkey(&id, "pool id")
        .map_err(|_| RelayerError::UnsupportedPool(id.clone()))?;
    let (balance_0, balance_1) = state.ledger.vault_balances(&pool_id).await?;
    Ok(Json(PoolPrice::from_balances(id, balance_0, balance_1)))
}

/// Order intake. The client ships a signed (queued) or partially-signed
/// (fast path) transaction; the relayer validates it against the declared
/// parameters, co-signs where the dual-signing protocol calls for it, and
/// broadcasts.
async fn submit_order(
    State(state): State<AppState>,
    Json(request): Json<SubmitOrderRequest>,
) -> Result<Json<SubmitOrderResponse>, ApiError> {
    let tx = txcheck::decode_transaction(&request.transaction)?;
    let parsed = txcheck::parse_swap_instruction(&tx, &state.program_id)?;
    txcheck::ensure_matches(&parsed, &request.swap)?;

    if !state
        .cfg
        .pools
        .iter()
        .any(|p| p.pool_id == parsed.pool_id.to_string())
    {
        return Err(RelayerError::UnsupportedPool(parsed.pool_id.to_string()).into());
    }

    let order_id = state.store.track(parsed.pool_id.to_string(), None);
    state
        .store
        .transition(order_id, OrderPhase::Validating, Patch::default());

    let fifo = state.ledger.fifo_state().await?;
    if fifo.emergency_pause {
        let error = RelayerError::LedgerRejected("emergency pause is active".into());
        state.store.transition(
            order_id,
            OrderPhase::Failed,
            Patch {
                error: Some(error.to_string()),
                ..Default::default()
            },
        );
        return Err(error.into());
    }

    match parsed.mode {
        SwapMode::Immediate => {
            if !txcheck::relayer_is_signer(&tx, &state.ledger.identity()) {
                let error = RelayerError::RelayerRequired;
                state.store.transition(
                    order_id,
                    OrderPhase::Failed,
                    Patch {
                        error: Some(error.to_string()),
                        ..Default::default()
                    },
                );
                return Err(error.into());
            }
            let signature = state.ledger.broadcast(tx, true).await?;
            state.store.transition(
                order_id,
                OrderPhase::Confirming,
                Patch {
                    signature: Some(signature.clone()),
                    ..Default::default()
                },
            );
            tokio::spawn(track_immediate(state.clone(), order_id, signature));
            Ok(Json(SubmitOrderResponse {
                order_id,
                sequence: None,
                estimated_execution_ms: PER_ORDER_ESTIMATE_MS,
            }))
        }
        SwapMode::Queued => {
            let signature = state.ledger.broadcast(tx, false).await?;
            state.store.transition(
                order_id,
                OrderPhase::Submitting,
                Patch {
                    signature: Some(signature.clone()),
                    ..Default::default()
                },
            );
            tokio::spawn(track_queued(state.clone(), order_id, signature));
            Ok(Json(SubmitOrderResponse {
                order_id,
                sequence: None,
                estimated_execution_ms: (fifo.queue_depth() + 1) * PER_ORDER_ESTIMATE_MS,
            }))
        }
    }
}

/// Follows a fast-path transaction to its terminal state.
async fn track_immediate(state: AppState, order_id: Uuid, signature: String) {
    let deadline = Instant::now() + state.cfg.confirm_timeout();
    loop {
        match state.ledger.confirm_signature(&signature).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(error) => debug!(%error, "immediate confirmation poll failed"),
        }
        if Instant::now() >= deadline {
            state.store.transition(
                order_id,
                OrderPhase::TimedOut,
                Patch {
                    error: Some(RelayerError::Timeout(signature).to_string()),
                    ..Default::default()
                },
            );
            return;
        }
        tokio::time::sleep(SUBMISSION_CONFIRM_POLL).await;
    }

    // Recover the assigned sequence, then the authoritative fill.
    let sequence = match state.ledger.transaction_sequence(&signature).await {
        Ok(sequence) => sequence,
        Err(error) => {
            warn!(%error, "could not recover sequence for immediate swap");
            None
        }
    };
    let mut patch = Patch {
        sequence,
        signature: Some(signature),
        ..Default::default()
    };
    if let Some(sequence) = sequence {
        if let Ok(Some(record)) = state.ledger.order_by_sequence(sequence).await {
            if record.status == OrderStatus::Executed {
                patch.actual_amount_out = Some(record.actual_amount_out);
                patch.execution_price = Some(record.execution_price);
            }
        }
    }
    state
        .store
        .transition(order_id, OrderPhase::Executed, patch);
}

/// Follows a queued submission until the order record exists, then hands off
/// to the execution engine.
async fn track_queued(state: AppState, order_id: Uuid, signature: String) {
    let deadline = Instant::now() + state.cfg.confirm_timeout();
    loop {
        match state.ledger.confirm_signature(&signature).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(error) => debug!(%error, "submission confirmation poll failed"),
        }
        if Instant::now() >= deadline {
            state.store.transition(
                order_id,
                OrderPhase::Failed,
                Patch {
                    error: Some("submission never confirmed".into()),
                    ..Default::default()
                },
            );
            return;
        }
        tokio::time::sleep(SUBMISSION_CONFIRM_POLL).await;
    }

    match state.ledger.transaction_sequence(&signature).await {
        Ok(Some(sequence)) => {
            state.store.assign_sequence(order_id, sequence);
            state.store.transition(
                order_id,
                OrderPhase::Queued,
                Patch {
                    sequence: Some(sequence),
                    ..Default::default()
                },
            );
        }
        Ok(None) => {
            state.store.transition(
                order_id,
                OrderPhase::Failed,
                Patch {
                    error: Some("confirmed submission carried no sequence".into()),
                    ..Default::default()
                },
            );
        }
        Err(error) => {
            warn!(%error, "could not recover sequence for queued order");
            state.store.transition(
                order_id,
                OrderPhase::Queued,
                Patch {
                    error: Some(error.to_string()),
                    ..Default::default()
                },
            );
        }
    }
}

/// WebSocket feed of one order's transitions, closed after a terminal state.
async fn order_feed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let (snapshot, rx) = state
        .store
        .subscribe(id)
        .ok_or_else(|| RelayerError::OrderNotFound(id.to_string()))?;
    Ok(upgrade.on_upgrade(move |socket| stream_order(socket, snapshot, rx)))
}

async fn stream_order(
    mut socket: WebSocket,
    snapshot: crate::status::TrackedOrder,
    mut rx: tokio::sync::broadcast::Receiver<crate::types::StatusUpdate>,
) {
    let opening = snapshot.as_update();
    let terminal_already = opening.status.is_terminal();
    if let Ok(frame) = serde_json::to_string(&opening) {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    if terminal_already {
        let _ = socket.close().await;
        return;
    }

    loop {
        tokio::select! {
            update = rx.recv() => {
                match update {
                    Ok(update) => {
                        let terminal = update.status.is_terminal();
                        match serde_json::to_string(&update) {
                            Ok(frame) => {
                                if socket.send(Message::Text(frame.into())).await.is_err() {
                                    return;
                                }
                            }
                            Err(error) => warn!(%error, "unserializable status update"),
                        }
                        if terminal {
                            let _ = socket.close().await;
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        let _ = socket.close().await;
                        return;
                    }
                }
            }
            incoming = socket.recv() => {
                // Any close (or error) from the client ends the feed.
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    _ => {}
                }
            }
        }
    }
}
