use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-order lifecycle as the relayer sees it. `Cancelled` is observed from
/// the ledger rather than produced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderPhase {
    Received,
    Validating,
    Queued,
    Submitting,
    Confirming,
    Executed,
    Failed,
    TimedOut,
    Cancelled,
}

impl OrderPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderPhase::Executed | OrderPhase::Failed | OrderPhase::TimedOut | OrderPhase::Cancelled
        )
    }
}

/// One status transition, as published to WebSocket subscribers and folded
/// into the order store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_id: Uuid,
    pub status: OrderPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_amount_out: Option<u64>,
    /// Realized output-per-input price, 1e9 fixed point, as a string to keep
    /// JSON consumers honest about precision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Swap parameters as declared by the submitting client; checked against the
/// instruction actually carried by the transaction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    pub pool_id: String,
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub is_base_input: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    /// Base64-encoded signed (queued path) or partially-signed (fast path)
    /// transaction.
    pub transaction: String,
    pub swap: SwapParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    pub order_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub estimated_execution_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(OrderPhase::Executed.is_terminal());
        assert!(OrderPhase::Failed.is_terminal());
        assert!(OrderPhase::TimedOut.is_terminal());
        assert!(OrderPhase::Cancelled.is_terminal());
        for phase in [
            OrderPhase::Received,
            OrderPhase::Validating,
            OrderPhase::Queued,
            OrderPhase::Submitting,
            OrderPhase::Confirming,
        ] {
            assert!(!phase.is_terminal());
        }
    }

    #[test]
    fn status_update_omits_empty_fields() {
        let update = StatusUpdate {
            order_id: Uuid::nil(),
            status: OrderPhase::Queued,
            sequence: Some(4),
            signature: None,
            actual_amount_out: None,
            execution_price: None,
            error: None,
            at: Utc::now(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"sequence\":4"));
        assert!(!json.contains("signature"));
        assert!(!json.contains("executionPrice"));
    }
}
