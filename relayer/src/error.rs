use thiserror::Error;

/// Anchor error codes start here; the offsets below track the program's
/// error enum declaration order.
const PROGRAM_ERROR_BASE: u32 = 6000;
pub const CODE_UNAUTHORIZED: u32 = PROGRAM_ERROR_BASE;
pub const CODE_EMERGENCY_PAUSED: u32 = PROGRAM_ERROR_BASE + 2;
pub const CODE_POOL_INACTIVE: u32 = PROGRAM_ERROR_BASE + 3;
pub const CODE_OUT_OF_ORDER: u32 = PROGRAM_ERROR_BASE + 5;
pub const CODE_SLIPPAGE_EXCEEDED: u32 = PROGRAM_ERROR_BASE + 6;
pub const CODE_RELAYER_REQUIRED: u32 = PROGRAM_ERROR_BASE + 8;
pub const CODE_INVALID_ORDER_STATUS: u32 = PROGRAM_ERROR_BASE + 9;

#[derive(Debug, Error)]
pub enum RelayerError {
    /// Transport-level failure; the attempt may be retried.
    #[error("network error: {0}")]
    Network(String),

    /// No confirmation within the deadline. Never assume failure: the
    /// transaction may still have landed, so re-verify before acting.
    #[error("confirmation timed out for {0}")]
    Timeout(String),

    #[error("execution of sequence {0} rejected as out of order")]
    OutOfOrder(u64),

    #[error("slippage constraint violated for sequence {0}")]
    SlippageExceeded(u64),

    #[error("relayer signature missing or not authorized")]
    RelayerRequired,

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The ledger rejected the transaction for a reason that retrying the
    /// identical attempt cannot fix.
    #[error("ledger rejected: {0}")]
    LedgerRejected(String),

    #[error("pool {0} is not supported by this relayer")]
    UnsupportedPool(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayerError {
    /// Transient errors are retried with bounded backoff. Ledger rejections
    /// are terminal for the attempt but leave the order Pending on-ledger.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayerError::Network(_) | RelayerError::Timeout(_))
    }

    /// Maps a custom program error code surfaced by the RPC layer onto the
    /// relayer taxonomy.
    pub fn from_program_code(code: u32, sequence: u64) -> Self {
        match code {
            CODE_OUT_OF_ORDER | CODE_INVALID_ORDER_STATUS => RelayerError::OutOfOrder(sequence),
            CODE_SLIPPAGE_EXCEEDED => RelayerError::SlippageExceeded(sequence),
            CODE_RELAYER_REQUIRED | CODE_UNAUTHORIZED => RelayerError::RelayerRequired,
            other => RelayerError::LedgerRejected(format!("custom program error {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(RelayerError::Network("connection reset".into()).is_retryable());
        assert!(RelayerError::Timeout("sig".into()).is_retryable());
    }

    #[test]
    fn ledger_rejections_are_not_retryable() {
        assert!(!RelayerError::OutOfOrder(3).is_retryable());
        assert!(!RelayerError::SlippageExceeded(3).is_retryable());
        assert!(!RelayerError::RelayerRequired.is_retryable());
        assert!(!RelayerError::LedgerRejected("nope".into()).is_retryable());
    }

    #[test]
    fn program_codes_map_to_taxonomy() {
        assert!(matches!(
            RelayerError::from_program_code(CODE_OUT_OF_ORDER, 7),
            RelayerError::OutOfOrder(7)
        ));
        assert!(matches!(
            RelayerError::from_program_code(CODE_SLIPPAGE_EXCEEDED, 7),
            RelayerError::SlippageExceeded(7)
        ));
        assert!(matches!(
            RelayerError::from_program_code(CODE_RELAYER_REQUIRED, 7),
            RelayerError::RelayerRequired
        ));
        assert!(matches!(
            RelayerError::from_program_code(6999, 7),
            RelayerError::LedgerRejected(_)
        ));
    }
}
