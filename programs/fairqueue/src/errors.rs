use anchor_lang::prelude::*;

#[error_code]
pub enum SequencerError {
    #[msg("Caller is not authorized for this operation")]
    Unauthorized,

    #[msg("Sequencer state already initialized")]
    AlreadyInitialized,

    #[msg("Emergency pause is active")]
    EmergencyPaused,

    #[msg("Pool is not registered or inactive")]
    PoolInactive,

    #[msg("Invalid pool configuration")]
    InvalidPool,

    #[msg("Execution attempt is not the next unresolved order")]
    OutOfOrder,

    #[msg("Swap output below minimum amount out")]
    SlippageExceeded,

    #[msg("Sequence counter exhausted")]
    SequenceOverflow,

    #[msg("An authorized relayer signature is required")]
    RelayerRequired,

    #[msg("Order is not in the required status")]
    InvalidOrderStatus,

    #[msg("Amount must be greater than zero")]
    InvalidAmount,

    #[msg("Relayer already authorized")]
    RelayerAlreadyAuthorized,

    #[msg("Authorized relayer set is full")]
    RelayerSetFull,

    #[msg("Swap account manifest does not match the expected layout")]
    InvalidAccountManifest,

    #[msg("Arithmetic overflow")]
    NumericOverflow,
}
