use anchor_lang::prelude::*;

use crate::errors::SequencerError;

/// Fixed-point scale for recorded execution prices (output units per input
/// unit, scaled by 1e9).
pub const PRICE_SCALE: u128 = 1_000_000_000;

/// Upper bound on the authorized relayer set; keeps `FifoState` rent-exempt
/// at a fixed size.
pub const MAX_RELAYERS: usize = 16;

/// Global sequencer singleton. One instance for the whole program, covering
/// every registered pool: sequence numbers are assigned from a single counter
/// so ordering cannot be gamed across pools.
#[account]
pub struct FifoState {
    /// Last sequence number handed out. Zero until the first order.
    pub current_sequence: u64,
    /// Lowest sequence number not yet resolved by the execution path.
    /// Everything below this is Executed or Cancelled-and-released.
    pub next_execution: u64,
    pub admin: Pubkey,
    pub authorized_relayers: Vec<Pubkey>,
    pub emergency_pause: bool,
}

impl FifoState {
    pub const LEN: usize = 8 + 8 + 8 + 32 + (4 + 32 * MAX_RELAYERS) + 1;

    pub fn is_authorized_relayer(&self, key: &Pubkey) -> bool {
        self.authorized_relayers.iter().any(|r| r == key)
    }
}

/// Per-pool registration record. `pool_authority` is the PDA the AMM pool's
/// vaults must be re-keyed to at pool creation time; the program never holds
/// a private key for it.
#[account]
pub struct PoolRegistryEntry {
    pub pool_id: Pubkey,
    pub token_0: Pubkey,
    pub token_1: Pubkey,
    pub pool_authority: Pubkey,
    /// The AMM program this pool lives in. Execution refuses to CPI any
    /// other program under the pool authority's signature.
    pub amm_program: Pubkey,
    pub created_at: i64,
    pub is_active: bool,
}

impl PoolRegistryEntry {
    pub const LEN: usize = 8 + 32 + 32 + 32 + 32 + 32 + 8 + 1;
}

/// One record per submitted swap, keyed by (submitter, sequence). Created
/// Pending, moved exactly once to a terminal state, immutable after that.
#[account]
pub struct OrderRecord {
    pub sequence: u64,
    pub user: Pubkey,
    pub pool_id: Pubkey,
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub is_base_input: bool,
    pub status: OrderStatus,
    pub submitted_at: i64,
    pub executed_at: Option<i64>,
    pub actual_amount_out: u64,
    /// Realized output-per-input price scaled by [`PRICE_SCALE`]. Zero until
    /// executed.
    pub execution_price: u128,
}

impl OrderRecord {
    pub const LEN: usize = 8 + 8 + 32 + 32 + 8 + 8 + 1 + 1 + 8 + 9 + 8 + 16;

    /// Marks the order Executed and records the realized fill.
    pub fn record_fill(&mut self, amount_out: u64, now: i64) -> Result<()> {
        self.status = OrderStatus::Executed;
        self.executed_at = Some(now);
        self.actual_amount_out = amount_out;
        self.execution_price = fill_price(self.amount_in, amount_out)?;
        Ok(())
    }
}

/// Output-per-input price scaled by [`PRICE_SCALE`].
pub fn fill_price(amount_in: u64, amount_out: u64) -> Result<u128> {
    if amount_in == 0 {
        return err!(SequencerError::InvalidAmount);
    }
    Ok((amount_out as u128) * PRICE_SCALE / (amount_in as u128))
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
}

#[event]
pub struct OrderSubmitted {
    pub sequence: u64,
    pub user: Pubkey,
    pub pool_id: Pubkey,
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub is_base_input: bool,
}

#[event]
pub struct OrderExecuted {
    pub sequence: u64,
    pub user: Pubkey,
    pub pool_id: Pubkey,
    pub amount_out: u64,
    pub execution_price: u128,
    pub executor: Pubkey,
}

#[event]
pub struct OrderCancelled {
    pub sequence: u64,
    pub user: Pubkey,
}

#[event]
pub struct CancelledReleased {
    pub sequence: u64,
    pub executor: Pubkey,
}

#[event]
pub struct ImmediateSwapExecuted {
    pub sequence: u64,
    pub user: Pubkey,
    pub pool_id: Pubkey,
    pub amount_in: u64,
    pub amount_out: u64,
    pub relayer: Pubkey,
}

#[event]
pub struct PoolRegistered {
    pub pool_id: Pubkey,
    pub pool_authority: Pubkey,
    pub token_0: Pubkey,
    pub token_1: Pubkey,
}

#[event]
pub struct PoolStatusChanged {
    pub pool_id: Pubkey,
    pub is_active: bool,
}

#[event]
pub struct RelayerAdded {
    pub relayer: Pubkey,
}

#[event]
pub struct RelayerRemoved {
    pub relayer: Pubkey,
}

#[event]
pub struct EmergencyPauseSet {
    pub paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_price_scales_output_per_input() {
        // 97 out for 100 in: 0.97 scaled by 1e9
        assert_eq!(fill_price(100, 97).unwrap(), 970_000_000);
        assert_eq!(fill_price(5, 5).unwrap(), PRICE_SCALE);
        assert_eq!(fill_price(100, 200).unwrap(), 2 * PRICE_SCALE);
    }

    #[test]
    fn fill_price_truncates_toward_zero() {
        assert_eq!(fill_price(3, 1).unwrap(), 333_333_333);
    }

    #[test]
    fn fill_price_rejects_zero_input() {
        assert!(fill_price(0, 1).is_err());
    }

    #[test]
    fn fill_price_handles_extreme_amounts() {
        // u64::MAX * 1e9 stays comfortably inside u128
        assert_eq!(
            fill_price(1, u64::MAX).unwrap(),
            (u64::MAX as u128) * PRICE_SCALE
        );
    }

    #[test]
    fn record_fill_is_terminal_and_stamped() {
        let mut order = OrderRecord {
            sequence: 1,
            user: Pubkey::new_unique(),
            pool_id: Pubkey::new_unique(),
            amount_in: 100,
            min_amount_out: 95,
            is_base_input: true,
            status: OrderStatus::Pending,
            submitted_at: 1_700_000_000,
            executed_at: None,
            actual_amount_out: 0,
            execution_price: 0,
        };
        order.record_fill(97, 1_700_000_005).unwrap();
        assert_eq!(order.status, OrderStatus::Executed);
        assert_eq!(order.executed_at, Some(1_700_000_005));
        assert_eq!(order.actual_amount_out, 97);
        assert_eq!(order.execution_price, 970_000_000);
    }

    #[test]
    fn relayer_membership_lookup() {
        let relayer = Pubkey::new_unique();
        let state = FifoState {
            current_sequence: 0,
            next_execution: 1,
            admin: Pubkey::new_unique(),
            authorized_relayers: vec![Pubkey::new_unique(), relayer],
            emergency_pause: false,
        };
        assert!(state.is_authorized_relayer(&relayer));
        assert!(!state.is_authorized_relayer(&Pubkey::new_unique()));
    }
}
