use anchor_lang::prelude::*;

declare_id!("2oHKXtihEys2tZc9nm43Yy8LYUCoGn1j4i4SAUQWEKAF");

pub mod errors;
pub mod instructions;
pub mod manifest;
pub mod pda;
pub mod state;

use instructions::*;

#[program]
pub mod fairqueue {
    use super::*;

    /// Create the global FIFO sequencer state. Fails if already initialized.
    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        instructions::initialize(ctx)
    }

    /// Register an AMM pool and bind it to its derived pool authority.
    pub fn register_pool(
        ctx: Context<RegisterPool>,
        token_0: Pubkey,
        token_1: Pubkey,
    ) -> Result<()> {
        instructions::register_pool(ctx, token_0, token_1)
    }

    /// Toggle a registered pool's active flag.
    pub fn set_pool_active(ctx: Context<SetPoolActive>, active: bool) -> Result<()> {
        instructions::set_pool_active(ctx, active)
    }

    /// Reserve the next queue slot for a swap. No funds move.
    pub fn submit_order(
        ctx: Context<SubmitOrder>,
        amount_in: u64,
        min_amount_out: u64,
        is_base_input: bool,
    ) -> Result<()> {
        instructions::submit_order(ctx, amount_in, min_amount_out, is_base_input)
    }

    /// Execute the order at the watermark; anything else is out of order.
    pub fn execute_order<'info>(
        ctx: Context<'_, '_, '_, 'info, ExecuteOrder<'info>>,
        expected_sequence: u64,
    ) -> Result<()> {
        instructions::execute_order(ctx, expected_sequence)
    }

    /// Cancel a still-pending order. Submitter only.
    pub fn cancel_order(ctx: Context<CancelOrder>) -> Result<()> {
        instructions::cancel_order(ctx)
    }

    /// Advance the watermark past a terminal head order.
    pub fn release_cancelled(ctx: Context<ReleaseCancelled>, sequence: u64) -> Result<()> {
        instructions::release_cancelled(ctx, sequence)
    }

    /// Dual-signed fast path: submit and execute in one transaction.
    pub fn swap_immediate<'info>(
        ctx: Context<'_, '_, '_, 'info, SwapImmediate<'info>>,
        amount_in: u64,
        min_amount_out: u64,
        is_base_input: bool,
        pool_id: Pubkey,
        pool_authority_bump: u8,
    ) -> Result<()> {
        instructions::swap_immediate(
            ctx,
            amount_in,
            min_amount_out,
            is_base_input,
            pool_id,
            pool_authority_bump,
        )
    }

    /// Admin: halt intake of new orders.
    pub fn set_emergency_pause(ctx: Context<SetEmergencyPause>, paused: bool) -> Result<()> {
        instructions::set_emergency_pause(ctx, paused)
    }

    /// Admin: authorize a relayer to execute orders.
    pub fn add_relayer(ctx: Context<AddRelayer>) -> Result<()> {
        instructions::add_relayer(ctx)
    }

    /// Admin: revoke a relayer's execution rights.
    pub fn remove_relayer(ctx: Context<RemoveRelayer>) -> Result<()> {
        instructions::remove_relayer(ctx)
    }
}
