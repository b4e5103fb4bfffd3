use anchor_lang::prelude::*;

use crate::errors::SequencerError;
use crate::pda::{FIFO_STATE_SEED, ORDER_SEED, POOL_REGISTRY_SEED};
use crate::state::*;

#[derive(Accounts)]
pub struct SubmitOrder<'info> {
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        constraint = !fifo_state.emergency_pause @ SequencerError::EmergencyPaused,
        constraint = fifo_state.current_sequence < u64::MAX @ SequencerError::SequenceOverflow,
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(
        seeds = [POOL_REGISTRY_SEED, pool_id.key().as_ref()],
        bump,
        constraint = pool_registry.is_active @ SequencerError::PoolInactive,
    )]
    pub pool_registry: Account<'info, PoolRegistryEntry>,

    /// Keyed by the sequence the order is about to be assigned; the overflow
    /// constraint above keeps the wrapping_add honest.
    #[account(
        init,
        payer = user,
        space = OrderRecord::LEN,
        seeds = [
            ORDER_SEED,
            user.key().as_ref(),
            &fifo_state.current_sequence.wrapping_add(1).to_le_bytes(),
        ],
        bump
    )]
    pub order: Account<'info, OrderRecord>,

    #[account(mut)]
    pub user: Signer<'info>,

    /// CHECK: The pool this order targets; existence and registration are
    /// proven by the registry PDA above.
    pub pool_id: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

/// Reserves the next queue slot. No funds move here; submission only
/// announces the swap and pins its place in line.
pub fn submit_order(
    ctx: Context<SubmitOrder>,
    amount_in: u64,
    min_amount_out: u64,
    is_base_input: bool,
) -> Result<()> {
    require!(amount_in > 0, SequencerError::InvalidAmount);

    let fifo_state = &mut ctx.accounts.fifo_state;
    let order = &mut ctx.accounts.order;

    let sequence = fifo_state
        .current_sequence
        .checked_add(1)
        .ok_or(SequencerError::SequenceOverflow)?;
    fifo_state.current_sequence = sequence;

    order.sequence = sequence;
    order.user = ctx.accounts.user.key();
    order.pool_id = ctx.accounts.pool_id.key();
    order.amount_in = amount_in;
    order.min_amount_out = min_amount_out;
    order.is_base_input = is_base_input;
    order.status = OrderStatus::Pending;
    order.submitted_at = Clock::get()?.unix_timestamp;
    order.executed_at = None;
    order.actual_amount_out = 0;
    order.execution_price = 0;

    emit!(OrderSubmitted {
        sequence,
        user: order.user,
        pool_id: order.pool_id,
        amount_in,
        min_amount_out,
        is_base_input,
    });

    msg!("Order {} submitted by {}", sequence, order.user);

    Ok(())
}
