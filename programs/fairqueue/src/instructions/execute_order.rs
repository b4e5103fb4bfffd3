use anchor_lang::prelude::*;
use anchor_lang::solana_program::program::invoke_signed;
use anchor_spl::token::{Token, TokenAccount};

use crate::errors::SequencerError;
use crate::manifest;
use crate::pda::{FIFO_STATE_SEED, ORDER_SEED, POOL_AUTHORITY_SEED, POOL_REGISTRY_SEED};
use crate::state::*;

#[derive(Accounts)]
#[instruction(expected_sequence: u64)]
pub struct ExecuteOrder<'info> {
    /// The on-ledger FIFO gate: only the order at the execution watermark can
    /// run, so no smaller pending sequence is ever skipped.
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        constraint = fifo_state.is_authorized_relayer(&executor.key())
            @ SequencerError::Unauthorized,
        constraint = fifo_state.next_execution == expected_sequence
            @ SequencerError::OutOfOrder,
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(
        mut,
        seeds = [ORDER_SEED, order.user.as_ref(), &expected_sequence.to_le_bytes()],
        bump,
        constraint = order.sequence == expected_sequence @ SequencerError::OutOfOrder,
        constraint = order.status == OrderStatus::Pending @ SequencerError::InvalidOrderStatus,
    )]
    pub order: Account<'info, OrderRecord>,

    #[account(
        seeds = [POOL_REGISTRY_SEED, order.pool_id.as_ref()],
        bump,
        constraint = pool_registry.is_active @ SequencerError::PoolInactive,
    )]
    pub pool_registry: Account<'info, PoolRegistryEntry>,

    /// CHECK: Keyless signing capability for this pool; only ever exercised
    /// through `invoke_signed` below.
    #[account(
        seeds = [POOL_AUTHORITY_SEED, order.pool_id.as_ref()],
        bump
    )]
    pub pool_authority: UncheckedAccount<'info>,

    #[account(mut)]
    pub executor: Signer<'info>,

    #[account(
        mut,
        constraint = user_source.owner == order.user @ SequencerError::Unauthorized,
    )]
    pub user_source: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = user_destination.owner == order.user @ SequencerError::Unauthorized,
    )]
    pub user_destination: Box<Account<'info, TokenAccount>>,

    /// CHECK: Pinned at registration; the pool authority signs CPIs into
    /// this program and nothing else.
    #[account(
        constraint = amm_program.key() == pool_registry.amm_program
            @ SequencerError::InvalidPool,
    )]
    pub amm_program: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
    // Remaining accounts: the CP-Swap tail, validated against the manifest.
}

pub fn execute_order<'info>(
    ctx: Context<'_, '_, '_, 'info, ExecuteOrder<'info>>,
    expected_sequence: u64,
) -> Result<()> {
    manifest::validate_swap_accounts(ctx.remaining_accounts)?;

    let pool_id = ctx.accounts.order.pool_id;
    let amount_in = ctx.accounts.order.amount_in;
    let min_amount_out = ctx.accounts.order.min_amount_out;
    let is_base_input = ctx.accounts.order.is_base_input;

    let ix = manifest::swap_instruction(
        &ctx.accounts.amm_program.key(),
        &ctx.accounts.pool_authority.key(),
        &ctx.accounts.user_source.key(),
        &ctx.accounts.user_destination.key(),
        ctx.remaining_accounts,
        manifest::swap_instruction_data(is_base_input, amount_in, min_amount_out),
    );

    let pool_authority_seeds = &[
        POOL_AUTHORITY_SEED,
        pool_id.as_ref(),
        &[ctx.bumps.pool_authority],
    ];

    let start_balance = ctx.accounts.user_destination.amount;

    let mut account_infos = vec![
        ctx.accounts.pool_authority.to_account_info(),
        ctx.accounts.user_source.to_account_info(),
        ctx.accounts.user_destination.to_account_info(),
    ];
    account_infos.extend_from_slice(ctx.remaining_accounts);

    // A failure anywhere in the CPI aborts the whole transaction; the order
    // stays Pending and the watermark does not move.
    invoke_signed(&ix, &account_infos, &[pool_authority_seeds])?;

    ctx.accounts.user_destination.reload()?;
    let amount_out = ctx
        .accounts
        .user_destination
        .amount
        .checked_sub(start_balance)
        .ok_or(SequencerError::NumericOverflow)?;
    require!(amount_out >= min_amount_out, SequencerError::SlippageExceeded);

    let now = Clock::get()?.unix_timestamp;
    let order = &mut ctx.accounts.order;
    order.record_fill(amount_out, now)?;

    let fifo_state = &mut ctx.accounts.fifo_state;
    fifo_state.next_execution = expected_sequence
        .checked_add(1)
        .ok_or(SequencerError::NumericOverflow)?;

    emit!(OrderExecuted {
        sequence: expected_sequence,
        user: order.user,
        pool_id,
        amount_out,
        execution_price: order.execution_price,
        executor: ctx.accounts.executor.key(),
    });

    msg!("Order {} executed, amount out {}", expected_sequence, amount_out);

    Ok(())
}
