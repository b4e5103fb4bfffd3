use anchor_lang::prelude::*;
use anchor_lang::solana_program::program::invoke_signed;
use anchor_spl::token::{Token, TokenAccount};

use crate::errors::SequencerError;
use crate::manifest;
use crate::pda::{FIFO_STATE_SEED, ORDER_SEED, POOL_AUTHORITY_SEED, POOL_REGISTRY_SEED};
use crate::state::*;

#[derive(Accounts)]
#[instruction(
    amount_in: u64,
    min_amount_out: u64,
    is_base_input: bool,
    pool_id: Pubkey,
    pool_authority_bump: u8,
)]
pub struct SwapImmediate<'info> {
    /// The relayer signer below is the dual-signing gate: the user's funds
    /// move only if a currently-authorized relayer co-signed the transaction.
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        constraint = !fifo_state.emergency_pause @ SequencerError::EmergencyPaused,
        constraint = fifo_state.is_authorized_relayer(&relayer.key())
            @ SequencerError::RelayerRequired,
        constraint = fifo_state.current_sequence < u64::MAX @ SequencerError::SequenceOverflow,
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(
        seeds = [POOL_REGISTRY_SEED, pool_id.as_ref()],
        bump,
        constraint = pool_registry.is_active @ SequencerError::PoolInactive,
    )]
    pub pool_registry: Account<'info, PoolRegistryEntry>,

    /// CHECK: Keyless signing capability for this pool.
    #[account(
        seeds = [POOL_AUTHORITY_SEED, pool_id.as_ref()],
        bump = pool_authority_bump
    )]
    pub pool_authority: UncheckedAccount<'info>,

    /// The fast path still writes an order record so the ledger stays
    /// complete and the queue watermark can pass over this sequence.
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

    /// The fund owner; authorizes the source-token debit.
    #[account(mut)]
    pub user: Signer<'info>,

    /// Contributes no funds; its signature is consent by an authorized
    /// relayer, without which this instruction cannot run at all.
    pub relayer: Signer<'info>,

    #[account(
        mut,
        constraint = user_source.owner == user.key() @ SequencerError::Unauthorized,
    )]
    pub user_source: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = user_destination.owner == user.key() @ SequencerError::Unauthorized,
    )]
    pub user_destination: Box<Account<'info, TokenAccount>>,

    /// CHECK: Pinned at registration.
    #[account(
        constraint = amm_program.key() == pool_registry.amm_program
            @ SequencerError::InvalidPool,
    )]
    pub amm_program: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    // Remaining accounts: the CP-Swap tail, validated against the manifest.
}

/// Submission and execution collapsed into one transaction for low-latency
/// use. Consumes a sequence from the shared counter like any other order,
/// but resolves it in the same instruction.
pub fn swap_immediate<'info>(
    ctx: Context<'_, '_, '_, 'info, SwapImmediate<'info>>,
    amount_in: u64,
    min_amount_out: u64,
    is_base_input: bool,
    pool_id: Pubkey,
    pool_authority_bump: u8,
) -> Result<()> {
    require!(amount_in > 0, SequencerError::InvalidAmount);

    manifest::validate_swap_accounts(ctx.remaining_accounts)?;

    let fifo_state = &mut ctx.accounts.fifo_state;
    let sequence = fifo_state
        .current_sequence
        .checked_add(1)
        .ok_or(SequencerError::SequenceOverflow)?;
    fifo_state.current_sequence = sequence;
    // At the queue head this sequence resolves itself; behind pending orders
    // it is released later once the watermark reaches it.
    if fifo_state.next_execution == sequence {
        fifo_state.next_execution = sequence
            .checked_add(1)
            .ok_or(SequencerError::NumericOverflow)?;
    }

    let now = Clock::get()?.unix_timestamp;
    let order = &mut ctx.accounts.order;
    order.sequence = sequence;
    order.user = ctx.accounts.user.key();
    order.pool_id = pool_id;
    order.amount_in = amount_in;
    order.min_amount_out = min_amount_out;
    order.is_base_input = is_base_input;
    order.status = OrderStatus::Pending;
    order.submitted_at = now;
    order.executed_at = None;
    order.actual_amount_out = 0;
    order.execution_price = 0;

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
        &[pool_authority_bump],
    ];

    let start_balance = ctx.accounts.user_destination.amount;

    let mut account_infos = vec![
        ctx.accounts.pool_authority.to_account_info(),
        ctx.accounts.user_source.to_account_info(),
        ctx.accounts.user_destination.to_account_info(),
    ];
    account_infos.extend_from_slice(ctx.remaining_accounts);

    invoke_signed(&ix, &account_infos, &[pool_authority_seeds])?;

    ctx.accounts.user_destination.reload()?;
    let amount_out = ctx
        .accounts
        .user_destination
        .amount
        .checked_sub(start_balance)
        .ok_or(SequencerError::NumericOverflow)?;
    require!(amount_out >= min_amount_out, SequencerError::SlippageExceeded);

    let order = &mut ctx.accounts.order;
    order.record_fill(amount_out, now)?;

    emit!(ImmediateSwapExecuted {
        sequence,
        user: order.user,
        pool_id,
        amount_in,
        amount_out,
        relayer: ctx.accounts.relayer.key(),
    });

    msg!("Immediate swap {} filled, amount out {}", sequence, amount_out);

    Ok(())
}
