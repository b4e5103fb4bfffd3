use anchor_lang::prelude::*;

use crate::errors::SequencerError;
use crate::pda::{FIFO_STATE_SEED, ORDER_SEED};
use crate::state::*;

#[derive(Accounts)]
#[instruction(sequence: u64)]
pub struct ReleaseCancelled<'info> {
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        constraint = fifo_state.is_authorized_relayer(&executor.key())
            @ SequencerError::Unauthorized,
        constraint = fifo_state.next_execution == sequence @ SequencerError::OutOfOrder,
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(
        seeds = [ORDER_SEED, order.user.as_ref(), &sequence.to_le_bytes()],
        bump,
        constraint = order.sequence == sequence @ SequencerError::OutOfOrder,
        constraint = order.status != OrderStatus::Pending @ SequencerError::InvalidOrderStatus,
    )]
    pub order: Account<'info, OrderRecord>,

    pub executor: Signer<'info>,
}

/// Advances the execution watermark past a head order that is already
/// terminal (cancelled by its submitter, or filled out-of-band by the fast
/// path) so the queue cannot stall behind it. A Pending head is refused;
/// only `execute_order` may resolve those.
pub fn release_cancelled(ctx: Context<ReleaseCancelled>, sequence: u64) -> Result<()> {
    let fifo_state = &mut ctx.accounts.fifo_state;
    fifo_state.next_execution = sequence
        .checked_add(1)
        .ok_or(SequencerError::NumericOverflow)?;

    emit!(CancelledReleased {
        sequence,
        executor: ctx.accounts.executor.key(),
    });

    msg!("Sequence {} released", sequence);

    Ok(())
}
