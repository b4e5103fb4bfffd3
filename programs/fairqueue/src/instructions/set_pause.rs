use anchor_lang::prelude::*;

use crate::errors::SequencerError;
use crate::pda::FIFO_STATE_SEED;
use crate::state::*;

#[derive(Accounts)]
pub struct SetEmergencyPause<'info> {
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        has_one = admin @ SequencerError::Unauthorized,
    )]
    pub fifo_state: Account<'info, FifoState>,

    pub admin: Signer<'info>,
}

/// Pause gates intake only: new submissions and immediate swaps refuse while
/// paused, but execution and cancellation keep working so the queue drains
/// and users can exit.
pub fn set_emergency_pause(ctx: Context<SetEmergencyPause>, paused: bool) -> Result<()> {
    let fifo_state = &mut ctx.accounts.fifo_state;
    fifo_state.emergency_pause = paused;

    emit!(EmergencyPauseSet { paused });
    msg!("Emergency pause set to {}", paused);

    Ok(())
}
