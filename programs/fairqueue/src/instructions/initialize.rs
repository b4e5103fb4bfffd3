use anchor_lang::prelude::*;

use crate::pda::FIFO_STATE_SEED;
use crate::state::*;

#[derive(Accounts)]
pub struct Initialize<'info> {
    /// The singleton PDA makes a second call fail at account creation, so
    /// re-initialization can never clobber live state.
    #[account(
        init,
        payer = admin,
        space = FifoState::LEN,
        seeds = [FIFO_STATE_SEED],
        bump
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(mut)]
    pub admin: Signer<'info>,

    pub system_program: Program<'info, System>,
}

pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
    let fifo_state = &mut ctx.accounts.fifo_state;

    fifo_state.current_sequence = 0;
    fifo_state.next_execution = 1;
    fifo_state.admin = ctx.accounts.admin.key();
    fifo_state.authorized_relayers = Vec::new();
    fifo_state.emergency_pause = false;

    msg!("Sequencer initialized, admin {}", fifo_state.admin);

    Ok(())
}
