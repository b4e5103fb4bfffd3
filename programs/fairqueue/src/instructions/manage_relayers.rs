use anchor_lang::prelude::*;

use crate::errors::SequencerError;
use crate::pda::FIFO_STATE_SEED;
use crate::state::*;

#[derive(Accounts)]
pub struct AddRelayer<'info> {
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        has_one = admin @ SequencerError::Unauthorized,
    )]
    pub fifo_state: Account<'info, FifoState>,

    pub admin: Signer<'info>,

    /// CHECK: Identity being granted execution rights; any account works.
    pub relayer: UncheckedAccount<'info>,
}

pub fn add_relayer(ctx: Context<AddRelayer>) -> Result<()> {
    let fifo_state = &mut ctx.accounts.fifo_state;
    let relayer = ctx.accounts.relayer.key();

    require!(
        !fifo_state.is_authorized_relayer(&relayer),
        SequencerError::RelayerAlreadyAuthorized
    );
    require!(
        fifo_state.authorized_relayers.len() < MAX_RELAYERS,
        SequencerError::RelayerSetFull
    );

    fifo_state.authorized_relayers.push(relayer);

    emit!(RelayerAdded { relayer });
    msg!("Relayer {} authorized", relayer);

    Ok(())
}

#[derive(Accounts)]
pub struct RemoveRelayer<'info> {
    #[account(
        mut,
        seeds = [FIFO_STATE_SEED],
        bump,
        has_one = admin @ SequencerError::Unauthorized,
    )]
    pub fifo_state: Account<'info, FifoState>,

    pub admin: Signer<'info>,

    /// CHECK: Identity losing execution rights.
    pub relayer: UncheckedAccount<'info>,
}

pub fn remove_relayer(ctx: Context<RemoveRelayer>) -> Result<()> {
    let fifo_state = &mut ctx.accounts.fifo_state;
    let relayer = ctx.accounts.relayer.key();

    fifo_state.authorized_relayers.retain(|r| *r != relayer);

    emit!(RelayerRemoved { relayer });
    msg!("Relayer {} removed", relayer);

    Ok(())
}
