use anchor_lang::prelude::*;

use crate::errors::SequencerError;
use crate::pda::{FIFO_STATE_SEED, POOL_AUTHORITY_SEED, POOL_REGISTRY_SEED};
use crate::state::*;

#[derive(Accounts)]
pub struct RegisterPool<'info> {
    #[account(
        seeds = [FIFO_STATE_SEED],
        bump,
        has_one = admin @ SequencerError::Unauthorized,
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(
        init,
        payer = admin,
        space = PoolRegistryEntry::LEN,
        seeds = [POOL_REGISTRY_SEED, pool_state.key().as_ref()],
        bump
    )]
    pub pool_registry: Account<'info, PoolRegistryEntry>,

    /// The keyless capability the pool's vault authority must be re-keyed
    /// to. Recorded here so clients can verify the binding.
    /// CHECK: PDA derived from the pool id; never a real keypair.
    #[account(
        seeds = [POOL_AUTHORITY_SEED, pool_state.key().as_ref()],
        bump
    )]
    pub pool_authority: UncheckedAccount<'info>,

    #[account(mut)]
    pub admin: Signer<'info>,

    /// CHECK: The AMM pool state account this entry describes. Validated by
    /// the AMM itself at execution time.
    pub pool_state: UncheckedAccount<'info>,

    /// CHECK: The AMM program the pool lives in; pinned in the registry so
    /// execution can refuse to sign CPIs into anything else.
    #[account(constraint = amm_program.executable @ SequencerError::InvalidPool)]
    pub amm_program: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
}

pub fn register_pool(ctx: Context<RegisterPool>, token_0: Pubkey, token_1: Pubkey) -> Result<()> {
    require!(token_0 != token_1, SequencerError::InvalidPool);

    let registry = &mut ctx.accounts.pool_registry;
    registry.pool_id = ctx.accounts.pool_state.key();
    registry.token_0 = token_0;
    registry.token_1 = token_1;
    registry.pool_authority = ctx.accounts.pool_authority.key();
    registry.amm_program = ctx.accounts.amm_program.key();
    registry.created_at = Clock::get()?.unix_timestamp;
    registry.is_active = true;

    emit!(PoolRegistered {
        pool_id: registry.pool_id,
        pool_authority: registry.pool_authority,
        token_0,
        token_1,
    });

    msg!(
        "Pool {} registered, authority {}",
        registry.pool_id,
        registry.pool_authority
    );

    Ok(())
}

#[derive(Accounts)]
pub struct SetPoolActive<'info> {
    #[account(
        seeds = [FIFO_STATE_SEED],
        bump,
        has_one = admin @ SequencerError::Unauthorized,
    )]
    pub fifo_state: Account<'info, FifoState>,

    #[account(
        mut,
        seeds = [POOL_REGISTRY_SEED, pool_registry.pool_id.as_ref()],
        bump,
    )]
    pub pool_registry: Account<'info, PoolRegistryEntry>,

    pub admin: Signer<'info>,
}

pub fn set_pool_active(ctx: Context<SetPoolActive>, active: bool) -> Result<()> {
    let registry = &mut ctx.accounts.pool_registry;
    registry.is_active = active;

    emit!(PoolStatusChanged {
        pool_id: registry.pool_id,
        is_active: active,
    });

    Ok(())
}
