use anchor_lang::prelude::*;

use crate::errors::SequencerError;
use crate::pda::ORDER_SEED;
use crate::state::*;

#[derive(Accounts)]
pub struct CancelOrder<'info> {
    #[account(
        mut,
        seeds = [ORDER_SEED, user.key().as_ref(), &order.sequence.to_le_bytes()],
        bump,
        constraint = order.user == user.key() @ SequencerError::Unauthorized,
        constraint = order.status == OrderStatus::Pending @ SequencerError::InvalidOrderStatus,
    )]
    pub order: Account<'info, OrderRecord>,

    pub user: Signer<'info>,
}

/// Only the original submitter, only while Pending. No funds ever moved at
/// submission, so cancellation is a pure status flip.
pub fn cancel_order(ctx: Context<CancelOrder>) -> Result<()> {
    let order = &mut ctx.accounts.order;

    order.status = OrderStatus::Cancelled;

    emit!(OrderCancelled {
        sequence: order.sequence,
        user: order.user,
    });

    msg!("Order {} cancelled", order.sequence);

    Ok(())
}
