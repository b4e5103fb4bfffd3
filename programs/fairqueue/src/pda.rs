//! Deterministic addressing. Every account the program owns is derived from
//! a fixed seed string plus the relevant identifiers; off-ledger clients must
//! reproduce these derivations byte for byte.

use anchor_lang::prelude::*;

pub const FIFO_STATE_SEED: &[u8] = b"fifo_state";
pub const POOL_REGISTRY_SEED: &[u8] = b"pool_registry";
pub const POOL_AUTHORITY_SEED: &[u8] = b"cp_pool_authority";
pub const ORDER_SEED: &[u8] = b"order";

pub fn fifo_state_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[FIFO_STATE_SEED], program_id)
}

pub fn pool_registry_address(pool_id: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_REGISTRY_SEED, pool_id.as_ref()], program_id)
}

/// The keyless signing capability for a registered pool. No private key
/// exists for this address; it can only sign through `invoke_signed` inside
/// the execution instructions.
pub fn pool_authority_address(pool_id: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_AUTHORITY_SEED, pool_id.as_ref()], program_id)
}

pub fn order_address(user: &Pubkey, sequence: u64, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[ORDER_SEED, user.as_ref(), &sequence.to_le_bytes()],
        program_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivations_are_deterministic() {
        let program_id = crate::ID;
        let (a, bump_a) = fifo_state_address(&program_id);
        let (b, bump_b) = fifo_state_address(&program_id);
        assert_eq!(a, b);
        assert_eq!(bump_a, bump_b);
    }

    #[test]
    fn order_addresses_partition_by_user_and_sequence() {
        let program_id = crate::ID;
        let user_a = Pubkey::new_unique();
        let user_b = Pubkey::new_unique();
        let (a1, _) = order_address(&user_a, 1, &program_id);
        let (a2, _) = order_address(&user_a, 2, &program_id);
        let (b1, _) = order_address(&user_b, 1, &program_id);
        assert_ne!(a1, a2);
        assert_ne!(a1, b1);
    }

    #[test]
    fn pool_authority_differs_from_registry() {
        let program_id = crate::ID;
        let pool = Pubkey::new_unique();
        let (registry, _) = pool_registry_address(&pool, &program_id);
        let (authority, _) = pool_authority_address(&pool, &program_id);
        assert_ne!(registry, authority);
    }
}
