//! The CP-Swap CPI surface: the typed account manifest the swap instruction
//! expects, and the fixed wire encoding of its arguments.
//!
//! The AMM's account list varies by pool, so callers pass it per invocation.
//! Rather than forwarding an untyped slice, execution validates the list
//! against [`SWAP_TAIL_MANIFEST`] (count, order, writability, executability)
//! before the pool authority signs anything.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::{AccountMeta, Instruction};

use crate::errors::SequencerError;

/// Anchor discriminator of CP-Swap `swap_base_input`.
pub const SWAP_BASE_INPUT_DISCRIMINATOR: [u8; 8] = [143, 190, 90, 218, 196, 30, 51, 222];
/// Anchor discriminator of CP-Swap `swap_base_output`.
pub const SWAP_BASE_OUTPUT_DISCRIMINATOR: [u8; 8] = [55, 217, 98, 86, 163, 74, 180, 173];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmmAccountRole {
    AmmConfig,
    PoolState,
    InputVault,
    OutputVault,
    InputTokenProgram,
    OutputTokenProgram,
    InputMint,
    OutputMint,
    ObservationState,
}

#[derive(Clone, Copy, Debug)]
pub struct AmmAccountSpec {
    pub role: AmmAccountRole,
    pub writable: bool,
    pub executable: bool,
}

const fn spec(role: AmmAccountRole, writable: bool, executable: bool) -> AmmAccountSpec {
    AmmAccountSpec {
        role,
        writable,
        executable,
    }
}

/// Accounts the CP-Swap swap instruction expects after the three the program
/// supplies itself (pool authority, user source, user destination), in order.
pub const SWAP_TAIL_MANIFEST: [AmmAccountSpec; 9] = [
    spec(AmmAccountRole::AmmConfig, false, false),
    spec(AmmAccountRole::PoolState, true, false),
    spec(AmmAccountRole::InputVault, true, false),
    spec(AmmAccountRole::OutputVault, true, false),
    spec(AmmAccountRole::InputTokenProgram, false, true),
    spec(AmmAccountRole::OutputTokenProgram, false, true),
    spec(AmmAccountRole::InputMint, false, false),
    spec(AmmAccountRole::OutputMint, false, false),
    spec(AmmAccountRole::ObservationState, true, false),
];

/// Checks the caller-supplied tail accounts against the manifest before any
/// CPI is issued under the pool authority's signature.
pub fn validate_swap_accounts(accounts: &[AccountInfo]) -> Result<()> {
    let flags: Vec<(bool, bool)> = accounts
        .iter()
        .map(|a| (a.is_writable, a.executable))
        .collect();
    check_tail_flags(&flags)
}

fn check_tail_flags(flags: &[(bool, bool)]) -> Result<()> {
    if flags.len() != SWAP_TAIL_MANIFEST.len() {
        return err!(SequencerError::InvalidAccountManifest);
    }
    for ((writable, executable), spec) in flags.iter().zip(SWAP_TAIL_MANIFEST.iter()) {
        if *writable != spec.writable {
            return err!(SequencerError::InvalidAccountManifest);
        }
        if spec.executable && !*executable {
            return err!(SequencerError::InvalidAccountManifest);
        }
    }
    Ok(())
}

/// Encodes the swap arguments behind the appropriate discriminator. For
/// base-input swaps the AMM receives (amount_in, minimum_amount_out); for
/// base-output swaps the argument order flips to (max_amount_in, amount_out).
pub fn swap_instruction_data(is_base_input: bool, amount_in: u64, min_amount_out: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(24);
    if is_base_input {
        data.extend_from_slice(&SWAP_BASE_INPUT_DISCRIMINATOR);
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&min_amount_out.to_le_bytes());
    } else {
        data.extend_from_slice(&SWAP_BASE_OUTPUT_DISCRIMINATOR);
        data.extend_from_slice(&min_amount_out.to_le_bytes());
        data.extend_from_slice(&amount_in.to_le_bytes());
    }
    data
}

/// Builds the full CP-Swap instruction: pool authority first (the only
/// signer), then the user's token accounts, then the validated tail.
pub fn swap_instruction(
    amm_program: &Pubkey,
    pool_authority: &Pubkey,
    user_source: &Pubkey,
    user_destination: &Pubkey,
    tail: &[AccountInfo],
    data: Vec<u8>,
) -> Instruction {
    let mut accounts = Vec::with_capacity(3 + tail.len());
    accounts.push(AccountMeta::new_readonly(*pool_authority, true));
    accounts.push(AccountMeta::new(*user_source, false));
    accounts.push(AccountMeta::new(*user_destination, false));
    for info in tail {
        accounts.push(if info.is_writable {
            AccountMeta::new(info.key(), false)
        } else {
            AccountMeta::new_readonly(info.key(), false)
        });
    }
    Instruction {
        program_id: *amm_program,
        accounts,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_flags() -> Vec<(bool, bool)> {
        SWAP_TAIL_MANIFEST
            .iter()
            .map(|s| (s.writable, s.executable))
            .collect()
    }

    #[test]
    fn base_input_data_layout() {
        let data = swap_instruction_data(true, 100, 95);
        assert_eq!(&data[..8], &SWAP_BASE_INPUT_DISCRIMINATOR);
        assert_eq!(&data[8..16], &100u64.to_le_bytes());
        assert_eq!(&data[16..24], &95u64.to_le_bytes());
    }

    #[test]
    fn base_output_data_flips_argument_order() {
        let data = swap_instruction_data(false, 100, 95);
        assert_eq!(&data[..8], &SWAP_BASE_OUTPUT_DISCRIMINATOR);
        // max_amount_in first, then amount_out
        assert_eq!(&data[8..16], &95u64.to_le_bytes());
        assert_eq!(&data[16..24], &100u64.to_le_bytes());
    }

    #[test]
    fn manifest_accepts_expected_layout() {
        assert!(check_tail_flags(&manifest_flags()).is_ok());
    }

    #[test]
    fn manifest_rejects_wrong_count() {
        let mut flags = manifest_flags();
        flags.pop();
        assert!(check_tail_flags(&flags).is_err());
        assert!(check_tail_flags(&[]).is_err());
    }

    #[test]
    fn manifest_rejects_writability_mismatch() {
        // amm_config must be readonly
        let mut flags = manifest_flags();
        flags[0].0 = true;
        assert!(check_tail_flags(&flags).is_err());

        // input vault must be writable
        let mut flags = manifest_flags();
        flags[2].0 = false;
        assert!(check_tail_flags(&flags).is_err());
    }

    #[test]
    fn manifest_rejects_non_executable_token_program() {
        let mut flags = manifest_flags();
        flags[4].1 = false;
        assert!(check_tail_flags(&flags).is_err());
    }
}
