//! Validation of client-supplied transactions before the relayer touches
//! them. A transaction is only accepted if it carries exactly the swap the
//! client declared, and fast-path transactions must already name this
//! relayer in a required signer slot.

use anchor_lang::Discriminator;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

use crate::config::parse_pubkey;
use crate::error::RelayerError;
use crate::types::SwapParams;

/// Position of the pool account in the queued submission instruction
/// (fifo_state, pool_registry, order, user, pool_id, ...).
const SUBMIT_ORDER_POOL_INDEX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMode {
    /// Two-step: submit now, a relayer executes it in FIFO turn.
    Queued,
    /// Dual-signed single transaction.
    Immediate,
}

#[derive(Debug, Clone)]
pub struct ParsedSwap {
    pub mode: SwapMode,
    pub pool_id: Pubkey,
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub is_base_input: bool,
}

pub fn decode_transaction(encoded: &str) -> Result<Transaction, RelayerError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| RelayerError::InvalidTransaction(format!("base64: {e}")))?;
    bincode::deserialize(&bytes)
        .map_err(|e| RelayerError::InvalidTransaction(format!("deserialize: {e}")))
}

/// Finds the sequencer instruction in the transaction and decodes its
/// arguments from the fixed wire layout (8-byte discriminator, then
/// little-endian fields).
pub fn parse_swap_instruction(
    tx: &Transaction,
    program_id: &Pubkey,
) -> Result<ParsedSwap, RelayerError> {
    let message = &tx.message;
    for ix in &message.instructions {
        let Some(pid) = message.account_keys.get(ix.program_id_index as usize) else {
            continue;
        };
        if pid != program_id || ix.data.len() < 8 {
            continue;
        }
        let (disc, args) = ix.data.split_at(8);
        if disc == fairqueue::instruction::SubmitOrder::DISCRIMINATOR {
            if args.len() < 17 {
                return Err(RelayerError::InvalidTransaction(
                    "submit_order arguments truncated".into(),
                ));
            }
            let pool_key_index = *ix.accounts.get(SUBMIT_ORDER_POOL_INDEX).ok_or_else(|| {
                RelayerError::InvalidTransaction("submit_order account list truncated".into())
            })? as usize;
            let pool_id = *message.account_keys.get(pool_key_index).ok_or_else(|| {
                RelayerError::InvalidTransaction("pool account index out of range".into())
            })?;
            return Ok(ParsedSwap {
                mode: SwapMode::Queued,
                pool_id,
                amount_in: u64::from_le_bytes(args[0..8].try_into().unwrap()),
                min_amount_out: u64::from_le_bytes(args[8..16].try_into().unwrap()),
                is_base_input: args[16] != 0,
            });
        }
        if disc == fairqueue::instruction::SwapImmediate::DISCRIMINATOR {
            if args.len() < 50 {
                return Err(RelayerError::InvalidTransaction(
                    "swap_immediate arguments truncated".into(),
                ));
            }
            let pool_bytes: [u8; 32] = args[17..49].try_into().unwrap();
            return Ok(ParsedSwap {
                mode: SwapMode::Immediate,
                pool_id: Pubkey::new_from_array(pool_bytes),
                amount_in: u64::from_le_bytes(args[0..8].try_into().unwrap()),
                min_amount_out: u64::from_le_bytes(args[8..16].try_into().unwrap()),
                is_base_input: args[16] != 0,
            });
        }
    }
    Err(RelayerError::InvalidTransaction(
        "no sequencer swap instruction found".into(),
    ))
}

/// Whether `relayer` occupies one of the transaction's required signer
/// slots. This is the off-ledger half of the dual-signing gate; the program
/// re-checks authorization on-ledger.
pub fn relayer_is_signer(tx: &Transaction, relayer: &Pubkey) -> bool {
    let required = tx.message.header.num_required_signatures as usize;
    tx.message
        .account_keys
        .iter()
        .take(required)
        .any(|key| key == relayer)
}

/// The declared parameters must match what the transaction will actually do.
pub fn ensure_matches(parsed: &ParsedSwap, declared: &SwapParams) -> Result<(), RelayerError> {
    let declared_pool = parse_pubkey(&declared.pool_id, "swap.pool_id")
        .map_err(|_| RelayerError::InvalidTransaction("declared pool id invalid".into()))?;
    if parsed.pool_id != declared_pool {
        return Err(RelayerError::InvalidTransaction(
            "declared pool does not match instruction".into(),
        ));
    }
    if parsed.amount_in != declared.amount_in
        || parsed.min_amount_out != declared.min_amount_out
        || parsed.is_base_input != declared.is_base_input
    {
        return Err(RelayerError::InvalidTransaction(
            "declared swap parameters do not match instruction".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::{InstructionData, ToAccountMetas};
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::message::Message;

    fn immediate_tx(with_relayer_signer: bool) -> (Transaction, Pubkey, Pubkey) {
        let user = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let pool_id = Pubkey::new_unique();
        let data = fairqueue::instruction::SwapImmediate {
            amount_in: 100,
            min_amount_out: 95,
            is_base_input: true,
            pool_id,
            pool_authority_bump: 254,
        }
        .data();
        let mut accounts = vec![
            AccountMeta::new(Pubkey::new_unique(), false), // fifo_state
            AccountMeta::new_readonly(Pubkey::new_unique(), false), // pool_registry
            AccountMeta::new_readonly(Pubkey::new_unique(), false), // pool_authority
            AccountMeta::new(Pubkey::new_unique(), false), // order
            AccountMeta::new(user, true),
        ];
        accounts.push(if with_relayer_signer {
            AccountMeta::new_readonly(relayer, true)
        } else {
            AccountMeta::new_readonly(relayer, false)
        });
        let ix = Instruction {
            program_id: fairqueue::ID,
            accounts,
            data,
        };
        let message = Message::new(&[ix], Some(&user));
        (Transaction::new_unsigned(message), relayer, pool_id)
    }

    #[test]
    fn parses_immediate_swap_arguments() {
        let (tx, _, pool_id) = immediate_tx(true);
        let parsed = parse_swap_instruction(&tx, &fairqueue::ID).unwrap();
        assert_eq!(parsed.mode, SwapMode::Immediate);
        assert_eq!(parsed.pool_id, pool_id);
        assert_eq!(parsed.amount_in, 100);
        assert_eq!(parsed.min_amount_out, 95);
        assert!(parsed.is_base_input);
    }

    #[test]
    fn parses_queued_submission() {
        let user = Pubkey::new_unique();
        let pool_id = Pubkey::new_unique();
        let accounts = fairqueue::accounts::SubmitOrder {
            fifo_state: Pubkey::new_unique(),
            pool_registry: Pubkey::new_unique(),
            order: Pubkey::new_unique(),
            user,
            pool_id,
            system_program: solana_sdk::system_program::id(),
        }
        .to_account_metas(None);
        let ix = Instruction {
            program_id: fairqueue::ID,
            accounts,
            data: fairqueue::instruction::SubmitOrder {
                amount_in: 250,
                min_amount_out: 240,
                is_base_input: false,
            }
            .data(),
        };
        let tx = Transaction::new_unsigned(Message::new(&[ix], Some(&user)));
        let parsed = parse_swap_instruction(&tx, &fairqueue::ID).unwrap();
        assert_eq!(parsed.mode, SwapMode::Queued);
        assert_eq!(parsed.pool_id, pool_id);
        assert_eq!(parsed.amount_in, 250);
        assert!(!parsed.is_base_input);
    }

    #[test]
    fn detects_missing_relayer_signer() {
        let (signed, relayer, _) = immediate_tx(true);
        assert!(relayer_is_signer(&signed, &relayer));

        let (unsigned, relayer, _) = immediate_tx(false);
        assert!(!relayer_is_signer(&unsigned, &relayer));
    }

    #[test]
    fn rejects_foreign_transactions() {
        let ix = Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![],
            data: vec![0u8; 24],
        };
        let payer = Pubkey::new_unique();
        let tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer)));
        assert!(matches!(
            parse_swap_instruction(&tx, &fairqueue::ID),
            Err(RelayerError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn declared_params_must_match() {
        let (tx, _, pool_id) = immediate_tx(true);
        let parsed = parse_swap_instruction(&tx, &fairqueue::ID).unwrap();

        let good = SwapParams {
            pool_id: pool_id.to_string(),
            amount_in: 100,
            min_amount_out: 95,
            is_base_input: true,
        };
        assert!(ensure_matches(&parsed, &good).is_ok());

        let tampered = SwapParams {
            amount_in: 1,
            ..good.clone()
        };
        assert!(ensure_matches(&parsed, &tampered).is_err());

        let wrong_pool = SwapParams {
            pool_id: Pubkey::new_unique().to_string(),
            ..good
        };
        assert!(ensure_matches(&parsed, &wrong_pool).is_err());
    }

    #[test]
    fn transaction_roundtrips_through_base64() {
        let (tx, _, _) = immediate_tx(true);
        let encoded = BASE64.encode(bincode::serialize(&tx).unwrap());
        let decoded = decode_transaction(&encoded).unwrap();
        assert_eq!(tx, decoded);
        assert!(decode_transaction("not base64!").is_err());
    }
}
