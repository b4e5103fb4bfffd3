//! Ledger access. The engine and API talk to the chain through the
//! [`SequencerLedger`] trait; [`RpcLedger`] is the production implementation
//! and tests substitute an in-memory ledger that enforces the same rules.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anchor_lang::{AccountDeserialize, Discriminator, InstructionData, ToAccountMetas};
use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{AccountMeta, Instruction, InstructionError};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::UiTransactionEncoding;
use tracing::debug;

use fairqueue::state::{FifoState, OrderRecord, OrderStatus};

use crate::config::{parse_pubkey, PoolConfig, RelayerConfig};
use crate::error::RelayerError;

pub const TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Point-in-time view of the sequencer singleton.
#[derive(Debug, Clone, Copy)]
pub struct FifoSnapshot {
    pub current_sequence: u64,
    pub next_execution: u64,
    pub emergency_pause: bool,
}

impl FifoSnapshot {
    /// Orders submitted but not yet resolved.
    pub fn queue_depth(&self) -> u64 {
        self.current_sequence
            .saturating_add(1)
            .saturating_sub(self.next_execution)
    }
}

/// Point-in-time view of one order record.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub sequence: u64,
    pub user: Pubkey,
    pub pool_id: Pubkey,
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub is_base_input: bool,
    pub status: OrderStatus,
    pub actual_amount_out: u64,
    pub execution_price: u128,
}

impl From<OrderRecord> for OrderSnapshot {
    fn from(record: OrderRecord) -> Self {
        Self {
            sequence: record.sequence,
            user: record.user,
            pool_id: record.pool_id,
            amount_in: record.amount_in,
            min_amount_out: record.min_amount_out,
            is_base_input: record.is_base_input,
            status: record.status,
            actual_amount_out: record.actual_amount_out,
            execution_price: record.execution_price,
        }
    }
}

#[async_trait]
pub trait SequencerLedger: Send + Sync + 'static {
    /// This relayer's signing identity.
    fn identity(&self) -> Pubkey;

    async fn fifo_state(&self) -> Result<FifoSnapshot, RelayerError>;

    /// Looks an order up by its global sequence number.
    async fn order_by_sequence(&self, sequence: u64)
        -> Result<Option<OrderSnapshot>, RelayerError>;

    /// Submits an execution transaction for the given order and returns its
    /// signature. Does not wait for confirmation.
    async fn execute_order(&self, order: &OrderSnapshot) -> Result<String, RelayerError>;

    /// Advances the watermark past a terminal head order.
    async fn release_sequence(&self, order: &OrderSnapshot) -> Result<String, RelayerError>;

    /// Broadcasts a client-built transaction, co-signing first when asked.
    async fn broadcast(&self, tx: Transaction, cosign: bool) -> Result<String, RelayerError>;

    /// Whether the signature has reached the configured commitment.
    async fn confirm_signature(&self, signature: &str) -> Result<bool, RelayerError>;

    /// The sequence number a confirmed submission transaction was assigned,
    /// recovered from program logs.
    async fn transaction_sequence(&self, signature: &str) -> Result<Option<u64>, RelayerError>;

    /// Current (token_0, token_1) vault balances for a pool.
    async fn vault_balances(&self, pool_id: &Pubkey) -> Result<(u64, u64), RelayerError>;
}

/// Static per-pool accounts, resolved from config once at startup.
#[derive(Debug, Clone)]
pub struct ResolvedPool {
    pub pool_id: Pubkey,
    pub amm_program: Pubkey,
    pub amm_config: Pubkey,
    pub token_0_mint: Pubkey,
    pub token_1_mint: Pubkey,
    pub token_0_vault: Pubkey,
    pub token_1_vault: Pubkey,
    pub observation_state: Pubkey,
}

impl ResolvedPool {
    pub fn from_config(cfg: &PoolConfig) -> Result<Self, RelayerError> {
        Ok(Self {
            pool_id: parse_pubkey(&cfg.pool_id, "pool_id")?,
            amm_program: parse_pubkey(&cfg.amm_program, "amm_program")?,
            amm_config: parse_pubkey(&cfg.amm_config, "amm_config")?,
            token_0_mint: parse_pubkey(&cfg.token_0_mint, "token_0_mint")?,
            token_1_mint: parse_pubkey(&cfg.token_1_mint, "token_1_mint")?,
            token_0_vault: parse_pubkey(&cfg.token_0_vault, "token_0_vault")?,
            token_1_vault: parse_pubkey(&cfg.token_1_vault, "token_1_vault")?,
            observation_state: parse_pubkey(&cfg.observation_state, "observation_state")?,
        })
    }

    /// (input mint, output mint, input vault, output vault) oriented by
    /// swap direction.
    pub fn orient(&self, is_base_input: bool) -> (Pubkey, Pubkey, Pubkey, Pubkey) {
        if is_base_input {
            (
                self.token_0_mint,
                self.token_1_mint,
                self.token_0_vault,
                self.token_1_vault,
            )
        } else {
            (
                self.token_1_mint,
                self.token_0_mint,
                self.token_1_vault,
                self.token_0_vault,
            )
        }
    }

    /// The CP-Swap tail in the exact order and writability the program's
    /// manifest validation expects.
    pub fn swap_tail_metas(&self, is_base_input: bool) -> Vec<AccountMeta> {
        let (input_mint, output_mint, input_vault, output_vault) = self.orient(is_base_input);
        vec![
            AccountMeta::new_readonly(self.amm_config, false),
            AccountMeta::new(self.pool_id, false),
            AccountMeta::new(input_vault, false),
            AccountMeta::new(output_vault, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(input_mint, false),
            AccountMeta::new_readonly(output_mint, false),
            AccountMeta::new(self.observation_state, false),
        ]
    }
}

/// Canonical associated-token-account derivation.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// Extracts the assigned sequence from submission logs
/// ("Program log: Order N submitted by ...").
pub fn parse_submitted_sequence(logs: &[String]) -> Option<u64> {
    for line in logs {
        if let Some(rest) = line.strip_prefix("Program log: Order ") {
            if let Some((number, tail)) = rest.split_once(' ') {
                if tail.starts_with("submitted") {
                    if let Ok(sequence) = number.parse() {
                        return Some(sequence);
                    }
                }
            }
        }
    }
    None
}

pub struct RpcLedger {
    rpc: RpcClient,
    keypair: Arc<Keypair>,
    program_id: Pubkey,
    pools: HashMap<Pubkey, ResolvedPool>,
}

impl RpcLedger {
    pub fn new(cfg: &RelayerConfig, keypair: Arc<Keypair>) -> Result<Self, RelayerError> {
        let program_id = parse_pubkey(&cfg.program_id, "program_id")?;
        let mut pools = HashMap::new();
        for pool_cfg in &cfg.pools {
            let pool = ResolvedPool::from_config(pool_cfg)?;
            pools.insert(pool.pool_id, pool);
        }
        Ok(Self {
            rpc: RpcClient::new_with_commitment(
                cfg.rpc_url.clone(),
                CommitmentConfig::confirmed(),
            ),
            keypair,
            program_id,
            pools,
        })
    }

    pub fn pool(&self, pool_id: &Pubkey) -> Result<&ResolvedPool, RelayerError> {
        self.pools
            .get(pool_id)
            .ok_or_else(|| RelayerError::UnsupportedPool(pool_id.to_string()))
    }

    fn execution_instruction(&self, order: &OrderSnapshot) -> Result<Instruction, RelayerError> {
        let pool = self.pool(&order.pool_id)?;
        let (fifo_state, _) = fairqueue::pda::fifo_state_address(&self.program_id);
        let (order_account, _) =
            fairqueue::pda::order_address(&order.user, order.sequence, &self.program_id);
        let (pool_registry, _) =
            fairqueue::pda::pool_registry_address(&order.pool_id, &self.program_id);
        let (pool_authority, _) =
            fairqueue::pda::pool_authority_address(&order.pool_id, &self.program_id);
        let (input_mint, output_mint, _, _) = pool.orient(order.is_base_input);

        let mut accounts = fairqueue::accounts::ExecuteOrder {
            fifo_state,
            order: order_account,
            pool_registry,
            pool_authority,
            executor: self.keypair.pubkey(),
            user_source: associated_token_address(&order.user, &input_mint),
            user_destination: associated_token_address(&order.user, &output_mint),
            amm_program: pool.amm_program,
            token_program: TOKEN_PROGRAM_ID,
        }
        .to_account_metas(None);
        accounts.extend(pool.swap_tail_metas(order.is_base_input));

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data: fairqueue::instruction::ExecuteOrder {
                expected_sequence: order.sequence,
            }
            .data(),
        })
    }

    fn release_instruction(&self, order: &OrderSnapshot) -> Instruction {
        let (fifo_state, _) = fairqueue::pda::fifo_state_address(&self.program_id);
        let (order_account, _) =
            fairqueue::pda::order_address(&order.user, order.sequence, &self.program_id);
        let accounts = fairqueue::accounts::ReleaseCancelled {
            fifo_state,
            order: order_account,
            executor: self.keypair.pubkey(),
        }
        .to_account_metas(None);
        Instruction {
            program_id: self.program_id,
            accounts,
            data: fairqueue::instruction::ReleaseCancelled {
                sequence: order.sequence,
            }
            .data(),
        }
    }

    async fn sign_and_send(
        &self,
        instruction: Instruction,
        sequence: u64,
    ) -> Result<String, RelayerError> {
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        let tx = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&self.keypair.pubkey()),
            &[self.keypair.as_ref()],
            blockhash,
        );
        let signature = self
            .rpc
            .send_transaction(&tx)
            .await
            .map_err(|e| classify_client_error(e, sequence))?;
        Ok(signature.to_string())
    }
}

/// Distinguishes program rejections (carried inside the RPC error) from
/// transport failures, which are the only retryable kind.
fn classify_client_error(error: ClientError, sequence: u64) -> RelayerError {
    if let Some(tx_error) = error.get_transaction_error() {
        if let TransactionError::InstructionError(_, InstructionError::Custom(code)) = tx_error {
            return RelayerError::from_program_code(code, sequence);
        }
        return RelayerError::LedgerRejected(tx_error.to_string());
    }
    RelayerError::Network(error.to_string())
}

#[async_trait]
impl SequencerLedger for RpcLedger {
    fn identity(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn fifo_state(&self) -> Result<FifoSnapshot, RelayerError> {
        let (address, _) = fairqueue::pda::fifo_state_address(&self.program_id);
        let data = self
            .rpc
            .get_account_data(&address)
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        let state = FifoState::try_deserialize(&mut data.as_slice())
            .map_err(|e| RelayerError::LedgerRejected(format!("bad fifo state account: {e}")))?;
        Ok(FifoSnapshot {
            current_sequence: state.current_sequence,
            next_execution: state.next_execution,
            emergency_pause: state.emergency_pause,
        })
    }

    async fn order_by_sequence(
        &self,
        sequence: u64,
    ) -> Result<Option<OrderSnapshot>, RelayerError> {
        let filters = vec![
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                0,
                OrderRecord::DISCRIMINATOR.to_vec(),
            )),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(8, sequence.to_le_bytes().to_vec())),
        ];
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                ..Default::default()
            },
            ..Default::default()
        };
        let accounts = self
            .rpc
            .get_program_accounts_with_config(&self.program_id, config)
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        let Some((_, account)) = accounts.into_iter().next() else {
            return Ok(None);
        };
        let record = OrderRecord::try_deserialize(&mut account.data.as_slice())
            .map_err(|e| RelayerError::LedgerRejected(format!("bad order account: {e}")))?;
        Ok(Some(record.into()))
    }

    async fn execute_order(&self, order: &OrderSnapshot) -> Result<String, RelayerError> {
        let instruction = self.execution_instruction(order)?;
        debug!(sequence = order.sequence, "submitting execution");
        self.sign_and_send(instruction, order.sequence).await
    }

    async fn release_sequence(&self, order: &OrderSnapshot) -> Result<String, RelayerError> {
        let instruction = self.release_instruction(order);
        debug!(sequence = order.sequence, "releasing terminal head");
        self.sign_and_send(instruction, order.sequence).await
    }

    async fn broadcast(&self, mut tx: Transaction, cosign: bool) -> Result<String, RelayerError> {
        if cosign {
            let blockhash = tx.message.recent_blockhash;
            tx.try_partial_sign(&[self.keypair.as_ref()], blockhash)
                .map_err(|e| RelayerError::InvalidTransaction(e.to_string()))?;
        }
        let signature = self
            .rpc
            .send_transaction(&tx)
            .await
            .map_err(|e| classify_client_error(e, 0))?;
        Ok(signature.to_string())
    }

    async fn confirm_signature(&self, signature: &str) -> Result<bool, RelayerError> {
        let signature = Signature::from_str(signature)
            .map_err(|e| RelayerError::InvalidTransaction(e.to_string()))?;
        self.rpc
            .confirm_transaction(&signature)
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))
    }

    async fn transaction_sequence(&self, signature: &str) -> Result<Option<u64>, RelayerError> {
        let signature = Signature::from_str(signature)
            .map_err(|e| RelayerError::InvalidTransaction(e.to_string()))?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let tx = self
            .rpc
            .get_transaction_with_config(&signature, config)
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        let Some(meta) = tx.transaction.meta else {
            return Ok(None);
        };
        if let OptionSerializer::Some(logs) = meta.log_messages {
            return Ok(parse_submitted_sequence(&logs));
        }
        Ok(None)
    }

    async fn vault_balances(&self, pool_id: &Pubkey) -> Result<(u64, u64), RelayerError> {
        let pool = self.pool(pool_id)?;
        let balance_0 = self
            .rpc
            .get_token_account_balance(&pool.token_0_vault)
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        let balance_1 = self
            .rpc
            .get_token_account_balance(&pool.token_1_vault)
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        let parse = |amount: &str| {
            amount
                .parse::<u64>()
                .map_err(|e| RelayerError::LedgerRejected(format!("bad vault balance: {e}")))
        };
        Ok((parse(&balance_0.amount)?, parse(&balance_1.amount)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pda_seed_strings_are_fixed() {
        // Interop contract: addresses must come out of these exact seeds.
        let program_id = fairqueue::ID;
        let user = Pubkey::new_unique();
        let pool = Pubkey::new_unique();

        assert_eq!(
            fairqueue::pda::fifo_state_address(&program_id).0,
            Pubkey::find_program_address(&[b"fifo_state"], &program_id).0
        );
        assert_eq!(
            fairqueue::pda::pool_registry_address(&pool, &program_id).0,
            Pubkey::find_program_address(&[b"pool_registry", pool.as_ref()], &program_id).0
        );
        assert_eq!(
            fairqueue::pda::pool_authority_address(&pool, &program_id).0,
            Pubkey::find_program_address(&[b"cp_pool_authority", pool.as_ref()], &program_id).0
        );
        assert_eq!(
            fairqueue::pda::order_address(&user, 42, &program_id).0,
            Pubkey::find_program_address(
                &[b"order", user.as_ref(), &42u64.to_le_bytes()],
                &program_id
            )
            .0
        );
    }

    #[test]
    fn parses_submission_logs() {
        let logs = vec![
            "Program 2oHKXtihEys2tZc9nm43Yy8LYUCoGn1j4i4SAUQWEKAF invoke [1]".to_string(),
            "Program log: Order 17 submitted by 7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
                .to_string(),
            "Program 2oHKXtihEys2tZc9nm43Yy8LYUCoGn1j4i4SAUQWEKAF success".to_string(),
        ];
        assert_eq!(parse_submitted_sequence(&logs), Some(17));
        assert_eq!(parse_submitted_sequence(&["unrelated".to_string()]), None);
    }

    #[test]
    fn swap_tail_matches_manifest_shape() {
        let pool = ResolvedPool {
            pool_id: Pubkey::new_unique(),
            amm_program: Pubkey::new_unique(),
            amm_config: Pubkey::new_unique(),
            token_0_mint: Pubkey::new_unique(),
            token_1_mint: Pubkey::new_unique(),
            token_0_vault: Pubkey::new_unique(),
            token_1_vault: Pubkey::new_unique(),
            observation_state: Pubkey::new_unique(),
        };
        for is_base_input in [true, false] {
            let tail = pool.swap_tail_metas(is_base_input);
            assert_eq!(tail.len(), fairqueue::manifest::SWAP_TAIL_MANIFEST.len());
            for (meta, spec) in tail.iter().zip(fairqueue::manifest::SWAP_TAIL_MANIFEST.iter()) {
                assert_eq!(meta.is_writable, spec.writable);
            }
        }
        // direction flips vaults and mints
        let forward = pool.swap_tail_metas(true);
        let reverse = pool.swap_tail_metas(false);
        assert_eq!(forward[2].pubkey, pool.token_0_vault);
        assert_eq!(reverse[2].pubkey, pool.token_1_vault);
        assert_eq!(forward[6].pubkey, pool.token_0_mint);
        assert_eq!(reverse[6].pubkey, pool.token_1_mint);
    }

    #[test]
    fn ata_derivation_is_stable() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let a = associated_token_address(&owner, &mint);
        let b = associated_token_address(&owner, &mint);
        assert_eq!(a, b);
        assert_ne!(a, associated_token_address(&mint, &owner));
    }
}
