use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::error::RelayerError;

/// Top-level service configuration, loaded from a TOML file with CLI
/// overrides applied on top.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    pub rpc_url: String,
    pub keypair_path: PathBuf,
    /// The sequencer program id.
    pub program_id: String,
    /// Fee charged per relayed order, in basis points of the input amount.
    #[serde(default)]
    pub fee_bps: u16,
    #[serde(default = "defaults::http_bind")]
    pub http_bind: String,
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "defaults::confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    pub pools: Vec<PoolConfig>,
}

/// Bounded retry schedule for transient failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff, capped. Attempt numbering starts at zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

/// Everything the relayer needs to build an execution transaction for one
/// pool: the AMM-side accounts are static per pool, so they live in config
/// rather than being re-derived on every order.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    pub pool_id: String,
    pub amm_program: String,
    pub amm_config: String,
    pub token_0_mint: String,
    pub token_1_mint: String,
    pub token_0_vault: String,
    pub token_1_vault: String,
    pub observation_state: String,
    #[serde(default)]
    pub token_0_symbol: String,
    #[serde(default)]
    pub token_1_symbol: String,
}

impl RelayerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: RelayerConfig = toml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RelayerError> {
        parse_pubkey(&self.program_id, "program_id")?;
        if self.pools.is_empty() {
            return Err(RelayerError::Config("no pools configured".into()));
        }
        for pool in &self.pools {
            pool.validate()?;
        }
        if self.retry.max_attempts == 0 {
            return Err(RelayerError::Config("retry.max_attempts must be >= 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), RelayerError> {
        for (field, value) in [
            ("pool_id", &self.pool_id),
            ("amm_program", &self.amm_program),
            ("amm_config", &self.amm_config),
            ("token_0_mint", &self.token_0_mint),
            ("token_1_mint", &self.token_1_mint),
            ("token_0_vault", &self.token_0_vault),
            ("token_1_vault", &self.token_1_vault),
            ("observation_state", &self.observation_state),
        ] {
            parse_pubkey(value, field)?;
        }
        Ok(())
    }
}

pub fn parse_pubkey(value: &str, field: &str) -> Result<Pubkey, RelayerError> {
    Pubkey::from_str(value)
        .map_err(|_| RelayerError::Config(format!("{field} is not a valid pubkey: {value}")))
}

mod defaults {
    pub fn http_bind() -> String {
        "127.0.0.1:8080".to_string()
    }
    pub fn poll_interval_ms() -> u64 {
        500
    }
    pub fn confirm_timeout_ms() -> u64 {
        30_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
rpc_url = "http://127.0.0.1:8899"
keypair_path = "relayer-keypair.json"
program_id = "2oHKXtihEys2tZc9nm43Yy8LYUCoGn1j4i4SAUQWEKAF"
fee_bps = 5

[retry]
max_attempts = 3
base_delay_ms = 100
max_delay_ms = 1000

[[pools]]
pool_id = "So11111111111111111111111111111111111111112"
amm_program = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C"
amm_config = "D4FPEruKEHrG5TenZ2mpDGEfu1iUvTiqBxvpU8HLBvC2"
token_0_mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
token_1_mint = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"
token_0_vault = "8tfDNiaEyrV6Q1U4DEXrZigZ69wzz1vdnAVMvCEtGrCk"
token_1_vault = "C3n6kPbX1Cv7KwuZhDvC2xWmHvYRSQwTS1nx7sBnopss"
observation_state = "4ab1SkFQZyzVYXcYfrmbMtSL2V8TTSKhR8V6BE47JqEz"
token_0_symbol = "USDC"
token_1_symbol = "USDT"
"#;

    #[test]
    fn parses_sample_config() {
        let cfg: RelayerConfig = toml::from_str(SAMPLE).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.fee_bps, 5);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.pools.len(), 1);
        // defaults applied
        assert_eq!(cfg.http_bind, "127.0.0.1:8080");
        assert_eq!(cfg.poll_interval_ms, 500);
    }

    #[test]
    fn rejects_bad_pubkey() {
        let bad = SAMPLE.replace("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C", "not-a-key");
        let cfg: RelayerConfig = toml::from_str(&bad).unwrap();
        assert!(matches!(cfg.validate(), Err(RelayerError::Config(_))));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(retry.delay_for(63), Duration::from_millis(1_000));
    }
}
