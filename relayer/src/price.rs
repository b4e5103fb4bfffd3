//! Pool price snapshots derived from vault balances. Raw token units; the
//! consumer applies mint decimals.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPrice {
    pub pool_id: String,
    pub token_0_vault_balance: u64,
    pub token_1_vault_balance: u64,
    /// token_1 per token_0, from constant-product reserves. Absent while a
    /// vault is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_token_0_in_token_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_token_1_in_token_0: Option<f64>,
}

impl PoolPrice {
    pub fn from_balances(pool_id: String, token_0: u64, token_1: u64) -> Self {
        Self {
            pool_id,
            token_0_vault_balance: token_0,
            token_1_vault_balance: token_1,
            price_token_0_in_token_1: spot_price(token_0, token_1),
            price_token_1_in_token_0: spot_price(token_1, token_0),
        }
    }
}

pub fn spot_price(base_reserve: u64, quote_reserve: u64) -> Option<f64> {
    if base_reserve == 0 {
        return None;
    }
    Some(quote_reserve as f64 / base_reserve as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_reserve_ratio() {
        assert_eq!(spot_price(100, 200), Some(2.0));
        assert_eq!(spot_price(200, 100), Some(0.5));
    }

    #[test]
    fn empty_base_reserve_has_no_price() {
        assert_eq!(spot_price(0, 100), None);
    }

    #[test]
    fn both_directions_populated() {
        let price = PoolPrice::from_balances("pool".into(), 1_000, 4_000);
        assert_eq!(price.price_token_0_in_token_1, Some(4.0));
        assert_eq!(price.price_token_1_in_token_0, Some(0.25));
    }
}
