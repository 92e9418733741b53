use crate::types::TokenBalance;
use portfolio_core::Position;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

/// Converts GoldRush balance items into normalized positions
pub struct BalanceParser;

impl BalanceParser {
    /// Normalize the balances of one chain.
    ///
    /// Spam tokens and zero balances are dropped. Items whose raw balance does
    /// not fit a decimal (typically spam with absurd supplies) are skipped.
    pub fn parse_positions(chain_id: u64, items: &[TokenBalance]) -> Vec<Position> {
        let positions: Vec<Position> = items
            .iter()
            .filter(|item| !item.is_spam.unwrap_or(false))
            .filter_map(|item| Self::parse_position(chain_id, item))
            .collect();

        debug!(
            "Normalized {}/{} balances on chain {}",
            positions.len(),
            items.len(),
            chain_id
        );
        positions
    }

    fn parse_position(chain_id: u64, item: &TokenBalance) -> Option<Position> {
        let decimals = item.contract_decimals.unwrap_or(0);
        let balance = Self::scale_balance(item.balance.as_deref()?, decimals)?;
        if balance.is_zero() {
            return None;
        }

        let symbol = item
            .contract_ticker_symbol
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let name = item
            .contract_name
            .clone()
            .or_else(|| item.contract_display_name.clone())
            .unwrap_or_else(|| symbol.clone());

        Some(Position {
            chain_id,
            token_address: item.contract_address.to_ascii_lowercase(),
            symbol,
            name,
            decimals,
            balance,
            price_usd: item.quote_rate.and_then(Decimal::from_f64),
            value_usd: item
                .quote
                .and_then(Decimal::from_f64)
                .map(|v| v.round_dp(8))
                .unwrap_or(Decimal::ZERO),
            logo_url: item.logo_url.clone(),
        })
    }

    /// Scale a raw integer balance string by `decimals`
    pub fn scale_balance(raw: &str, decimals: u32) -> Option<Decimal> {
        let raw_value = raw.trim().parse::<i128>().ok()?;
        match Decimal::try_from_i128_with_scale(raw_value, decimals) {
            Ok(value) => Some(value.normalize()),
            Err(e) => {
                debug!("Skipping balance {} with {} decimals: {}", raw, decimals, e);
                None
            }
        }
    }
}
