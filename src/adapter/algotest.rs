//! Per-order POST adapter: one lot-size-adjusted symbol string per webhook,
//! no grouping, no slot state.

use reqwest::Method;

use crate::cache::Cache;
use crate::order::{MappedOrder, Order};
use crate::provider::Provider;

use super::Mapper;

pub struct AlgotestAdapter;

impl AlgotestAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AlgotestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for AlgotestAdapter {
    fn provider(&self) -> Provider {
        Provider::Algotest
    }

    fn http_method(&self) -> Method {
        Method::POST
    }

    fn map_order(&self, order: &Order, cache: &Cache) -> Result<Vec<(MappedOrder, String)>, String> {
        let lot_size = cache
            .lot_size(&order.index)
            .ok_or_else(|| format!("no lot size configured for index {}", order.index))?;
        let webhooks = cache
            .webhooks_for(&order.strategy_tag, Provider::Algotest)
            .ok_or_else(|| format!("no algotest webhooks configured for strategy {}", order.strategy_tag))?;

        let expiry_compact = compact_expiry(&order.expiry);
        let option_letter = if order.option_type.as_numeric() == 1 { "C" } else { "P" };
        let instrument = format!("{}{}{}{}", order.index, expiry_compact, option_letter, order.strike);

        Ok(webhooks
            .iter()
            .map(|webhook| {
                let quantity = order.quantity * webhook.multiplier as i64;
                let lots = quantity / lot_size;
                let symbol = format!("{instrument} {} {lots}", order.side.as_str());
                (MappedOrder::single_payload(symbol), webhook.url.clone())
            })
            .collect())
    }
}

/// `"2025-10-16"` -> `"251016"`: last six characters of `YYYY-MM-DD` with
/// the dashes removed.
fn compact_expiry(expiry: &str) -> String {
    let digits: String = expiry.chars().filter(|c| *c != '-').collect();
    digits.chars().skip(2).collect()
}
