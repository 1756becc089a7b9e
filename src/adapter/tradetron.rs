//! Grouping adapter: batches many orders into a single GET request against
//! one shared trigger URL, using a rotating per-condition slot counter.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::Rng;
use reqwest::Method;

use crate::cache::Cache;
use crate::order::{MappedOrder, Order, Side};
use crate::provider::Provider;

use super::Mapper;

/// Owns the rotating `condition -> slot` map. Only the grouping worker ever
/// calls `map_order_batch`, so the mutex is never contended; it exists to
/// satisfy `Send + Sync`, not for real concurrency control.
pub struct TradetronAdapter {
    base_url: String,
    counter_size: u32,
    slot_counter: Mutex<HashMap<String, u32>>,
}

impl TradetronAdapter {
    pub fn new(base_url: impl Into<String>, counter_size: u32) -> Self {
        Self {
            base_url: base_url.into(),
            counter_size: counter_size.max(1),
            slot_counter: Mutex::new(HashMap::new()),
        }
    }

    fn advance_slot(&self, condition: &str) -> u32 {
        let mut counters = self.slot_counter.lock().unwrap();
        let slot = counters.entry(condition.to_string()).or_insert(0);
        *slot += 1;
        if *slot > self.counter_size {
            *slot = 1;
        }
        *slot
    }
}

impl Mapper for TradetronAdapter {
    fn provider(&self) -> Provider {
        Provider::Tradetron
    }

    fn http_method(&self) -> Method {
        Method::GET
    }

    fn map_order_batch(
        &self,
        orders: &[Order],
        cache: &Cache,
    ) -> Result<(Vec<MappedOrder>, String), String> {
        let first = orders.first().ok_or_else(|| "empty batch".to_string())?;
        let webhooks = cache
            .webhooks_for(&first.strategy_tag, Provider::Tradetron)
            .ok_or_else(|| format!("no tradetron webhooks configured for strategy {}", first.strategy_tag))?;

        let signal: u32 = rand::thread_rng().gen_range(1..=10_000);

        // One (semantic key, value) pair per slot; numbered sequentially
        // across the whole batch, four pairs per order.
        let mut semantic_pairs: Vec<(String, String)> = Vec::with_capacity(orders.len() * 4);
        for order in orders {
            let option = order.option_type.short_code();
            let side_upper = order.side.as_str();
            let side_cap = match order.side {
                Side::Buy => "Buy",
                Side::Sell => "Sell",
            };
            let condition = format!("{}_{}_{}", order.index, side_upper, option);
            let slot = self.advance_slot(&condition);

            semantic_pairs.push((format!("{condition}{slot}"), signal.to_string()));
            semantic_pairs.push((
                format!("{}_Quantity_{}_{}{}", order.index, option, side_cap, slot),
                order.quantity.to_string(),
            ));
            semantic_pairs.push((
                format!("{}_Strike_{}_{}{}", order.index, option, side_cap, slot),
                order.strike.clone(),
            ));
            semantic_pairs.push((
                format!("{}_Expiry_{}_{}{}", order.index, option, side_cap, slot),
                order.expiry.clone(),
            ));
        }

        let mut clones = Vec::with_capacity(webhooks.len());
        for webhook in &webhooks {
            let mut mapped = MappedOrder::new();
            for (i, (key, value)) in semantic_pairs.iter().enumerate() {
                let n = i + 1;
                let value = if key.contains("_Quantity_") {
                    let raw: i64 = value
                        .parse()
                        .map_err(|_| format!("non-numeric quantity value for {key}"))?;
                    (raw * webhook.multiplier as i64).to_string()
                } else {
                    value.clone()
                };
                mapped.push(format!("key{n}"), key.clone());
                mapped.push(format!("value{n}"), value);
            }
            mapped.push("auth-token", webhook.url.clone());
            clones.push(mapped);
        }

        Ok((clones, self.base_url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Exchange, OptionType, Product};
    use crate::test_support::test_cache;
    use chrono::{TimeZone, Utc};

    fn order(index: &str, strike: &str, qty: i64) -> Order {
        let now = Utc.with_ymd_and_hms(2025, 10, 9, 10, 30, 0).unwrap();
        Order::new(
            None,
            "S1".into(),
            index.into(),
            strike.into(),
            qty,
            "2025-10-16".into(),
            Side::Buy,
            Exchange::Nfo,
            Product::Nrml,
            OptionType::Call,
            now,
            now,
            "raw".into(),
        )
    }

    #[test]
    fn batch_mapping_produces_numbered_pairs_with_shared_signal() {
        let cache = test_cache();
        let adapter = TradetronAdapter::new("https://trigger.example/base", 3);
        let orders = vec![order("NIFTY", "25000", 75), order("NIFTY", "25100", 75)];
        let (payloads, url) = adapter.map_order_batch(&orders, &cache).unwrap();

        assert_eq!(url, "https://trigger.example/base");
        assert_eq!(payloads.len(), 1); // test_cache's S1 has a single tradetron webhook
        let payload = &payloads[0];

        assert_eq!(payload.get("key1").unwrap(), "NIFTY_BUY_CE1");
        let signal = payload.get("value1").unwrap().to_string();
        assert_eq!(payload.get("key2").unwrap(), "NIFTY_Quantity_CE_Buy1");
        assert_eq!(payload.get("value2").unwrap(), "150"); // 75 * multiplier 2
        assert_eq!(payload.get("key5").unwrap(), "NIFTY_BUY_CE2");
        assert_eq!(payload.get("value5").unwrap(), &signal);
        assert_eq!(payload.get("key6").unwrap(), "NIFTY_Quantity_CE_Buy2");
        assert_eq!(payload.get("value6").unwrap(), "150");
    }

    #[test]
    fn slot_counter_rotates_at_counter_size() {
        let cache = test_cache();
        let adapter = TradetronAdapter::new("https://trigger.example/base", 2);
        for n in 1..=3u32 {
            let (payloads, _) = adapter.map_order_batch(&[order("NIFTY", "25000", 75)], &cache).unwrap();
            let expected_slot = ((n - 1) % 2) + 1;
            assert_eq!(
                payloads[0].get("key1").unwrap(),
                format!("NIFTY_BUY_CE{expected_slot}")
            );
        }
    }
}
