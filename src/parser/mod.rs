//! Single-line CSV + symbol-string parser.
//!
//! A rejection is normal control flow, not an error — callers simply drop
//! the line and move on.

pub mod symbol;

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::cache::Cache;
use crate::order::{Exchange, Order, Product, Side};
use symbol::{parse_symbol, SymbolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Didn't have ≥6 fields, or fields[1] != "TRADING", or fields[2]
    /// doesn't contain "Initiating Order Placement".
    NotACandidate,
    StrategyInactive,
    MissingDetail(&'static str),
    Symbol(SymbolError),
    QuantityOutOfRange,
    InvalidTimestamp,
    UnknownTxn,
}

pub struct ParseLimits {
    pub min_qty: i64,
    pub max_qty: i64,
}

pub fn parse_line(
    line: &str,
    cache: &Cache,
    limits: &ParseLimits,
    now: DateTime<Utc>,
) -> Result<Order, Rejection> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 6 || fields[1] != "TRADING" || !fields[2].contains("Initiating Order Placement") {
        return Err(Rejection::NotACandidate);
    }
    let timestamp = fields[0];
    let order_details = fields[2];
    let strategy = fields[3];

    if !cache.strategy_is_active(strategy) {
        tracing::warn!(strategy, "strategy inactive, rejecting order");
        return Err(Rejection::StrategyInactive);
    }

    let details = parse_detail_segments(order_details);

    let symbol_raw = *details.get("Symbol").ok_or(Rejection::MissingDetail("Symbol"))?;
    let leg_id = details.get("Leg ID").copied();
    let qty_raw = *details.get("Qty").ok_or(Rejection::MissingDetail("Qty"))?;
    let txn_raw = *details.get("Txn").ok_or(Rejection::MissingDetail("Txn"))?;

    let parsed_symbol = parse_symbol(symbol_raw, cache, now).map_err(Rejection::Symbol)?;

    let quantity: i64 = qty_raw.parse().map_err(|_| Rejection::QuantityOutOfRange)?;
    if quantity < limits.min_qty || quantity > limits.max_qty {
        return Err(Rejection::QuantityOutOfRange);
    }

    let side = match txn_raw {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        _ => return Err(Rejection::UnknownTxn),
    };

    let actual_time = parse_timestamp(timestamp, now).ok_or(Rejection::InvalidTimestamp)?;
    let parse_time = now;

    Ok(Order::new(
        leg_id.map(str::to_string),
        strategy.to_string(),
        parsed_symbol.index,
        parsed_symbol.strike,
        quantity,
        parsed_symbol.expiry,
        side,
        Exchange::Nfo,
        Product::Nrml,
        parsed_symbol.option_type,
        actual_time,
        parse_time,
        line.to_string(),
    ))
}

/// Splits `order_details` on `;` into `"key: value"` attribute pairs.
fn parse_detail_segments(order_details: &str) -> std::collections::HashMap<&str, &str> {
    let mut map = std::collections::HashMap::new();
    for segment in order_details.split(';') {
        let segment = segment.trim();
        if let Some((key, value)) = segment.split_once(':') {
            map.insert(key.trim(), value.trim());
        }
    }
    map
}

/// Parses `HH:MM:SS:mmm` against today's date, reconciling with
/// yesterday/tomorrow: a candidate in the future rolls back a day, and one
/// trailing by more than 12 hours rolls forward a day.
fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 4 {
        return None;
    }
    let hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: u32 = parts[2].parse().ok()?;
    let millis: u32 = parts[3].parse().ok()?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;

    let today = now.date_naive();
    let candidate = today.and_time(time).and_utc();

    let candidate = if candidate > now {
        candidate - Duration::days(1)
    } else if (now - candidate).num_seconds() > 12 * 3600 {
        candidate + Duration::days(1)
    } else {
        candidate
    };
    Some(candidate)
}
