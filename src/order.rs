//! The canonical order record produced by the parser and mutated by the
//! dispatcher/adapter as it moves through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exchange {
    Nfo,
    Bfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Product {
    Mis,
    Nrml,
}

/// CALL=1, PUT=0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_numeric(self) -> u8 {
        match self {
            OptionType::Call => 1,
            OptionType::Put => 0,
        }
    }

    /// `"CE"`/`"PE"` tag used throughout provider payloads.
    pub fn short_code(self) -> &'static str {
        match self {
            OptionType::Call => "CE",
            OptionType::Put => "PE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

/// The payload actually sent to a provider, after adapter mapping. Modeled as
/// an ordered sequence of key/value pairs rather than a fixed struct — the
/// grouping adapter's numbered `keyN`/`valueN` fields are a wire requirement,
/// not something a static type can express.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappedOrder {
    pub fields: Vec<(String, String)>,
}

impl MappedOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// A single `{"payload": ...}` mapping, used by per-order POST adapters.
    pub fn single_payload(text: impl Into<String>) -> Self {
        let mut m = Self::new();
        m.push("payload", text.into());
        m
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn as_query_pairs(&self) -> &[(String, String)] {
        &self.fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub strategy_tag: String,
    pub index: String,
    pub strike: String,
    pub quantity: i64,
    /// Normalized `YYYY-MM-DD`.
    pub expiry: String,
    pub side: Side,
    pub exchange: Exchange,
    pub product: Product,
    pub option_type: OptionType,
    pub actual_time: DateTime<Utc>,
    pub parse_time: DateTime<Utc>,
    pub sent_time: Option<DateTime<Utc>>,
    pub stoxxo_order: String,
    pub processing_gap_ms: i64,
    pub pipeline_latency_ms: Option<i64>,
    pub end_to_end_latency_ms: Option<i64>,
    pub mapped_order: Option<MappedOrder>,
    pub adapter_name: Option<String>,
    pub status: OrderStatus,
    pub error_message: Option<String>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: Option<String>,
        strategy_tag: String,
        index: String,
        strike: String,
        quantity: i64,
        expiry: String,
        side: Side,
        exchange: Exchange,
        product: Product,
        option_type: OptionType,
        actual_time: DateTime<Utc>,
        parse_time: DateTime<Utc>,
        stoxxo_order: String,
    ) -> Self {
        let processing_gap_ms = (parse_time - actual_time).num_milliseconds().max(0);
        Self {
            order_id: order_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            strategy_tag,
            index,
            strike,
            quantity,
            expiry,
            side,
            exchange,
            product,
            option_type,
            actual_time,
            parse_time,
            sent_time: None,
            stoxxo_order,
            processing_gap_ms,
            pipeline_latency_ms: None,
            end_to_end_latency_ms: None,
            mapped_order: None,
            adapter_name: None,
            status: OrderStatus::Pending,
            error_message: None,
        }
    }

    /// Marks the order SENT at `now`, populating both latency fields.
    /// Invariant: status=SENT implies sent_time and both latencies are set.
    pub fn mark_sent(&mut self, now: DateTime<Utc>, adapter_name: &str, mapped: MappedOrder) {
        self.sent_time = Some(now);
        self.pipeline_latency_ms = Some((now - self.parse_time).num_milliseconds());
        self.end_to_end_latency_ms = Some((now - self.actual_time).num_milliseconds());
        self.adapter_name = Some(adapter_name.to_string());
        self.mapped_order = Some(mapped);
        self.status = OrderStatus::Sent;
        self.error_message = None;
    }

    pub fn mark_failed(&mut self, adapter_name: &str, mapped: Option<MappedOrder>, error: String) {
        self.adapter_name = Some(adapter_name.to_string());
        self.mapped_order = mapped;
        self.status = OrderStatus::Failed;
        self.error_message = Some(error);
    }

    pub fn mark_skipped(&mut self, reason: String) {
        self.status = OrderStatus::Skipped;
        self.error_message = Some(reason);
    }
}

/// An atomic group of orders produced from one filesystem notification.
/// The dispatcher preserves batch identity when invoking an adapter.
pub type OrderBatch = Vec<Order>;
