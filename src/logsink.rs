//! Structured per-order CSV logging.
//!
//! Every dispatched order becomes one row in a per-provider CSV bucketed by
//! the order's own timestamp (not wall-clock "today", so a record that
//! arrives just after midnight still lands in yesterday's file) plus a
//! generic `orders.csv`/`orders.log` mirror under the same base directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use tokio::sync::Mutex;

use crate::order::Order;
use crate::provider::Provider;

const HEADER: &[&str] = &[
    "Log_time",
    "Stoxxo_Timestamp",
    "Stoxxo_Latency",
    "Recieve_Timestamp",
    "Sent_Timestamp",
    "Application_Latency",
    "Pipeline_Latency",
    "Strategy",
    "Stoxxo_Order",
    "order_summary",
    "Mapped_order",
    "order_status",
    "error_message",
];

struct OrderLogRecord {
    log_time: DateTime<Utc>,
    stoxxo_timestamp: DateTime<Utc>,
    stoxxo_latency_ms: i64,
    receive_timestamp: DateTime<Utc>,
    sent_timestamp: Option<DateTime<Utc>>,
    application_latency_ms: Option<i64>,
    pipeline_latency_ms: Option<i64>,
    strategy: String,
    stoxxo_order: String,
    order_summary: String,
    mapped_order: String,
    order_status: String,
    error_message: String,
}

impl OrderLogRecord {
    fn from_order(order: &Order, log_time: DateTime<Utc>) -> Self {
        let order_summary = format!(
            "{} {} {} {} {} {}",
            order.index,
            order.strike,
            order.expiry,
            order.side.as_str(),
            order.option_type.short_code(),
            order.quantity,
        );
        let mapped_order = order
            .mapped_order
            .as_ref()
            .map(|m| {
                m.fields
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .unwrap_or_default();
        Self {
            log_time,
            stoxxo_timestamp: order.actual_time,
            stoxxo_latency_ms: order.processing_gap_ms,
            receive_timestamp: order.parse_time,
            sent_timestamp: order.sent_time,
            application_latency_ms: order.end_to_end_latency_ms,
            pipeline_latency_ms: order.pipeline_latency_ms,
            strategy: order.strategy_tag.clone(),
            stoxxo_order: order.stoxxo_order.clone(),
            order_summary,
            mapped_order,
            order_status: format!("{:?}", order.status).to_uppercase(),
            error_message: order.error_message.clone().unwrap_or_default(),
        }
    }

    fn as_csv_row(&self) -> [String; 13] {
        [
            self.log_time.to_rfc3339(),
            self.stoxxo_timestamp.timestamp_millis().to_string(),
            self.stoxxo_latency_ms.to_string(),
            self.receive_timestamp.to_rfc3339(),
            self.sent_timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            self.application_latency_ms
                .map(|v| v.to_string())
                .unwrap_or_default(),
            self.pipeline_latency_ms
                .map(|v| v.to_string())
                .unwrap_or_default(),
            self.strategy.clone(),
            self.stoxxo_order.clone(),
            self.order_summary.clone(),
            self.mapped_order.clone(),
            self.order_status.clone(),
            self.error_message.clone(),
        ]
    }
}

pub struct LogSink {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LogSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Records `order`'s current status under `provider`'s daily bucket plus
    /// the generic mirror. Errors are logged, never propagated — a sink
    /// failure must not take down the dispatch path.
    pub async fn write(&self, order: &Order, provider: Provider) {
        let record = OrderLogRecord::from_order(order, Utc::now());
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.write_provider_csv(&record, provider) {
            tracing::error!(error = %e, "failed to write provider order log");
        }
        if let Err(e) = self.write_generic(&record) {
            tracing::error!(error = %e, "failed to write generic order log");
        }
    }

    fn write_provider_csv(&self, record: &OrderLogRecord, provider: Provider) -> Result<()> {
        let dir = self
            .base_dir
            .join(record.stoxxo_timestamp.date_naive().format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        let path = dir.join(format!("{}.csv", provider.as_str()));
        append_record(&path, record)
    }

    fn write_generic(&self, record: &OrderLogRecord) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("creating log directory {}", self.base_dir.display()))?;
        append_record(&self.base_dir.join("orders.csv"), record)?;

        let log_path = self.base_dir.join("orders.log");
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening {}", log_path.display()))?;
        writeln!(
            f,
            "{} {} strategy={} status={} error={}",
            record.log_time.to_rfc3339(),
            record.stoxxo_order,
            record.strategy,
            record.order_status,
            record.error_message,
        )?;
        Ok(())
    }
}

fn append_record(path: &Path, record: &OrderLogRecord) -> Result<()> {
    let write_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
    if write_header {
        wtr.write_record(HEADER)?;
    }
    wtr.write_record(record.as_csv_row())?;
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Exchange, OptionType, Product, Side};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_order() -> Order {
        let now = Utc.with_ymd_and_hms(2025, 10, 9, 10, 30, 0).unwrap();
        let mut order = Order::new(
            Some("L1".into()),
            "S1".into(),
            "NIFTY".into(),
            "25000".into(),
            150,
            "2025-10-16".into(),
            Side::Buy,
            Exchange::Nfo,
            Product::Nrml,
            OptionType::Call,
            now,
            now,
            "raw line".into(),
        );
        order.mark_sent(now, "algotest", crate::order::MappedOrder::single_payload("NIFTY251016C25000 BUY 4"));
        order
    }

    #[tokio::test]
    async fn writes_provider_bucket_with_header() {
        let dir = tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        let order = sample_order();
        sink.write(&order, Provider::Algotest).await;

        let bucket = dir.path().join("2025-10-09").join("algotest.csv");
        let contents = std::fs::read_to_string(&bucket).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        assert!(lines.next().unwrap().contains("S1"));
    }

    #[tokio::test]
    async fn writes_generic_mirror_alongside_provider_bucket() {
        let dir = tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        sink.write(&sample_order(), Provider::Tradetron).await;

        assert!(dir.path().join("orders.csv").exists());
        assert!(dir.path().join("orders.log").exists());
    }

    #[tokio::test]
    async fn second_write_does_not_duplicate_header() {
        let dir = tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        sink.write(&sample_order(), Provider::Algotest).await;
        sink.write(&sample_order(), Provider::Algotest).await;

        let bucket = dir.path().join("2025-10-09").join("algotest.csv");
        let contents = std::fs::read_to_string(&bucket).unwrap();
        assert_eq!(contents.lines().filter(|l| *l == HEADER.join(",")).count(), 1);
    }
}
