//! Webhook adapters: the common send strategies, HTTP retry policy, and
//! per-provider payload mapping live here; `tradetron` and `algotest` supply
//! only the provider-specific mapping.

pub mod algotest;
mod http;
pub mod tradetron;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::cache::Cache;
use crate::grouping::GroupingQueue;
use crate::logsink::LogSink;
use crate::order::{MappedOrder, Order, OrderBatch, OrderStatus};
use crate::provider::Provider;
use crate::ratelimit::RateLimiter;

/// Provider-specific payload mapping. A grouping adapter implements only
/// `map_order_batch`; a per-order adapter implements only `map_order` — the
/// unimplemented side keeps its default "unsupported" error, which
/// `BaseAdapter` never calls given its own `grouping` configuration agrees.
pub trait Mapper: Send + Sync {
    fn provider(&self) -> Provider;
    fn http_method(&self) -> Method;

    fn map_order(&self, _order: &Order, _cache: &Cache) -> Result<Vec<(MappedOrder, String)>, String> {
        Err("adapter does not support per-order mapping".to_string())
    }

    fn map_order_batch(
        &self,
        _orders: &[Order],
        _cache: &Cache,
    ) -> Result<(Vec<MappedOrder>, String), String> {
        Err("adapter does not support batch mapping".to_string())
    }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;
    async fn send_order(&self, batch: OrderBatch) -> OrderBatch;
}

pub struct BaseAdapter<M: Mapper> {
    name: String,
    mapper: M,
    client: Client,
    cache: Arc<Cache>,
    sink: Arc<LogSink>,
    rate_limiter: Arc<RateLimiter>,
    max_retries: u32,
    grouping: Option<Arc<GroupingQueue>>,
    group_batch_delay: Duration,
    order_delay: Option<Duration>,
    active: bool,
}

impl<M: Mapper + 'static> BaseAdapter<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        mapper: M,
        client: Client,
        cache: Arc<Cache>,
        sink: Arc<LogSink>,
        rate_limiter: Arc<RateLimiter>,
        max_retries: u32,
        order_delay: Option<Duration>,
        active: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            mapper,
            client,
            cache,
            sink,
            rate_limiter,
            max_retries,
            grouping: None,
            group_batch_delay: Duration::ZERO,
            order_delay,
            active,
        })
    }

    /// Builds a grouping-mode adapter and spawns its background worker.
    #[allow(clippy::too_many_arguments)]
    pub fn new_grouping(
        name: impl Into<String>,
        mapper: M,
        client: Client,
        cache: Arc<Cache>,
        sink: Arc<LogSink>,
        rate_limiter: Arc<RateLimiter>,
        max_retries: u32,
        group_limit: usize,
        group_batch_delay: Duration,
        active: bool,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            name: name.into(),
            mapper,
            client,
            cache,
            sink,
            rate_limiter,
            max_retries,
            grouping: Some(Arc::new(GroupingQueue::new(group_limit))),
            group_batch_delay,
            order_delay: None,
            active,
        });
        let worker_handle = adapter.clone();
        tokio::spawn(async move { worker_handle.run_grouping_worker().await });
        adapter
    }

    pub fn grouping_queue(&self) -> Option<Arc<GroupingQueue>> {
        self.grouping.clone()
    }

    async fn run_grouping_worker(self: Arc<Self>) {
        let grouping = match &self.grouping {
            Some(g) => g.clone(),
            None => return,
        };
        loop {
            let batch = grouping.dequeue_batch().await;
            if batch.is_empty() {
                tracing::info!(adapter = %self.name, "grouping worker exiting, queue closed and drained");
                return;
            }
            self.rate_limiter.acquire(1).await;
            self.dispatch_grouped_batch(batch).await;
            if !self.group_batch_delay.is_zero() {
                tokio::time::sleep(self.group_batch_delay).await;
            }
        }
    }

    async fn dispatch_grouped_batch(&self, mut batch: OrderBatch) {
        let (payloads, url) = match self.mapper.map_order_batch(&batch, &self.cache) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(adapter = %self.name, error = %e, "batch mapping failed");
                for order in &mut batch {
                    order.mark_failed(&self.name, None, e.clone());
                }
                if let Some(first) = batch.first() {
                    self.sink.write(first, self.mapper.provider()).await;
                }
                return;
            }
        };

        let method = self.mapper.http_method();
        let results = futures::future::join_all(payloads.iter().map(|payload| {
            http::send_with_retry(&self.client, method.clone(), &url, payload, self.max_retries)
        }))
        .await;

        let failure = results.iter().find_map(|r| r.as_ref().err().cloned());
        let first_mapped = payloads.into_iter().next();
        match failure {
            None => {
                let now = chrono::Utc::now();
                if let Some(first) = batch.first_mut() {
                    first.mark_sent(now, &self.name, first_mapped.unwrap_or_default());
                    self.sink.write(first, self.mapper.provider()).await;
                }
            }
            Some(reason) => {
                if let Some(first) = batch.first_mut() {
                    first.mark_failed(&self.name, first_mapped, reason);
                    self.sink.write(first, self.mapper.provider()).await;
                }
            }
        }
        // The remaining orders in the batch never receive a status update —
        // preserved from the original behavior; see DESIGN.md.
    }

    async fn send_single(&self, order: &mut Order) {
        let mapped = match self.mapper.map_order(order, &self.cache) {
            Ok(m) => m,
            Err(e) => {
                order.mark_failed(&self.name, None, e);
                self.sink.write(order, self.mapper.provider()).await;
                return;
            }
        };

        let method = self.mapper.http_method();
        let results = futures::future::join_all(mapped.iter().map(|(payload, url)| {
            http::send_with_retry(&self.client, method.clone(), url, payload, self.max_retries)
        }))
        .await;

        let total = results.len();
        let errors: Vec<String> = results.iter().filter_map(|r| r.as_ref().err().cloned()).collect();
        let succeeded = total - errors.len();
        let last_mapped = mapped.into_iter().next().map(|(p, _)| p).unwrap_or_default();

        if errors.is_empty() {
            order.mark_sent(chrono::Utc::now(), &self.name, last_mapped);
        } else if succeeded > 0 {
            order.mark_failed(
                &self.name,
                Some(last_mapped),
                format!("Sent to {succeeded}/{total} URLs. Errors: {}", errors.join("; ")),
            );
        } else {
            order.mark_failed(
                &self.name,
                Some(last_mapped),
                format!("Failed to send to all URLs. Errors: {}", errors.join("; ")),
            );
        }
        self.sink.write(order, self.mapper.provider()).await;
    }
}

#[async_trait]
impl<M: Mapper + 'static> Adapter for BaseAdapter<M> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_order(&self, mut batch: OrderBatch) -> OrderBatch {
        if !self.active {
            for order in &mut batch {
                order.mark_failed(&self.name, None, "adapter is inactive".to_string());
                self.sink.write(order, self.mapper.provider()).await;
            }
            return batch;
        }

        if let Some(grouping) = &self.grouping {
            for order in &mut batch {
                order.status = OrderStatus::Pending;
            }
            grouping.enqueue(batch.clone()).await;
            return batch;
        }

        if let Some(delay) = self.order_delay {
            let last = batch.len().saturating_sub(1);
            for (i, order) in batch.iter_mut().enumerate() {
                self.rate_limiter.acquire(1).await;
                self.send_single(order).await;
                if i != last {
                    tokio::time::sleep(delay).await;
                }
            }
            return batch;
        }

        // Full concurrency vs. rate-limited concurrency is the same code path:
        // a disabled `RateLimiter::acquire` is a no-op, so this only
        // serializes admission when a limiter is actually configured.
        futures::future::join_all(batch.iter_mut().map(|order| async move {
            self.rate_limiter.acquire(1).await;
            self.send_single(order).await;
        }))
        .await;

        batch
    }
}
