//! Fan-out-without-fan-in dispatch: pulls batches off the queue and hands
//! each to every registered adapter concurrently, never waiting on an
//! individual adapter's send before accepting the next batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::adapter::Adapter;
use crate::queue::{Poll, QueueConsumer};

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Dispatcher {
    adapters: Vec<Arc<dyn Adapter>>,
    processing_timeout: Duration,
}

impl Dispatcher {
    pub fn new(adapters: Vec<Arc<dyn Adapter>>, processing_timeout: Duration) -> Self {
        Self {
            adapters,
            processing_timeout,
        }
    }

    /// Runs until the queue closes or `shutdown` is set, then awaits
    /// in-flight adapter sends with a bounded timeout before returning.
    pub async fn run(&self, mut consumer: QueueConsumer, mut shutdown: watch::Receiver<bool>) {
        let mut in_flight = JoinSet::new();
        loop {
            if *shutdown.borrow() {
                break;
            }
            match consumer.recv_or_tick().await {
                Poll::Batch(batch) => {
                    for adapter in &self.adapters {
                        let adapter = adapter.clone();
                        let batch = batch.clone();
                        let name = adapter.name().to_string();
                        let deadline = self.processing_timeout;
                        in_flight.spawn(async move {
                            if tokio::time::timeout(deadline, adapter.send_order(batch)).await.is_err() {
                                tracing::warn!(adapter = %name, "adapter send exceeded processing timeout, abandoning");
                            }
                        });
                    }
                }
                Poll::Tick => {}
                Poll::Closed => break,
            }
        }
        Self::drain(in_flight).await;
    }

    async fn drain(mut in_flight: JoinSet<()>) {
        let wait_all = async {
            while in_flight.join_next().await.is_some() {}
        };
        match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, wait_all).await {
            Ok(()) => tracing::info!("all in-flight adapter sends completed"),
            Err(_) => tracing::warn!("shutdown drain timed out with adapter sends still in flight"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Exchange, OptionType, OrderBatch, Product, Side};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tokio::sync::watch;

    struct RecordingAdapter {
        name: String,
        received: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Adapter for RecordingAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send_order(&self, batch: OrderBatch) -> OrderBatch {
            let mut received = self.received.lock().unwrap();
            received.extend(batch.iter().map(|o| o.order_id.clone()));
            batch
        }
    }

    fn sample_order(id: &str) -> crate::order::Order {
        let now = Utc.with_ymd_and_hms(2025, 10, 9, 10, 30, 0).unwrap();
        crate::order::Order::new(
            Some(id.to_string()),
            "S1".into(),
            "NIFTY".into(),
            "25000".into(),
            75,
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

    #[tokio::test(start_paused = true)]
    async fn fans_out_every_batch_to_every_adapter() {
        let (producer, consumer) = crate::queue::bounded(4);
        let received_a = Arc::new(Mutex::new(Vec::new()));
        let received_b = Arc::new(Mutex::new(Vec::new()));
        let adapters: Vec<Arc<dyn Adapter>> = vec![
            Arc::new(RecordingAdapter { name: "a".into(), received: received_a.clone() }),
            Arc::new(RecordingAdapter { name: "b".into(), received: received_b.clone() }),
        ];
        let dispatcher = Dispatcher::new(adapters, Duration::from_secs(30));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        producer.try_enqueue(vec![sample_order("o1")]);

        let handle = tokio::spawn(async move { dispatcher.run(consumer, shutdown_rx).await });
        tokio::time::advance(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        handle.await.unwrap();

        assert_eq!(*received_a.lock().unwrap(), vec!["o1".to_string()]);
        assert_eq!(*received_b.lock().unwrap(), vec!["o1".to_string()]);
    }
}
