//! Bounded FIFO of order batches between the tailer-side producer and the
//! dispatcher.

use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::order::OrderBatch;

pub struct QueueProducer {
    tx: mpsc::Sender<OrderBatch>,
}

impl QueueProducer {
    /// Non-blocking enqueue. On a full queue the batch is dropped and a
    /// warning logged — backpressure is shed at this boundary.
    pub fn try_enqueue(&self, batch: OrderBatch) {
        match self.tx.try_send(batch) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(batch)) => {
                tracing::warn!(dropped_orders = batch.len(), "order queue full, dropping batch");
            }
            Err(mpsc::error::TrySendError::Closed(batch)) => {
                tracing::warn!(dropped_orders = batch.len(), "order queue closed, dropping batch");
            }
        }
    }
}

pub struct QueueConsumer {
    rx: mpsc::Receiver<OrderBatch>,
}

impl QueueConsumer {
    /// Blocks on dequeue with a 1s poll cadence so shutdown is observed
    /// promptly: returns `None` on each timeout tick, `Some(None)` once the
    /// channel is closed and drained.
    pub async fn recv_or_tick(&mut self) -> Poll {
        match tokio::time::timeout(Duration::from_secs(1), self.rx.recv()).await {
            Ok(Some(batch)) => Poll::Batch(batch),
            Ok(None) => Poll::Closed,
            Err(_) => Poll::Tick,
        }
    }
}

pub enum Poll {
    Batch(OrderBatch),
    Tick,
    Closed,
}

pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueProducer { tx }, QueueConsumer { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_drops_and_does_not_block() {
        let (producer, mut consumer) = bounded(1);
        producer.try_enqueue(vec![]);
        producer.try_enqueue(vec![]); // dropped, queue full
        match consumer.recv_or_tick().await {
            Poll::Batch(_) => {}
            _ => panic!("expected the first batch"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recv_ticks_when_empty() {
        let (_producer, mut consumer) = bounded(4);
        let handle = tokio::spawn(async move { consumer.recv_or_tick().await });
        tokio::time::advance(Duration::from_secs(1)).await;
        match handle.await.unwrap() {
            Poll::Tick => {}
            _ => panic!("expected a tick on an empty, still-open queue"),
        }
    }
}
