//! Per-adapter order-grouping queue.
//!
//! Orders enqueued here accumulate until a background worker pops a
//! `group_limit`-bounded batch. `close()` wakes any waiter and makes
//! further empty dequeues return immediately instead of blocking.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

use crate::order::Order;

struct Inner {
    queue: VecDeque<Order>,
    closed: bool,
}

pub struct GroupingQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    group_limit: usize,
}

impl GroupingQueue {
    pub fn new(group_limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            group_limit: group_limit.max(1),
        }
    }

    pub async fn enqueue(&self, orders: Vec<Order>) {
        {
            let mut guard = self.inner.lock().await;
            guard.queue.extend(orders);
        }
        self.notify.notify_one();
    }

    pub async fn close(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.closed = true;
        }
        self.notify.notify_waiters();
    }

    /// Pops up to `group_limit` orders. Blocks while empty and open;
    /// returns an empty vec once closed and drained.
    pub async fn dequeue_batch(&self) -> Vec<Order> {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if !guard.queue.is_empty() {
                    let n = self.group_limit.min(guard.queue.len());
                    return guard.queue.drain(..n).collect();
                }
                if guard.closed {
                    return Vec::new();
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_cache;
    use chrono::{TimeZone, Utc};

    fn sample_order(id: &str) -> Order {
        let cache = test_cache();
        let _ = cache; // cache unused here, kept for symmetry with other fixtures
        let now = Utc.with_ymd_and_hms(2025, 10, 9, 10, 30, 0).unwrap();
        crate::order::Order::new(
            Some(id.to_string()),
            "S1".into(),
            "NIFTY".into(),
            "25000".into(),
            75,
            "2025-10-16".into(),
            crate::order::Side::Buy,
            crate::order::Exchange::Nfo,
            crate::order::Product::Nrml,
            crate::order::OptionType::Call,
            now,
            now,
            "raw".into(),
        )
    }

    #[tokio::test]
    async fn dequeue_respects_group_limit() {
        let q = GroupingQueue::new(2);
        q.enqueue(vec![sample_order("1"), sample_order("2"), sample_order("3")])
            .await;
        let batch1 = q.dequeue_batch().await;
        assert_eq!(batch1.len(), 2);
        let batch2 = q.dequeue_batch().await;
        assert_eq!(batch2.len(), 1);
    }

    #[tokio::test]
    async fn close_wakes_waiter_with_empty_batch() {
        let q = std::sync::Arc::new(GroupingQueue::new(10));
        let q2 = q.clone();
        let handle = tokio::spawn(async move { q2.dequeue_batch().await });
        tokio::task::yield_now().await;
        q.close().await;
        let batch = handle.await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn preserves_enqueue_order() {
        let q = GroupingQueue::new(10);
        q.enqueue(vec![sample_order("a"), sample_order("b")]).await;
        q.enqueue(vec![sample_order("c")]).await;
        let batch = q.dequeue_batch().await;
        let ids: Vec<_> = batch.iter().map(|o| o.order_id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
