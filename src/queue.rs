//! Per-car request queue with nearest-first ordering

use crate::car::Floor;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

/// Request identifier
pub type RequestId = String;

/// A ride from one floor to another
///
/// `source_floor == destination_floor` is allowed and produces a
/// zero-length trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloorRequest {
    pub source_floor: Floor,
    pub destination_floor: Floor,
}

impl FloorRequest {
    /// Create a new request
    pub fn new(source_floor: Floor, destination_floor: Floor) -> Self {
        Self {
            source_floor,
            destination_floor,
        }
    }

    /// Distance from `floor` to this request's pickup floor
    pub fn pickup_distance(&self, floor: Floor) -> u32 {
        self.source_floor.abs_diff(floor)
    }
}

/// A request waiting in a car's queue
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub id: RequestId,
    pub request: FloorRequest,
    /// When the request was accepted by the dispatcher
    pub submitted_at: Instant,
}

impl QueuedRequest {
    /// Wrap a request with a fresh id
    pub fn new(request: FloorRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            submitted_at: Instant::now(),
        }
    }
}

/// Pending requests of one car.
///
/// The dispatcher only appends; the owning car's loop is the only consumer.
/// Requests are not served in arrival order: each pop picks the request
/// whose source floor is nearest to the floor the car is on at that moment,
/// with ties going to the earliest arrival.
pub struct RequestQueue {
    /// Pending requests in arrival order
    pending: Mutex<Vec<QueuedRequest>>,
    /// Signalled on every enqueue
    available: Notify,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            available: Notify::new(),
        }
    }

    /// Append a request and wake the consumer. Never rejects.
    pub async fn enqueue(&self, request: QueuedRequest) {
        self.pending.lock().await.push(request);
        self.available.notify_one();
    }

    /// Remove and return the request nearest to `current_floor`.
    ///
    /// Selection and removal happen under one lock acquisition. Returns
    /// `None` when the queue is empty.
    pub async fn pop_nearest(&self, current_floor: Floor) -> Option<QueuedRequest> {
        let mut pending = self.pending.lock().await;
        let index = pending
            .iter()
            .enumerate()
            .min_by_key(|(index, queued)| (queued.request.pickup_distance(current_floor), *index))
            .map(|(index, _)| index)?;
        Some(pending.remove(index))
    }

    /// Wait until a request has been enqueued.
    ///
    /// An enqueue that happens before the wait starts is not lost: the
    /// stored permit completes the next wait immediately. Wake-ups may be
    /// spurious, so callers re-check with [`RequestQueue::pop_nearest`].
    pub async fn wait_for_work(&self) {
        self.available.notified().await;
    }

    /// Remove every pending request, oldest first
    pub async fn drain_all(&self) -> Vec<QueuedRequest> {
        std::mem::take(&mut *self.pending.lock().await)
    }

    /// Number of pending requests
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether no requests are pending
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn queued(source: Floor, destination: Floor) -> QueuedRequest {
        QueuedRequest::new(FloorRequest::new(source, destination))
    }

    #[test]
    fn test_pickup_distance() {
        let request = FloorRequest::new(3, 10);
        assert_eq!(request.pickup_distance(0), 3);
        assert_eq!(request.pickup_distance(3), 0);
        assert_eq!(request.pickup_distance(8), 5);
    }

    #[test]
    fn test_queued_request_ids_unique() {
        let a = queued(1, 2);
        let b = queued(1, 2);
        assert_ne!(a.id, b.id);
        assert_eq!(a.request, b.request);
    }

    #[tokio::test]
    async fn test_pop_empty_returns_none() {
        let queue = RequestQueue::new();
        assert!(queue.pop_nearest(0).await.is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_nearest_first_rescored_at_each_pop() {
        let queue = RequestQueue::new();
        for source in [9, 1, 6] {
            queue.enqueue(queued(source, source)).await;
        }
        assert_eq!(queue.len().await, 3);

        // Car at 5 takes 6, then from 6: 9 is 3 away, 1 is 5 away.
        let first = queue.pop_nearest(5).await.unwrap();
        assert_eq!(first.request.source_floor, 6);
        let second = queue.pop_nearest(6).await.unwrap();
        assert_eq!(second.request.source_floor, 9);
        let third = queue.pop_nearest(9).await.unwrap();
        assert_eq!(third.request.source_floor, 1);
        assert!(queue.pop_nearest(1).await.is_none());
    }

    #[tokio::test]
    async fn test_ties_break_by_arrival_order() {
        let queue = RequestQueue::new();
        let below = queued(3, 0);
        let above = queued(7, 10);
        let below_id = below.id.clone();
        let above_id = above.id.clone();
        queue.enqueue(below).await;
        queue.enqueue(above).await;

        assert_eq!(queue.pop_nearest(5).await.unwrap().id, below_id);
        assert_eq!(queue.pop_nearest(5).await.unwrap().id, above_id);
    }

    #[tokio::test]
    async fn test_same_source_served_in_arrival_order() {
        let queue = RequestQueue::new();
        let ids: Vec<_> = (0..4)
            .map(|destination| queued(2, destination))
            .collect();
        for q in &ids {
            queue.enqueue(q.clone()).await;
        }
        for expected in &ids {
            assert_eq!(queue.pop_nearest(0).await.unwrap().id, expected.id);
        }
    }

    #[tokio::test]
    async fn test_drain_all() {
        let queue = RequestQueue::new();
        queue.enqueue(queued(1, 2)).await;
        queue.enqueue(queued(3, 4)).await;

        let drained = queue.drain_all().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].request.source_floor, 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_enqueue_before_wait_is_not_lost() {
        let queue = RequestQueue::new();
        queue.enqueue(queued(1, 2)).await;

        tokio::time::timeout(Duration::from_millis(100), queue.wait_for_work())
            .await
            .expect("stored permit should complete the wait");
    }

    #[tokio::test]
    async fn test_wait_wakes_on_enqueue() {
        let queue = Arc::new(RequestQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.wait_for_work().await;
                queue.pop_nearest(0).await
            })
        };

        tokio::task::yield_now().await;
        queue.enqueue(queued(4, 8)).await;

        let popped = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(popped.unwrap().request.source_floor, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_and_pop_lose_nothing() {
        let queue = Arc::new(RequestQueue::new());
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for i in 0..50 {
                        queue.enqueue(queued((p + i) % 20, 0)).await;
                    }
                })
            })
            .collect();

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut popped = 0;
                while popped < 400 {
                    match queue.pop_nearest(10).await {
                        Some(_) => popped += 1,
                        None => queue.wait_for_work().await,
                    }
                }
                popped
            })
        };

        for producer in producers {
            producer.await.unwrap();
        }
        let popped = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .expect("consumer should finish")
            .unwrap();
        assert_eq!(popped, 400);
        assert!(queue.is_empty().await);
    }
}
