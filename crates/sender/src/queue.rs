use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_core::{Message, SendError};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::options::SendOptions;

/// One deferred send, owned by the queue from enqueue until dequeue.
#[derive(Clone)]
pub struct QueueItem {
    /// The message to deliver.
    pub message: Arc<dyn Message>,
    /// The options the send was issued with.
    pub options: SendOptions,
    /// When the item entered the queue.
    pub enqueued_at: Instant,
    /// When the item becomes eligible for delivery.
    pub ready_at: Instant,
}

impl QueueItem {
    /// Build an item, applying the optional delivery delay.
    pub fn new(message: Arc<dyn Message>, options: SendOptions, delay: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            message,
            options,
            enqueued_at: now,
            ready_at: now + delay.unwrap_or(Duration::ZERO),
        }
    }
}

impl std::fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueItem")
            .field("msg_id", &self.message.msg_id())
            .field("ready_at", &self.ready_at)
            .finish_non_exhaustive()
    }
}

/// FIFO buffer between async accept and delivery.
///
/// The contract allows durable external implementations; the engine ships
/// [`MemoryQueue`]. `dequeue` blocks until an item is *ready*
/// (its `ready_at` reached) or the queue is closed and drained.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Add an item. Fails once the queue is closed.
    async fn enqueue(&self, item: QueueItem) -> Result<(), SendError>;

    /// Wait for the next ready item; `None` once closed and drained.
    async fn dequeue(&self) -> Option<QueueItem>;

    /// Stop accepting items. Already queued items may still be dequeued.
    fn close(&self);
}

/// In-process [`Queue`]: FIFO among ready items, with delayed items
/// becoming eligible at their `ready_at`.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<QueueItem>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Items currently buffered (ready or not).
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn enqueue(&self, item: QueueItem) -> Result<(), SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::Queue("queue is closed".into()));
        }
        self.items.lock().push_back(item);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Option<QueueItem> {
        loop {
            let wait = {
                let mut items = self.items.lock();
                let now = Instant::now();
                if let Some(pos) = items.iter().position(|item| item.ready_at <= now) {
                    return items.remove(pos);
                }
                if items.is_empty() && self.closed.load(Ordering::Acquire) {
                    return None;
                }
                items
                    .iter()
                    .map(|item| item.ready_at.saturating_duration_since(now))
                    .min()
            };

            match wait {
                Some(until_ready) => {
                    tokio::select! {
                        () = self.notify.notified() => {}
                        () = tokio::time::sleep(until_ready) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("len", &self.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
