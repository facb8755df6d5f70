//! FIFO message queues and the worker pools that drain them.
//!
//! Pushing never blocks. Workers wait on a [`tokio::sync::Notify`] until a
//! message arrives or the queue is closed; a closed queue is drained before
//! workers exit.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

struct QueueState<M> {
    items: VecDeque<M>,
    closed: bool,
}

pub struct MessageQueue<M> {
    name: &'static str,
    state: Mutex<QueueState<M>>,
    notify: Notify,
}

impl<M> MessageQueue<M> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> MutexGuard<'_, QueueState<M>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(queue = self.name, "queue lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Appends a message. Returns false if the queue was closed.
    pub fn push(&self, msg: M) -> bool {
        {
            let mut state = self.state();
            if state.closed {
                tracing::warn!(queue = self.name, "dropping message pushed to closed queue");
                return false;
            }
            state.items.push_back(msg);
        }
        self.notify.notify_one();
        true
    }

    /// Waits for the next message. Returns `None` once closed and empty.
    pub async fn pop(&self) -> Option<M> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(msg) = state.items.pop_front() {
                    return Some(msg);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Removes queued messages matching `pred`. Returns how many were removed.
    pub fn delete_matching(&self, pred: impl Fn(&M) -> bool) -> usize {
        let mut state = self.state();
        let before = state.items.len();
        state.items.retain(|msg| !pred(msg));
        before - state.items.len()
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting messages and wakes idle workers.
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_waiters();
    }
}

/// Spawns `count` workers that feed every message of `queue` to `handler`.
/// Each message is handled in its own task so a panic is logged and the
/// worker moves on.
pub fn spawn_workers<M, F, Fut>(
    queue: Arc<MessageQueue<M>>,
    count: usize,
    handler: F,
) -> Vec<JoinHandle<()>>
where
    M: Send + 'static,
    F: Fn(M) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let count = count.max(1);
    tracing::info!(queue = queue.name(), count, "starting workers");

    (0..count)
        .map(|worker| {
            let queue = queue.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                while let Some(msg) = queue.pop().await {
                    // A panicking message must not take the worker with it.
                    if let Err(err) = tokio::spawn(handler(msg)).await {
                        tracing::error!(
                            queue = queue.name(),
                            worker,
                            error = %err,
                            "message handler panicked"
                        );
                    }
                }
                tracing::debug!(queue = queue.name(), worker, "worker stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fifo_order_and_close() {
        let queue = MessageQueue::new("test");
        assert!(queue.push(1));
        assert!(queue.push(2));
        queue.close();
        assert!(!queue.push(3));

        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn delete_matching_prunes_queued_messages() {
        let queue = MessageQueue::new("test");
        for i in 0..6 {
            queue.push(i);
        }
        assert_eq!(queue.delete_matching(|n| n % 2 == 0), 3);
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn workers_drain_queue_then_stop() {
        let queue = Arc::new(MessageQueue::new("test"));
        let seen = Arc::new(AtomicUsize::new(0));

        let handles = spawn_workers(queue.clone(), 3, {
            let seen = seen.clone();
            move |n: usize| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(n, Ordering::SeqCst);
                }
            }
        });

        for n in 1..=10 {
            queue.push(n);
        }
        queue.close();
        for handle in handles {
            handle.await.expect("worker should not panic");
        }
        assert_eq!(seen.load(Ordering::SeqCst), 55);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_stop_the_worker() {
        let queue = Arc::new(MessageQueue::new("test"));
        let seen = Arc::new(AtomicUsize::new(0));

        let handles = spawn_workers(queue.clone(), 1, {
            let seen = seen.clone();
            move |n: usize| {
                let seen = seen.clone();
                async move {
                    if n == 2 {
                        panic!("handler failed on {n}");
                    }
                    seen.fetch_add(n, Ordering::SeqCst);
                }
            }
        });

        for n in 1..=4 {
            queue.push(n);
        }
        queue.close();
        for handle in handles {
            handle.await.expect("worker should survive a handler panic");
        }
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }
}
