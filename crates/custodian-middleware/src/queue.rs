//! FIFO admission queue for a serialized stage.
//!
//! A [`StageQueue`] has a single active slot. Callers wait in arrival order
//! and hold an [`Activation`] while they are inside the stage. Dropping the
//! activation, whether normally, on panic or on cancellation, admits the next
//! waiter, so a failed activation can never wedge the queue.
//!
//! Ordering relies on `tokio::sync::Mutex`, which grants the lock to waiters
//! in the order they started waiting.

use custodian_telemetry::metrics::record_queue_depth;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Single-slot FIFO queue guarding one stage.
#[derive(Debug, Clone)]
pub struct StageQueue {
    name: &'static str,
    slot: Arc<Mutex<()>>,
    depth: Arc<AtomicUsize>,
    tickets: Arc<AtomicU64>,
}

impl StageQueue {
    /// Creates an idle queue for the named stage.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(())),
            depth: Arc::new(AtomicUsize::new(0)),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of activations that are active or waiting.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Returns true if nothing is active or waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.depth() == 0
    }

    /// Waits for the active slot.
    ///
    /// Activations are granted in the order `admit` was first polled.
    pub async fn admit(&self) -> Activation {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst);
        // registered before waiting so a cancelled waiter still decrements
        let waiting = DepthGuard::enter(self.name, Arc::clone(&self.depth));
        debug!(stage = self.name, ticket, depth = waiting.current(), "Waiting for stage");

        let slot = Arc::clone(&self.slot).lock_owned().await;
        debug!(stage = self.name, ticket, "Stage admitted");

        Activation {
            stage: self.name,
            ticket,
            _slot: slot,
            _depth: waiting,
        }
    }
}

/// Proof that the holder occupies a stage's active slot.
///
/// The slot is released when the activation is dropped.
#[derive(Debug)]
pub struct Activation {
    stage: &'static str,
    ticket: u64,
    // field order matters: release the slot before the depth decrement
    _slot: OwnedMutexGuard<()>,
    _depth: DepthGuard,
}

impl Activation {
    /// Returns the stage this activation belongs to.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Returns the arrival number of this activation within its stage.
    #[must_use]
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        debug!(stage = self.stage, ticket = self.ticket, "Stage released");
    }
}

#[derive(Debug)]
struct DepthGuard {
    stage: &'static str,
    depth: Arc<AtomicUsize>,
}

impl DepthGuard {
    fn enter(stage: &'static str, depth: Arc<AtomicUsize>) -> Self {
        let current = depth.fetch_add(1, Ordering::SeqCst) + 1;
        record_queue_depth(stage, current);
        Self { stage, depth }
    }

    fn current(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let current = self.depth.fetch_sub(1, Ordering::SeqCst) - 1;
        record_queue_depth(self.stage, current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_depth(queue: &StageQueue, depth: usize) {
        while queue.depth() != depth {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_single_admission() {
        let queue = StageQueue::new("test");
        assert!(queue.is_idle());

        let activation = queue.admit().await;
        assert_eq!(activation.stage(), "test");
        assert_eq!(activation.ticket(), 0);
        assert_eq!(queue.depth(), 1);

        drop(activation);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_second_waiter_blocks_until_release() {
        let queue = StageQueue::new("test");
        let first = queue.admit().await;

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.admit().await.ticket() })
        };
        wait_for_depth(&queue, 2).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert_eq!(waiter.await.unwrap(), 1);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_admission_order_is_fifo() {
        let queue = StageQueue::new("test");
        let first = queue.admit().await;
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let waiter = queue.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _activation = waiter.admit().await;
                order.lock().unwrap().push(i);
            }));
            // each waiter is registered before the next one is spawned
            wait_for_depth(&queue, i + 2).await;
        }

        drop(first);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_depth() {
        let queue = StageQueue::new("test");
        let first = queue.admit().await;

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let _activation = queue.admit().await;
            })
        };
        wait_for_depth(&queue, 2).await;

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(queue.depth(), 1);

        drop(first);
        assert!(queue.is_idle());
        let again = queue.admit().await;
        assert_eq!(again.ticket(), 2);
    }
}
