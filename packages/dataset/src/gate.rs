//! Bounded-concurrency gate for chunk fetches.
//!
//! One gate protects the upstream artifact API from request bursts no
//! matter how many logical range queries are in flight. The gate is an
//! explicitly constructed, cloneable handle — callers decide its sharing
//! scope (per loader, or one per process shared across loaders) instead
//! of relying on hidden global state.
//!
//! Built on [`tokio::sync::Semaphore`], whose wait queue is FIFO-fair:
//! releasing a permit wakes the longest-waiting acquirer.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of simultaneous outstanding fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// A permit to perform one fetch. Dropping it releases the slot to the
/// oldest queued waiter.
pub type GatePermit = OwnedSemaphorePermit;

/// Bounds the number of simultaneous outstanding fetches.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyGate {
    /// Creates a gate allowing at most `max_concurrent` holders.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Acquires a slot, suspending FIFO-queued behind earlier waiters
    /// when all slots are held.
    pub async fn acquire(&self) -> GatePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            // The semaphore is private to the gate and never closed.
            .unwrap_or_else(|_| unreachable!("concurrency gate semaphore closed"))
    }

    /// The configured concurrency bound.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Slots currently free (used by tests and logging).
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn at_most_max_concurrent_permits_resolve_before_release() {
        let gate = ConcurrencyGate::new(4);

        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(gate.acquire().await);
        }
        assert_eq!(gate.available(), 0);

        // 2 * max_concurrent callers total: the remaining four must queue.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut waiters = Vec::new();
        for i in 0..4 {
            let gate = gate.clone();
            let tx = tx.clone();
            waiters.push(tokio::spawn(async move {
                let permit = gate.acquire().await;
                tx.send(i).ok();
                permit
            }));
        }

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_recv().is_err(), "waiter resolved before any release");

        // Releasing one slot unblocks exactly one waiter.
        held.pop();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "more than one waiter resolved");
    }

    #[tokio::test]
    async fn queued_waiters_resolve_in_fifo_order() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.acquire().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut waiters = Vec::new();
        for i in 0..3 {
            let gate = gate.clone();
            let tx = tx.clone();
            waiters.push(tokio::spawn(async move {
                let permit = gate.acquire().await;
                tx.send(i).ok();
                drop(permit);
            }));
            // Yield so this waiter is queued before the next one spawns.
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }

        drop(held);
        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(rx.recv().await.unwrap());
        }
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn dropping_a_permit_frees_the_slot() {
        let gate = ConcurrencyGate::new(2);
        let permit = gate.acquire().await;
        assert_eq!(gate.available(), 1);
        drop(permit);
        assert_eq!(gate.available(), 2);
    }
}
