//! The global cap on outbound requests.
//!
//! Page fetches and cover fetches draw permits from the same [`RequestLimiter`], so at most `K`
//! requests of either kind are awaiting a response at any instant. Each request holds its permit only
//! while it is in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{Error, Result};

/// Cheap to clone, all clones share one semaphore.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    capacity: usize,
}

/// Holds one slot until dropped.
#[derive(Debug)]
pub struct RequestSlot {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl RequestLimiter {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("concurrency limit must be at least 1".into()));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            capacity,
        })
    }

    /// Waits for a free slot. Only fails if the limiter was closed.
    pub async fn acquire(&self) -> Result<RequestSlot> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(RequestSlot {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Makes every pending and future `acquire` fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots held at the same time so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for RequestSlot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinSet;

    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(RequestLimiter::new(0), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn never_exceeds_capacity() {
        let limiter = RequestLimiter::new(3).unwrap();
        let mut set = JoinSet::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            set.spawn(async move {
                let _slot = limiter.acquire().await.unwrap();
                assert!(limiter.in_flight() <= 3);
                tokio::time::sleep(Duration::from_millis(5)).await;
            });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap();
        }

        assert!(limiter.peak() <= 3);
        assert!(limiter.peak() >= 1);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn slot_is_released_on_drop() {
        let limiter = RequestLimiter::new(1).unwrap();
        let slot = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 1);
        drop(slot);
        assert_eq!(limiter.in_flight(), 0);
        // Would hang forever if the first slot leaked.
        let _again = tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(limiter.capacity(), 1);
    }

    #[tokio::test]
    async fn closed_limiter_refuses_slots() {
        let limiter = RequestLimiter::new(2).unwrap();
        limiter.close();
        assert!(matches!(
            limiter.acquire().await,
            Err(Error::LimiterClosed(_))
        ));
    }
}
