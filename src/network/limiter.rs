//! Connection Limiter
//!
//! Counted permits bounding the number of concurrently served connections.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded pool of connection permits
#[derive(Debug)]
pub struct ConnectionLimiter {
    /// Permits currently held
    active: AtomicUsize,

    /// Upper bound on `active`
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            max,
        })
    }

    /// Take a permit without waiting; `None` when all are in use
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionPermit> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.max).then_some(active + 1)
            })
            .ok()
            .map(|_| ConnectionPermit {
                limiter: Arc::clone(self),
            })
    }

    /// Number of permits currently held
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// A held permit; released on drop
#[derive(Debug)]
pub struct ConnectionPermit {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limiter.active.fetch_sub(1, Ordering::AcqRel);
    }
}
