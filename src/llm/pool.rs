//! Bounded worker permits.
//!
//! The LLM is external and latency-bound, so synthesis tasks run in
//! parallel, but only up to the configured pool size, to avoid
//! overwhelming it. A permit is acquired before each invocation and
//! released on drop.

use std::sync::{Condvar, Mutex};

/// Semaphore bounding concurrent LLM invocations.
#[derive(Debug)]
pub struct WorkerPool {
    available: Mutex<usize>,
    condvar: Condvar,
    capacity: usize,
}

/// A held permit; releases its slot on drop.
pub struct Permit<'a> {
    pool: &'a WorkerPool,
}

impl WorkerPool {
    /// Creates a pool with the given capacity (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            available: Mutex::new(capacity),
            condvar: Condvar::new(),
            capacity,
        }
    }

    /// The configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks until a permit is available.
    #[must_use]
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while *available == 0 {
            available = self
                .condvar
                .wait(available)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        *available -= 1;
        Permit { pool: self }
    }

    /// Takes a permit without blocking, when one is free.
    #[must_use]
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(Permit { pool: self })
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut available = self
            .pool
            .available
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *available += 1;
        self.pool.condvar.notify_one();
    }
}
