use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A small, blocking counting semaphore.
///
/// Bounds how many blocking jobs run at once.
pub struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// Holds one permit; releases it on drop, including when the job panics.
pub struct Permit<'a> {
    sem: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        assert!(permits > 0, "permits must be > 0");
        Self {
            permits: Mutex::new(permits),
            cv: Condvar::new(),
        }
    }

    /// Acquire one permit, waiting no later than `deadline`.
    ///
    /// Returns the permit and the time spent waiting, or `None` if the deadline passed first.
    pub fn acquire_until(&self, deadline: Instant) -> Option<(Permit<'_>, Duration)> {
        let start = Instant::now();
        let mut g = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *g == 0 {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            g = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *g -= 1;
        Some((Permit { sem: self }, start.elapsed()))
    }

    fn release(&self) {
        let mut g = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *g += 1;
        self.cv.notify_one();
    }
}
