//! Bounded execution of blocking work.
//!
//! Store persistence and PDF rendering are the only potentially long-running calls in the
//! pipeline. [`ExecutionEngine`] runs them on a dedicated rayon pool so callers can give up after
//! a timeout instead of hanging:
//!
//! - per-job timeout, reported as [`JobError::TimedOut`]
//! - a semaphore bounding jobs in flight (throttle waits count against the timeout)
//! - real-time metrics + observer hooks for monitoring
//!
//! Each job receives its [`Deadline`]. A job that publishes state commits through it first, so a
//! caller never reports a timeout for work that became visible.

mod observer;
mod semaphore;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

pub use observer::{
    ActiveJob, ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, JobKind,
    LogExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads. If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on concurrently executing jobs.
    pub max_in_flight_jobs: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
            max_in_flight_jobs: n.max(1),
        }
    }
}

const PENDING: u8 = 0;
const COMMITTED: u8 = 1;
const ABANDONED: u8 = 2;

/// Time limit of one job, shared between the job and the caller waiting on it.
///
/// A job that publishes state calls [`Deadline::try_commit`] immediately before publishing. The
/// caller abandons the deadline when it stops waiting. Exactly one side wins: a committed job is
/// always waited for, and a job that fails to commit must publish nothing.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    at: Instant,
    state: Arc<AtomicU8>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started + timeout,
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time since the deadline was set.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Claim the right to publish.
    ///
    /// Returns `false` once the deadline has passed or the caller has stopped waiting. Calling it
    /// again after a successful commit returns `true`.
    pub fn try_commit(&self) -> bool {
        if self.expired() {
            self.abandon();
        }
        match self
            .state
            .compare_exchange(PENDING, COMMITTED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(state) => state == COMMITTED,
        }
    }

    /// Stop waiting. Returns `false` if the job already committed.
    fn abandon(&self) -> bool {
        match self
            .state
            .compare_exchange(PENDING, ABANDONED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(state) => state == ABANDONED,
        }
    }
}

/// Why a job produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The caller stopped waiting.
    TimedOut { elapsed: Duration },
    /// The job panicked.
    Failed { message: String },
}

enum JobOutcome<T> {
    Ran(T),
    Throttled,
}

/// Runs blocking jobs with a timeout on a bounded pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    permits: Arc<Semaphore>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight_jobs == 0`, `num_threads == Some(0)`, or the thread pool cannot
    /// be built.
    pub fn new(opts: ExecutionOptions) -> Self {
        assert!(opts.max_in_flight_jobs > 0, "max_in_flight_jobs must be > 0");
        if let Some(n) = opts.num_threads {
            assert!(n > 0, "num_threads must be > 0 when set");
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("equipment-analytics-{i}"))
            .panic_handler(|_| log::error!("execution job panicked"))
            .build()
            .expect("failed to build rayon thread pool");

        Self {
            pool,
            permits: Arc::new(Semaphore::new(opts.max_in_flight_jobs)),
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run `job` on the pool and wait at most `timeout` for its result.
    ///
    /// The job is skipped entirely if it cannot get a permit before the deadline. A job that is
    /// still running when the timeout elapses keeps running, but its result is dropped unless it
    /// already committed through [`Deadline::try_commit`]. In that case the caller waits for the
    /// result past `timeout`.
    pub fn run_with_timeout<T, F>(&self, kind: JobKind, timeout: Duration, job: F) -> Result<T, JobError>
    where
        F: FnOnce(Deadline) -> T + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Deadline::after(timeout);
        let start = deadline.started;
        let (tx, rx) = mpsc::sync_channel::<JobOutcome<T>>(1);

        let job_deadline = deadline.clone();
        let permits = Arc::clone(&self.permits);
        let metrics = Arc::clone(&self.metrics);
        let observer = self.observer.clone();
        self.pool.spawn(move || {
            let emit = |event: ExecutionEvent| {
                if let Some(obs) = &observer {
                    obs.on_event(&event);
                }
            };

            let Some((_permit, waited)) = permits.acquire_until(job_deadline.instant()) else {
                let _ = tx.send(JobOutcome::Throttled);
                return;
            };
            if waited > Duration::ZERO {
                metrics.on_throttle_wait(waited);
                emit(ExecutionEvent::ThrottleWaited {
                    kind,
                    duration: waited,
                });
            }

            emit(ExecutionEvent::JobStarted { kind });
            let active = metrics.start_job();
            let out = job(job_deadline);
            active.finish();

            // The caller may be waiting on a committed job; observers must not delay it.
            let _ = tx.send(JobOutcome::Ran(out));
            emit(ExecutionEvent::JobFinished {
                kind,
                elapsed: start.elapsed(),
            });
        });

        let received = match rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) if !deadline.abandon() => {
                log::debug!("{kind} job committed before its timeout, waiting for its result");
                rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
            }
            other => other,
        };

        match received {
            Ok(JobOutcome::Ran(out)) => Ok(out),
            Ok(JobOutcome::Throttled) | Err(RecvTimeoutError::Timeout) => {
                self.metrics.on_timeout();
                self.emit(ExecutionEvent::JobTimedOut { kind, timeout });
                Err(JobError::TimedOut {
                    elapsed: start.elapsed(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.metrics.on_failure();
                self.emit(ExecutionEvent::JobFailed { kind });
                Err(JobError::Failed {
                    message: format!("{kind} job terminated without a result"),
                })
            }
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(ExecutionOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{Deadline, ExecutionEngine, ExecutionOptions, JobError, JobKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crate::execution::{ExecutionEvent, ExecutionObserver};

    fn engine(threads: usize, in_flight: usize) -> ExecutionEngine {
        ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(threads),
            max_in_flight_jobs: in_flight,
        })
    }

    #[test]
    fn fast_job_returns_its_value() {
        let engine = engine(2, 2);
        let out = engine.run_with_timeout(JobKind::Render, Duration::from_secs(5), |_| 41 + 1);
        assert_eq!(out, Ok(42));

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.jobs_started, 1);
        assert_eq!(snap.jobs_finished, 1);
        assert_eq!(snap.jobs_timed_out, 0);
    }

    #[test]
    fn slow_job_times_out_and_sees_expired_deadline() {
        let engine = engine(2, 2);
        let saw_expired = Arc::new(AtomicUsize::new(0));
        let saw = Arc::clone(&saw_expired);

        let out = engine.run_with_timeout(JobKind::Persist, Duration::from_millis(20), move |deadline| {
            std::thread::sleep(Duration::from_millis(80));
            if deadline.expired() {
                saw.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(matches!(out, Err(JobError::TimedOut { .. })));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(saw_expired.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metrics().snapshot().jobs_timed_out, 1);
    }

    #[test]
    fn panicking_job_is_reported_as_failed() {
        let engine = engine(1, 1);
        let out: Result<(), JobError> =
            engine.run_with_timeout(JobKind::Render, Duration::from_secs(5), |_| panic!("boom"));
        assert!(matches!(out, Err(JobError::Failed { .. })));
        assert_eq!(engine.metrics().snapshot().jobs_failed, 1);

        // The permit and the active slot were released by the unwinding job.
        let again = engine.run_with_timeout(JobKind::Render, Duration::from_secs(5), |_| 7);
        assert_eq!(again, Ok(7));
        let snap = engine.metrics().snapshot();
        assert_eq!(snap.max_active_jobs, 1);
        assert_eq!(snap.jobs_started, 2);
        assert_eq!(snap.jobs_finished, 1);
    }

    #[test]
    fn commit_and_abandon_are_exclusive() {
        let committed = Deadline::after(Duration::from_secs(5));
        assert!(committed.try_commit());
        assert!(committed.try_commit());
        assert!(!committed.abandon());

        let abandoned = Deadline::after(Duration::from_secs(5));
        assert!(abandoned.abandon());
        assert!(!abandoned.try_commit());

        let expired = Deadline::after(Duration::ZERO);
        assert!(!expired.try_commit());
        assert!(expired.abandon());
    }

    #[test]
    fn committed_job_is_waited_for_past_its_timeout() {
        let engine = engine(2, 2);
        let out = engine.run_with_timeout(JobKind::Persist, Duration::from_millis(30), |deadline| {
            assert!(deadline.try_commit());
            std::thread::sleep(Duration::from_millis(120));
            "published"
        });
        assert_eq!(out, Ok("published"));
        assert_eq!(engine.metrics().snapshot().jobs_timed_out, 0);
    }

    #[test]
    fn job_that_misses_its_deadline_cannot_commit() {
        let engine = engine(2, 2);
        let committed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&committed);
        let out = engine.run_with_timeout(JobKind::Persist, Duration::from_millis(20), move |deadline| {
            std::thread::sleep(Duration::from_millis(80));
            if deadline.try_commit() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(matches!(out, Err(JobError::TimedOut { .. })));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(committed.load(Ordering::SeqCst), 0);
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl ExecutionObserver for RecordingObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            let name = match event {
                ExecutionEvent::JobStarted { .. } => "started",
                ExecutionEvent::ThrottleWaited { .. } => "throttled",
                ExecutionEvent::JobFinished { .. } => "finished",
                ExecutionEvent::JobTimedOut { .. } => "timed_out",
                ExecutionEvent::JobFailed { .. } => "failed",
            };
            self.events.lock().unwrap().push(name.to_string());
        }
    }

    #[test]
    fn max_in_flight_jobs_throttles_concurrency() {
        let observer = Arc::new(RecordingObserver::default());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = Arc::new(engine(4, 1).with_observer(obs_trait));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine.run_with_timeout(JobKind::Render, Duration::from_secs(5), |_| {
                        std::thread::sleep(Duration::from_millis(10));
                    })
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.jobs_finished, 4);
        assert_eq!(snap.max_active_jobs, 1);
        assert!(snap.throttle_wait > Duration::ZERO);
        // `JobFinished` is emitted after the result is handed back.
        let finished = || observer.events.lock().unwrap().iter().filter(|e| *e == "finished").count();
        let until = Instant::now() + Duration::from_secs(2);
        while finished() < 4 && Instant::now() < until {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(finished(), 4);
        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| e == "throttled"));
    }
}
