use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// The kinds of blocking work the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Publishing a dataset to the store.
    Persist,
    /// Rendering a PDF report.
    Render,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Persist => f.write_str("persist"),
            JobKind::Render => f.write_str("render"),
        }
    }
}

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    JobStarted { kind: JobKind },
    ThrottleWaited { kind: JobKind, duration: Duration },
    JobFinished { kind: JobKind, elapsed: Duration },
    JobTimedOut { kind: JobKind, timeout: Duration },
    JobFailed { kind: JobKind },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Logs execution events at debug level (timeouts and failures at warn).
#[derive(Default)]
pub struct LogExecutionObserver;

impl ExecutionObserver for LogExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::JobTimedOut { .. } | ExecutionEvent::JobFailed { .. } => {
                log::warn!("{event:?}")
            }
            _ => log::debug!("{event:?}"),
        }
    }
}

/// Running counters for the engine, updated from worker threads.
pub struct ExecutionMetrics {
    jobs_started: AtomicU64,
    jobs_finished: AtomicU64,
    jobs_timed_out: AtomicU64,
    jobs_failed: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_jobs: AtomicUsize,
    max_active_jobs: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            jobs_started: AtomicU64::new(0),
            jobs_finished: AtomicU64::new(0),
            jobs_timed_out: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_jobs: AtomicUsize::new(0),
            max_active_jobs: AtomicUsize::new(0),
        }
    }

    /// Count a job as started and active until the returned guard drops.
    ///
    /// The job only counts as finished if [`ActiveJob::finish`] is called; a job that unwinds
    /// leaves the active count but not as finished.
    pub fn start_job(&self) -> ActiveJob<'_> {
        let _ = self.jobs_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_jobs, now);
        ActiveJob {
            metrics: self,
            finished: false,
        }
    }

    pub fn on_timeout(&self) {
        let _ = self.jobs_timed_out.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_failure(&self) {
        let _ = self.jobs_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        ExecutionMetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
            jobs_finished: self.jobs_finished.load(Ordering::SeqCst),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::SeqCst),
            jobs_failed: self.jobs_failed.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_jobs: self.max_active_jobs.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A job counted in [`ExecutionMetrics`]' active jobs.
pub struct ActiveJob<'a> {
    metrics: &'a ExecutionMetrics,
    finished: bool,
}

impl ActiveJob<'_> {
    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        if self.finished {
            let _ = self.metrics.jobs_finished.fetch_add(1, Ordering::SeqCst);
        }
        let _ = self.metrics.active_jobs.fetch_sub(1, Ordering::SeqCst);
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_finished: u64,
    pub jobs_timed_out: u64,
    pub jobs_failed: u64,
    pub throttle_wait: Duration,
    pub max_active_jobs: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jobs={}/{}, timed_out={}, failed={}, max_active_jobs={}, throttle_wait={:?}",
            self.jobs_finished,
            self.jobs_started,
            self.jobs_timed_out,
            self.jobs_failed,
            self.max_active_jobs,
            self.throttle_wait
        )
    }
}
