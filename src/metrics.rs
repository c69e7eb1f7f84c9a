// Lightweight chain metrics
//
// Atomic counters shared by every chain created from one runtime. Lock-free;
// safe to bump from any execution context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for chain executions on one runtime.
#[derive(Debug)]
pub struct ChainMetrics {
    /// Chains on which `execute` was called
    pub chains_started: AtomicU64,

    /// Chains whose terminal consumer ran
    pub chains_completed: AtomicU64,

    /// Chains aborted on an unhandled step failure
    pub chains_aborted: AtomicU64,

    /// Step bodies executed (including ones that failed)
    pub steps_executed: AtomicU64,

    /// Tasks sent to the UI event loop
    pub ui_dispatches: AtomicU64,

    /// Tasks sent to the worker pool
    pub worker_dispatches: AtomicU64,

    /// Step failures consumed by an attached error handler
    pub errors_recovered: AtomicU64,

    start_time: Instant,
}

impl ChainMetrics {
    pub fn new() -> Self {
        Self {
            chains_started: AtomicU64::new(0),
            chains_completed: AtomicU64::new(0),
            chains_aborted: AtomicU64::new(0),
            steps_executed: AtomicU64::new(0),
            ui_dispatches: AtomicU64::new(0),
            worker_dispatches: AtomicU64::new(0),
            errors_recovered: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_chain_started(&self) {
        self.chains_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chain_completed(&self) {
        self.chains_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chain_aborted(&self) {
        self.chains_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_step_executed(&self) {
        self.steps_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_dispatch(&self) {
        self.ui_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_dispatch(&self) {
        self.worker_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error_recovered(&self) {
        self.errors_recovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the owning runtime was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log a one-shot summary, typically at shutdown.
    pub fn log_summary(&self) {
        tracing::info!(
            "chains: {} started, {} completed, {} aborted ({} errors recovered)",
            self.chains_started.load(Ordering::Relaxed),
            self.chains_completed.load(Ordering::Relaxed),
            self.chains_aborted.load(Ordering::Relaxed),
            self.errors_recovered.load(Ordering::Relaxed),
        );
        tracing::info!(
            "dispatch: {} steps, {} ui tasks, {} worker tasks, uptime {:.1}s",
            self.steps_executed.load(Ordering::Relaxed),
            self.ui_dispatches.load(Ordering::Relaxed),
            self.worker_dispatches.load(Ordering::Relaxed),
            self.uptime().as_secs_f64(),
        );
    }
}

impl Default for ChainMetrics {
    fn default() -> Self {
        Self::new()
    }
}
