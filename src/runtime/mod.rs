//! Execution contexts backing a chain.
//!
//! A chain needs exactly two scheduling primitives:
//!
//! - [`UiDispatch`]: submission onto the single UI-designated thread.
//!   Submission order is preserved for tasks submitted from one thread; no
//!   ordering is guaranteed relative to concurrent submitters.
//! - [`WorkerSpawn`]: submission onto a background pool thread, with no
//!   ordering guarantee across independently submitted tasks.
//!
//! Both are traits so a host application can plug in its own GUI toolkit's
//! event loop and executor. The crate ships headless implementations:
//! [`UiEventLoop`] (a dedicated named thread draining a task channel) and
//! [`TokioWorkerPool`] (the tokio blocking pool). [`ChainRuntime`] bundles
//! the two together with shared metrics and owns the tokio runtime when built
//! internally.
//!
//! A step body that blocks its thread blocks that whole context for the
//! duration. In particular a blocking UI-context task freezes the UI loop.
//! That is the documented contract, not something the runtime protects
//! against.

pub mod ui_loop;
pub mod worker;

pub use ui_loop::UiEventLoop;
pub use worker::TokioWorkerPool;

use crate::chain::Chain;
use crate::config::RuntimeConfig;
use crate::metrics::ChainMetrics;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A unit of work submitted to an execution context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors from submitting a task to an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("the ui event loop has stopped")]
    UiClosed,

    #[error("the worker pool has shut down")]
    PoolClosed,
}

/// Submission onto the single UI-designated thread.
///
/// Implementations guarantee the task runs on that one thread and that tasks
/// submitted from a single thread run in submission order.
#[cfg_attr(test, mockall::automock)]
pub trait UiDispatch: Send + Sync {
    /// Queue a task for the UI thread. Fire-and-forget; completion is
    /// observed through whatever the task itself does.
    fn dispatch(&self, task: Task) -> Result<(), DispatchError>;

    /// Whether the calling thread is the UI-designated thread.
    fn is_ui_thread(&self) -> bool;
}

/// Submission onto a background pool thread.
#[cfg_attr(test, mockall::automock)]
pub trait WorkerSpawn: Send + Sync {
    /// Run the task on any available pool thread. Fire-and-forget.
    fn submit(&self, task: Task) -> Result<(), DispatchError>;
}

/// Bundles the two execution contexts a chain runs on.
///
/// The runtime is the factory for [`Chain`] instances: every chain created by
/// [`chain()`](Self::chain) shares this runtime's UI loop, worker pool and
/// [`ChainMetrics`]. Independent chains run fully concurrently; there is no
/// global lock across chains.
///
/// # Example
/// ```ignore
/// let runtime = ChainRuntime::new()?;
/// runtime
///     .chain()
///     .supply_on_worker(|| expensive_result())
///     .function_on_ui(|report: String| format!("done: {report}"))
///     .execute(|value: Option<String>| println!("{:?}", value));
/// ```
pub struct ChainRuntime {
    ui: Arc<dyn UiDispatch>,
    workers: Arc<dyn WorkerSpawn>,
    metrics: Arc<ChainMetrics>,

    /// Owned when the runtime was built internally; `None` when the caller
    /// supplied both contexts through [`from_parts`](Self::from_parts).
    tokio_runtime: Option<tokio::runtime::Runtime>,
    shutdown_timeout: Duration,
}

impl ChainRuntime {
    /// Build a runtime with the default [`RuntimeConfig`].
    pub fn new() -> Result<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Build a runtime from an explicit configuration.
    ///
    /// Spawns the UI event loop thread and a multi-threaded tokio runtime
    /// for the worker pool.
    ///
    /// # Errors
    ///
    /// Fails if the tokio runtime or the UI loop thread cannot be created.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        let worker_threads = config.worker_threads.max(1);
        let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(worker_threads)
            .thread_name(&config.worker_thread_name)
            .build()
            .context("Failed to build worker pool runtime")?;

        let ui = Arc::new(UiEventLoop::spawn(&config.ui_thread_name)?);
        let workers = Arc::new(TokioWorkerPool::new(tokio_runtime.handle().clone()));

        tracing::info!(
            worker_threads,
            ui_thread = %config.ui_thread_name,
            "chain runtime initialized"
        );

        Ok(Self {
            ui,
            workers,
            metrics: Arc::new(ChainMetrics::new()),
            tokio_runtime: Some(tokio_runtime),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Build a runtime on top of contexts owned by the host application.
    ///
    /// Use this to run chains on a real GUI toolkit: implement [`UiDispatch`]
    /// over the toolkit's `invoke_from_event_loop` equivalent and hand in the
    /// application's existing worker pool. The returned runtime does not own
    /// either context and will not shut them down on drop.
    pub fn from_parts(ui: Arc<dyn UiDispatch>, workers: Arc<dyn WorkerSpawn>) -> Self {
        Self {
            ui,
            workers,
            metrics: Arc::new(ChainMetrics::new()),
            tokio_runtime: None,
            shutdown_timeout: Duration::ZERO,
        }
    }

    /// Start building a new chain on this runtime's contexts.
    pub fn chain(&self) -> Chain {
        Chain::new(
            Arc::clone(&self.ui),
            Arc::clone(&self.workers),
            Arc::clone(&self.metrics),
        )
    }

    /// The UI dispatch context, for submitting one-off tasks outside a chain.
    pub fn ui(&self) -> Arc<dyn UiDispatch> {
        Arc::clone(&self.ui)
    }

    /// Shared metrics for all chains created by this runtime.
    pub fn metrics(&self) -> Arc<ChainMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Drop for ChainRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.tokio_runtime.take() {
            tracing::debug!("shutting down worker pool runtime");
            runtime.shutdown_timeout(self.shutdown_timeout);
        }
    }
}
