//! hopchain - fluent task chains that alternate between a UI event loop and
//! a background worker pool.
//!
//! A [`Chain`] is built from an ordered sequence of steps, each declared to
//! run either on the single UI-designated thread or on a pooled worker
//! thread. Executing the chain runs the steps strictly in declaration order,
//! hopping threads as each step dictates, threading a single carried value
//! from each step's output to the next step's input, and finally invoking a
//! terminal consumer on the UI thread with the last produced value.
//!
//! Worker-context steps can publish a progress fraction and a status message
//! through a [`ChainHandle`]; a UI layer observes both without any explicit
//! synchronization.
//!
//! # Threading model
//!
//! - **UI context**: one single-threaded event loop ([`runtime::UiEventLoop`]
//!   headless by default, or a host GUI toolkit's loop via the
//!   [`runtime::UiDispatch`] trait)
//! - **Worker context**: the tokio blocking pool, sized by [`RuntimeConfig`]
//!
//! Steps of one chain never overlap; independent chains run fully
//! concurrently. The executor itself never blocks - each completed step
//! dispatches the next one. Step *bodies* are free to block their thread,
//! and a blocking UI-context step freezes the UI loop for its duration; that
//! pitfall is the caller's to avoid.
//!
//! Cancellation is not supported: once started, a chain runs until its
//! terminal consumer fires or an unhandled step failure aborts it.

pub mod chain;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod observable;
pub mod runtime;

pub use chain::{Chain, ChainHandle, ExecutionContext, StepError};
pub use config::RuntimeConfig;
pub use metrics::ChainMetrics;
pub use observable::{ObservedValue, Progress};
pub use runtime::{ChainRuntime, DispatchError, UiDispatch, WorkerSpawn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
