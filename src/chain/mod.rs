//! The thread-alternating task chain: fluent builder plus executor.
//!
//! A [`Chain`] accumulates an ordered sequence of steps, each tagged with an
//! execution context (UI thread or worker pool) and an operation kind
//! (supplier, consumer, function). Building runs nothing; calling
//! [`execute`](Chain::execute) dispatches step 0 onto its declared context
//! and returns immediately. After each step completes, its completion task
//! dispatches the next step, so the executor never blocks waiting - the chain
//! advances purely by callback.
//!
//! A single value (the *carried value*) is threaded from each step's output
//! to the next step's input. Ownership of it transfers at every step
//! boundary, performed by the executor, never by user code closing over a
//! shared slot.
//!
//! # Error policy
//!
//! A step fails by panicking, by returning `Err` from a `try_` variant, or
//! because the carried value did not match its expected type. With an
//! [`on_error`](Chain::on_error) handler attached to that step, the handler
//! runs on the failing step's context, its return value replaces the carried
//! value, and the chain continues. Without one, the chain aborts: no later
//! step runs and the terminal consumer is never invoked. The abort is silent
//! by design (the original contract this crate preserves); attach
//! [`on_chain_failed`](Chain::on_chain_failed) to observe it.
//!
//! # Example
//!
//! ```ignore
//! let runtime = ChainRuntime::new()?;
//! let chain = runtime.chain();
//! let handle = chain.handle();
//!
//! chain
//!     .consume_on_ui(|_: Option<&()>| show_spinner())
//!     .supply_on_worker(move || {
//!         handle.update_message("crunching");
//!         crunch_numbers()
//!     })
//!     .on_error(|err| format!("failed: {err}"))
//!     .function_on_ui(|report: String| render(report))
//!     .execute(|summary: Option<String>| hide_spinner(summary));
//! ```

pub mod error;
pub mod step;

pub use error::StepError;
pub use step::ExecutionContext;

use crate::metrics::ChainMetrics;
use crate::observable::{ObservedValue, Progress};
use crate::runtime::{DispatchError, Task, UiDispatch, WorkerSpawn};
use std::any::{Any, type_name};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use step::{Carried, Recovery, Step, StepKind, StepOp};
use tokio::sync::watch;

/// Clonable handle to a chain's observable progress and message cells.
///
/// Obtain it with [`Chain::handle`] before adding steps and capture a clone
/// inside step closures to publish status. By convention only worker-context
/// steps publish (a UI-context step could just mutate the UI directly);
/// readers may poll from any thread.
#[derive(Clone)]
pub struct ChainHandle {
    progress: ObservedValue<Progress>,
    message: ObservedValue<String>,
}

impl ChainHandle {
    fn new() -> Self {
        Self {
            progress: ObservedValue::new(Progress::Indeterminate),
            message: ObservedValue::new(String::new()),
        }
    }

    /// Publish a new status message, replacing the previous one.
    pub fn update_message(&self, text: impl Into<String>) {
        self.message.publish(text.into());
    }

    /// Publish a new progress value.
    pub fn update_progress(&self, progress: Progress) {
        self.progress.publish(progress);
    }

    /// Publish a progress fraction, clamped to `[0.0, 1.0]`.
    pub fn update_fraction(&self, fraction: f64) {
        self.progress.publish(Progress::fraction(fraction));
    }

    /// Subscribe to message updates, e.g. to bind a UI label.
    pub fn message(&self) -> watch::Receiver<String> {
        self.message.watch()
    }

    /// Subscribe to progress updates, e.g. to bind a progress bar.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.watch()
    }

    /// Snapshot of the latest message.
    pub fn current_message(&self) -> String {
        self.message.get()
    }

    /// Snapshot of the latest progress.
    pub fn current_progress(&self) -> Progress {
        self.progress.get()
    }
}

/// Builder and executor for a thread-alternating task chain.
///
/// Created by `ChainRuntime::chain()`. Every builder call appends one step
/// and returns the chain for further chaining; nothing executes until
/// [`execute`](Self::execute), which consumes the chain - the at-most-once
/// execute contract is enforced by the type system.
pub struct Chain {
    steps: Vec<Step>,
    ui: Arc<dyn UiDispatch>,
    workers: Arc<dyn WorkerSpawn>,
    metrics: Arc<ChainMetrics>,
    handle: ChainHandle,
    failed: Option<Box<dyn FnOnce(StepError) + Send>>,
}

impl Chain {
    pub(crate) fn new(
        ui: Arc<dyn UiDispatch>,
        workers: Arc<dyn WorkerSpawn>,
        metrics: Arc<ChainMetrics>,
    ) -> Self {
        Self {
            steps: Vec::new(),
            ui,
            workers,
            metrics,
            handle: ChainHandle::new(),
            failed: None,
        }
    }

    /// Handle for publishing and observing this chain's progress/message.
    pub fn handle(&self) -> ChainHandle {
        self.handle.clone()
    }

    /// Number of steps declared so far.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    // -- suppliers ---------------------------------------------------------

    /// Append a supplier on the UI thread: ignores the prior carried value
    /// and produces a new one.
    pub fn supply_on_ui<O, F>(self, f: F) -> Self
    where
        O: Any + Send,
        F: FnOnce() -> O + Send + 'static,
    {
        let op: StepOp = Box::new(move |_prev| Ok(Some(Box::new(f()) as Box<dyn Any + Send>)));
        self.push(ExecutionContext::Ui, StepKind::Supply, op)
    }

    /// Append a supplier on a worker thread.
    pub fn supply_on_worker<O, F>(self, f: F) -> Self
    where
        O: Any + Send,
        F: FnOnce() -> O + Send + 'static,
    {
        let op: StepOp = Box::new(move |_prev| Ok(Some(Box::new(f()) as Box<dyn Any + Send>)));
        self.push(ExecutionContext::Worker, StepKind::Supply, op)
    }

    /// Fallible supplier on the UI thread; an `Err` takes the same error
    /// path as a panic.
    pub fn try_supply_on_ui<O, F>(self, f: F) -> Self
    where
        O: Any + Send,
        F: FnOnce() -> anyhow::Result<O> + Send + 'static,
    {
        let index = self.steps.len();
        let op: StepOp = Box::new(move |_prev| match f() {
            Ok(out) => Ok(Some(Box::new(out) as Box<dyn Any + Send>)),
            Err(reason) => Err(StepError::Failed { index, reason }),
        });
        self.push(ExecutionContext::Ui, StepKind::Supply, op)
    }

    /// Fallible supplier on a worker thread.
    pub fn try_supply_on_worker<O, F>(self, f: F) -> Self
    where
        O: Any + Send,
        F: FnOnce() -> anyhow::Result<O> + Send + 'static,
    {
        let index = self.steps.len();
        let op: StepOp = Box::new(move |_prev| match f() {
            Ok(out) => Ok(Some(Box::new(out) as Box<dyn Any + Send>)),
            Err(reason) => Err(StepError::Failed { index, reason }),
        });
        self.push(ExecutionContext::Worker, StepKind::Supply, op)
    }

    // -- consumers ---------------------------------------------------------

    /// Append a consumer on the UI thread: observes the carried value, which
    /// is preserved unchanged for the next step. Receives `None` when no
    /// value has been produced yet (e.g. as the first step of a chain).
    pub fn consume_on_ui<I, F>(self, f: F) -> Self
    where
        I: Any + Send,
        F: FnOnce(Option<&I>) + Send + 'static,
    {
        let index = self.steps.len();
        let op = Self::consume_op(index, f);
        self.push(ExecutionContext::Ui, StepKind::Consume, op)
    }

    /// Append a consumer on a worker thread.
    pub fn consume_on_worker<I, F>(self, f: F) -> Self
    where
        I: Any + Send,
        F: FnOnce(Option<&I>) + Send + 'static,
    {
        let index = self.steps.len();
        let op = Self::consume_op(index, f);
        self.push(ExecutionContext::Worker, StepKind::Consume, op)
    }

    fn consume_op<I, F>(index: usize, f: F) -> StepOp
    where
        I: Any + Send,
        F: FnOnce(Option<&I>) + Send + 'static,
    {
        Box::new(move |prev: Carried| match prev {
            None => {
                f(None);
                Ok(None)
            }
            Some(value) => match value.downcast::<I>() {
                Ok(typed) => {
                    f(Some(typed.as_ref()));
                    Ok(Some(typed as Box<dyn Any + Send>))
                }
                Err(_) => Err(StepError::TypeMismatch {
                    index,
                    expected: type_name::<I>(),
                }),
            },
        })
    }

    // -- functions ---------------------------------------------------------

    /// Append a function on the UI thread: transforms the carried value.
    /// Fails with [`StepError::MissingValue`] when no value has been
    /// produced, and [`StepError::TypeMismatch`] on a wrong input type.
    pub fn function_on_ui<I, O, F>(self, f: F) -> Self
    where
        I: Any + Send,
        O: Any + Send,
        F: FnOnce(I) -> O + Send + 'static,
    {
        let index = self.steps.len();
        let op = Self::function_op(index, move |input: I| Ok(f(input)));
        self.push(ExecutionContext::Ui, StepKind::Function, op)
    }

    /// Append a function on a worker thread.
    pub fn function_on_worker<I, O, F>(self, f: F) -> Self
    where
        I: Any + Send,
        O: Any + Send,
        F: FnOnce(I) -> O + Send + 'static,
    {
        let index = self.steps.len();
        let op = Self::function_op(index, move |input: I| Ok(f(input)));
        self.push(ExecutionContext::Worker, StepKind::Function, op)
    }

    /// Fallible function on the UI thread.
    pub fn try_function_on_ui<I, O, F>(self, f: F) -> Self
    where
        I: Any + Send,
        O: Any + Send,
        F: FnOnce(I) -> anyhow::Result<O> + Send + 'static,
    {
        let index = self.steps.len();
        let op = Self::function_op(index, f);
        self.push(ExecutionContext::Ui, StepKind::Function, op)
    }

    /// Fallible function on a worker thread.
    pub fn try_function_on_worker<I, O, F>(self, f: F) -> Self
    where
        I: Any + Send,
        O: Any + Send,
        F: FnOnce(I) -> anyhow::Result<O> + Send + 'static,
    {
        let index = self.steps.len();
        let op = Self::function_op(index, f);
        self.push(ExecutionContext::Worker, StepKind::Function, op)
    }

    fn function_op<I, O, F>(index: usize, f: F) -> StepOp
    where
        I: Any + Send,
        O: Any + Send,
        F: FnOnce(I) -> anyhow::Result<O> + Send + 'static,
    {
        Box::new(move |prev: Carried| match prev {
            None => Err(StepError::MissingValue { index }),
            Some(value) => match value.downcast::<I>() {
                Ok(typed) => match f(*typed) {
                    Ok(out) => Ok(Some(Box::new(out) as Box<dyn Any + Send>)),
                    Err(reason) => Err(StepError::Failed { index, reason }),
                },
                Err(_) => Err(StepError::TypeMismatch {
                    index,
                    expected: type_name::<I>(),
                }),
            },
        })
    }

    // -- error handling ----------------------------------------------------

    /// Attach an error handler to the immediately preceding step.
    ///
    /// When that step fails, the handler runs on the failing step's context,
    /// consumes the [`StepError`], and its return value replaces the carried
    /// value; the chain then continues with the next step as if nothing had
    /// failed. The handler never re-raises (a panic inside it aborts the
    /// chain).
    ///
    /// Calling this before any step has been appended is ignored with a
    /// warning. Calling it twice on the same step replaces the handler.
    pub fn on_error<O, H>(mut self, handler: H) -> Self
    where
        O: Any + Send,
        H: FnOnce(StepError) -> O + Send + 'static,
    {
        match self.steps.last_mut() {
            Some(step) => {
                if step.recover.is_some() {
                    tracing::warn!("replacing an error handler already attached to this step");
                }
                let recovery: Recovery =
                    Box::new(move |err| Some(Box::new(handler(err)) as Box<dyn Any + Send>));
                step.recover = Some(recovery);
            }
            None => {
                tracing::warn!("on_error called before any step was appended; handler ignored");
            }
        }
        self
    }

    /// Observe an unrecovered failure.
    ///
    /// The chain still aborts silently from the terminal consumer's point of
    /// view; this observer fires exactly once, on the thread where the
    /// failure was detected, and exists so callers (and tests) need not infer
    /// failure from the absence of a callback.
    pub fn on_chain_failed<F>(mut self, observer: F) -> Self
    where
        F: FnOnce(StepError) + Send + 'static,
    {
        self.failed = Some(Box::new(observer));
        self
    }

    fn push(mut self, context: ExecutionContext, kind: StepKind, op: StepOp) -> Self {
        self.steps.push(Step {
            context,
            kind,
            op,
            recover: None,
        });
        self
    }

    // -- execution ---------------------------------------------------------

    /// Run the chain to completion.
    ///
    /// Dispatches the first step onto its declared context and returns
    /// without blocking. `terminal` is invoked on the UI thread with the
    /// final carried value once every step has completed; it receives `None`
    /// when the chain produced no value or the value is not a `T` (the
    /// mismatch is logged). On an unrecovered failure the terminal consumer
    /// is never invoked.
    ///
    /// An empty chain goes straight to the terminal consumer with `None`.
    pub fn execute<T, F>(self, terminal: F)
    where
        T: Any + Send,
        F: FnOnce(Option<T>) + Send + 'static,
    {
        let terminal: Box<dyn FnOnce(Carried) + Send> = Box::new(move |carried: Carried| {
            match carried {
                None => terminal(None),
                Some(value) => match value.downcast::<T>() {
                    Ok(typed) => terminal(Some(*typed)),
                    Err(_) => {
                        tracing::warn!(
                            expected = type_name::<T>(),
                            "final carried value did not match the terminal consumer's type"
                        );
                        terminal(None)
                    }
                },
            }
        });

        let len = self.steps.len();
        let core = Arc::new(ChainCore {
            steps: Mutex::new(self.steps.into_iter().map(Some).collect()),
            len,
            ui: self.ui,
            workers: self.workers,
            metrics: self.metrics,
            failed: Mutex::new(self.failed),
            terminal: Mutex::new(Some(terminal)),
        });

        core.metrics.record_chain_started();
        tracing::debug!(steps = len, "chain started");
        ChainCore::advance(core, 0, None);
    }
}

/// Shared executor state. One instance per executed chain, alive until the
/// terminal consumer (or the abort path) has run.
struct ChainCore {
    /// Each step is taken exactly once as the cursor passes it.
    steps: Mutex<Vec<Option<Step>>>,
    len: usize,
    ui: Arc<dyn UiDispatch>,
    workers: Arc<dyn WorkerSpawn>,
    metrics: Arc<ChainMetrics>,
    failed: Mutex<Option<Box<dyn FnOnce(StepError) + Send>>>,
    terminal: Mutex<Option<Box<dyn FnOnce(Carried) + Send>>>,
}

impl ChainCore {
    /// Dispatch step `index` onto its declared context. The completion task
    /// re-enters `advance` for `index + 1`, so exactly one step of the chain
    /// is in flight at any time.
    fn advance(core: Arc<ChainCore>, index: usize, carried: Carried) {
        if index == core.len {
            Self::finish(core, carried);
            return;
        }

        let Some(mut step) = core.steps.lock().unwrap()[index].take() else {
            // Unreachable by construction; the cursor visits each index once.
            tracing::error!(step = index, "step already taken, aborting chain");
            return;
        };

        let context = step.context;
        let kind = step.kind;
        let recover = step.recover.take();
        let op = step.op;

        tracing::debug!(step = index, %context, %kind, "dispatching step");

        let task_core = Arc::clone(&core);
        let task: Task = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| op(carried))).unwrap_or_else(|payload| {
                Err(StepError::Panicked {
                    index,
                    message: panic_message(payload),
                })
            });
            task_core.metrics.record_step_executed();

            match outcome {
                Ok(next) => Self::advance(task_core, index + 1, next),
                Err(err) => match recover {
                    Some(handler) => {
                        tracing::debug!(step = index, error = %err, "step failed, running error handler");
                        match catch_unwind(AssertUnwindSafe(|| handler(err))) {
                            Ok(replacement) => {
                                task_core.metrics.record_error_recovered();
                                Self::advance(task_core, index + 1, replacement)
                            }
                            Err(payload) => task_core.fail(StepError::Panicked {
                                index,
                                message: format!(
                                    "error handler panicked: {}",
                                    panic_message(payload)
                                ),
                            }),
                        }
                    }
                    None => task_core.fail(err),
                },
            }
        });

        if let Err(source) = core.dispatch(context, task) {
            core.fail(StepError::Dispatch { index, source });
        }
    }

    /// All steps done; hand the final carried value to the terminal consumer
    /// on the UI thread.
    fn finish(core: Arc<ChainCore>, carried: Carried) {
        let Some(terminal) = core.terminal.lock().unwrap().take() else {
            return;
        };

        let metrics = Arc::clone(&core.metrics);
        let task: Task = Box::new(move || {
            terminal(carried);
            metrics.record_chain_completed();
            tracing::debug!("chain completed");
        });

        if core.dispatch(ExecutionContext::Ui, task).is_err() {
            tracing::warn!("ui event loop stopped before the terminal consumer could run");
        }
    }

    fn dispatch(&self, context: ExecutionContext, task: Task) -> Result<(), DispatchError> {
        match context {
            ExecutionContext::Ui => {
                self.metrics.record_ui_dispatch();
                self.ui.dispatch(task)
            }
            ExecutionContext::Worker => {
                self.metrics.record_worker_dispatch();
                self.workers.submit(task)
            }
        }
    }

    /// Abort path: no further step runs and the terminal consumer is never
    /// invoked. Fires the `on_chain_failed` observer when one is set.
    fn fail(&self, err: StepError) {
        self.metrics.record_chain_aborted();
        tracing::warn!(step = err.step_index(), error = %err, "chain aborted on unhandled step failure");

        if let Some(observer) = self.failed.lock().unwrap().take() {
            observer(err);
        }
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
