// UiEventLoop - headless single-threaded event loop standing in for a GUI
// toolkit's application thread
//
// A dedicated named thread drains a task channel in submission order, exactly
// the way a GUI event loop drains its queue. Chains treat this thread as "the
// UI thread"; tests and demos use it to get deterministic thread identity
// without a display server.

use super::{DispatchError, Task, UiDispatch};
use anyhow::{Context, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;

/// A queue-backed single-threaded event loop.
///
/// Tasks are delivered over an unbounded channel and executed one at a time
/// on the loop thread, preserving submission order per submitter. A task that
/// panics is caught and logged; it must not take down a loop shared by other
/// chains.
///
/// Dropping the loop closes the channel; queued tasks still run, then the
/// thread exits and is joined (unless the drop itself happens on the loop
/// thread, where joining would deadlock).
pub struct UiEventLoop {
    /// `None` only during drop, after the channel has been closed.
    tx: Option<mpsc::UnboundedSender<Task>>,
    thread_id: ThreadId,
    join: Option<JoinHandle<()>>,
}

impl UiEventLoop {
    /// Spawn the loop thread under the given name.
    ///
    /// # Errors
    ///
    /// Fails if the OS refuses to spawn the thread.
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::debug!("ui event loop started");

                while let Some(task) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!("a task panicked on the ui event loop");
                    }
                }

                tracing::debug!("ui event loop terminated");
            })
            .with_context(|| format!("Failed to spawn ui event loop thread '{name}'"))?;

        let thread_id = join.thread().id();

        Ok(Self {
            tx: Some(tx),
            thread_id,
            join: Some(join),
        })
    }
}

impl UiDispatch for UiEventLoop {
    fn dispatch(&self, task: Task) -> Result<(), DispatchError> {
        match &self.tx {
            Some(tx) => tx.send(task).map_err(|_| DispatchError::UiClosed),
            None => Err(DispatchError::UiClosed),
        }
    }

    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for UiEventLoop {
    fn drop(&mut self) {
        // Closing the sender lets the loop drain its queue and exit.
        self.tx.take();

        if let Some(join) = self.join.take() {
            if self.is_ui_thread() {
                // Dropped from a task running on the loop itself; the thread
                // cannot join itself, so let it wind down on its own.
                tracing::debug!("ui event loop dropped from its own thread, skipping join");
            } else if join.join().is_err() {
                tracing::error!("ui event loop thread panicked during shutdown");
            }
        }
    }
}
