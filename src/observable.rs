// Observable scalar cells for progress and status reporting
//
// A chain publishes its progress fraction and status message through these
// cells. The writer is whichever step is currently executing (one at a time),
// readers may poll from any thread at any moment. Last write wins; readers
// never observe a torn value.

use std::sync::Arc;
use tokio::sync::watch;

/// Progress of a running chain.
///
/// Either an unknown amount of work remains ([`Progress::Indeterminate`], the
/// initial state) or a fraction of the work is done. Fractions are clamped to
/// `[0.0, 1.0]` at construction, so readers can rely on the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// No progress estimate is available.
    Indeterminate,
    /// Fraction of work completed, in `[0.0, 1.0]`.
    Fraction(f64),
}

impl Progress {
    /// Build a progress fraction, clamping to `[0.0, 1.0]`.
    ///
    /// A NaN input maps to [`Progress::Indeterminate`].
    pub fn fraction(value: f64) -> Self {
        if value.is_nan() {
            Progress::Indeterminate
        } else {
            Progress::Fraction(value.clamp(0.0, 1.0))
        }
    }

    /// The completed fraction, or `None` when indeterminate.
    pub fn as_fraction(&self) -> Option<f64> {
        match self {
            Progress::Indeterminate => None,
            Progress::Fraction(f) => Some(*f),
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Progress::Indeterminate)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Progress::Indeterminate
    }
}

/// Single-writer/multi-reader cell with last-write-wins snapshots.
///
/// Built on [`tokio::sync::watch`]: a publish atomically replaces the stored
/// value, and readers take a clone of the latest value without any explicit
/// locking on their side. [`watch()`](Self::watch) hands out a receiver that a
/// UI layer can poll or await for changes.
pub struct ObservedValue<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for ObservedValue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ObservedValue<T> {
    /// Create a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the stored value. Never fails, even with no readers attached.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Snapshot of the latest published value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Subscribe to future publications.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}
