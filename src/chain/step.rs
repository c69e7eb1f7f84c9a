// Step representation: one unit of work tagged with an execution context and
// an operation kind, plus the dynamically typed carried value threaded
// between steps.

use super::error::StepError;
use std::any::Any;
use std::fmt;

/// Where a step's body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// The single UI-designated event-loop thread.
    Ui,
    /// Any thread from the background worker pool.
    Worker,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Ui => write!(f, "ui"),
            ExecutionContext::Worker => write!(f, "worker"),
        }
    }
}

/// The payload threaded from one step's output to the next step's input.
///
/// `None` until a supplier or function has produced a value. Ownership lives
/// with whichever step is currently running; the executor moves it across the
/// step boundary, so user code never shares a mutable slot.
pub(crate) type Carried = Option<Box<dyn Any + Send>>;

/// A step body, normalized to the untyped carried-value signature. The typed
/// builder methods wrap user closures into this form, doing the downcasts.
pub(crate) type StepOp = Box<dyn FnOnce(Carried) -> Result<Carried, StepError> + Send>;

/// An error handler attached to a step. Consumes the error; its return value
/// becomes the new carried value.
pub(crate) type Recovery = Box<dyn FnOnce(StepError) -> Carried + Send>;

pub(crate) struct Step {
    pub(crate) context: ExecutionContext,
    pub(crate) kind: StepKind,
    pub(crate) op: StepOp,
    pub(crate) recover: Option<Recovery>,
}

/// Operation kind, for logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepKind {
    Supply,
    Consume,
    Function,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Supply => write!(f, "supply"),
            StepKind::Consume => write!(f, "consume"),
            StepKind::Function => write!(f, "function"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        assert_eq!(ExecutionContext::Ui.to_string(), "ui");
        assert_eq!(ExecutionContext::Worker.to_string(), "worker");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(StepKind::Supply.to_string(), "supply");
        assert_eq!(StepKind::Consume.to_string(), "consume");
        assert_eq!(StepKind::Function.to_string(), "function");
    }
}
