use crate::runtime::DispatchError;
use thiserror::Error;

/// Why a step failed.
///
/// A failing step is handled at the point of failure: either its attached
/// error handler consumes the `StepError` and the chain continues, or the
/// chain aborts and the error is delivered to the `on_chain_failed` observer
/// (when one is set). A step failure never crosses a thread boundary as an
/// unwinding panic.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step body panicked.
    #[error("step {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    /// A fallible (`try_`) step returned an error.
    #[error("step {index} failed: {reason}")]
    Failed { index: usize, reason: anyhow::Error },

    /// The carried value was not of the type the step expected.
    #[error("step {index} expected a carried value of type {expected}")]
    TypeMismatch { index: usize, expected: &'static str },

    /// The step transforms the carried value, but no value has been produced.
    #[error("step {index} requires a carried value, but none has been produced")]
    MissingValue { index: usize },

    /// The step could not be submitted to its execution context.
    #[error("step {index} could not be dispatched")]
    Dispatch {
        index: usize,
        #[source]
        source: DispatchError,
    },
}

impl StepError {
    /// Zero-based declaration index of the failing step.
    pub fn step_index(&self) -> usize {
        match self {
            StepError::Panicked { index, .. }
            | StepError::Failed { index, .. }
            | StepError::TypeMismatch { index, .. }
            | StepError::MissingValue { index }
            | StepError::Dispatch { index, .. } => *index,
        }
    }
}
