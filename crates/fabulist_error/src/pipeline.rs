//! Workflow engine error types.

/// Failures of the engine itself rather than of a stage's collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PipelineErrorKind {
    /// A review loop was asked to revise more often than allowed
    #[display(
        "Review loop '{}' exhausted after {} iterations without approval",
        loop_name,
        max_iterations
    )]
    LoopExhausted {
        /// Name of the loop controller
        loop_name: String,
        /// Configured iteration bound
        max_iterations: u32,
    },
    /// The caller cancelled the run
    #[display("Run cancelled during {}", _0)]
    Cancelled(String),
    /// A stage was entered from a state it cannot handle
    #[display("Invalid transition: {}", _0)]
    InvalidTransition(String),
    /// The background task driving the run stopped unexpectedly
    #[display("Run task failed: {}", _0)]
    TaskAborted(String),
}

/// Pipeline error with location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{PipelineError, PipelineErrorKind};
///
/// let err = PipelineError::new(PipelineErrorKind::LoopExhausted {
///     loop_name: "story_loop".into(),
///     max_iterations: 3,
/// });
/// assert!(format!("{}", err).contains("story_loop"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The specific error condition
    pub kind: PipelineErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new PipelineError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
