//! Errors for misuse of the suspend/resume protocol.

/// Ways a caller can misuse the interrupt/resume protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ProtocolErrorKind {
    /// A resume target carried no payload
    #[display("Stage '{}' received no resume data", _0)]
    MissingResumeData(String),
    /// A resume payload had the wrong shape
    #[display("Stage '{}' received invalid resume data: {}", stage, reason)]
    InvalidResumeData {
        /// Stage that rejected the payload
        stage: String,
        /// What was wrong with it
        reason: String,
    },
    /// Revision requested with blank feedback
    #[display("Stage '{}' received empty feedback", _0)]
    EmptyFeedback(String),
    /// Resume called for a session that is not suspended
    #[display("Session '{}' has no suspended run to resume", _0)]
    NoSuspendedRun(String),
    /// The stored continuation does not fit the pipeline being resumed
    #[display("Checkpoint does not match pipeline: {}", _0)]
    CheckpointMismatch(String),
    /// A stage needed session data that has not been produced yet
    #[display("Missing session state: {}", _0)]
    MissingState(String),
    /// A query was issued without usable input
    #[display("Empty input: {}", _0)]
    EmptyInput(String),
    /// The interactive reply source failed or closed
    #[display("Input unavailable: {}", _0)]
    InputUnavailable(String),
}

/// Protocol error with location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{ProtocolError, ProtocolErrorKind};
///
/// let err = ProtocolError::new(ProtocolErrorKind::MissingResumeData("story_review".into()));
/// assert!(format!("{}", err).contains("story_review"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Protocol Error: {} at line {} in {}", kind, line, file)]
pub struct ProtocolError {
    /// The specific error condition
    pub kind: ProtocolErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ProtocolError {
    /// Create a new ProtocolError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProtocolErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
