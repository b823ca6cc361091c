//! Top-level error wrapper types.

use crate::{
    BuilderError, CollaboratorError, ConfigError, JsonError, ParseError, PipelineError,
    ProtocolError, RetryableError, TimeoutError,
};

/// Every failure a Fabulist run can surface.
///
/// # Examples
///
/// ```
/// use fabulist_error::{FabulistError, TimeoutError};
///
/// let err: FabulistError = TimeoutError::new("video task", 60).into();
/// assert!(format!("{}", err).contains("Timeout Error"));
/// ```
#[derive(Debug, Clone, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum FabulistErrorKind {
    /// Chat, image or video service failure
    #[from(CollaboratorError)]
    Collaborator(CollaboratorError),
    /// Collaborator reply had the wrong shape
    #[from(ParseError)]
    Parse(ParseError),
    /// Suspend/resume protocol misuse
    #[from(ProtocolError)]
    Protocol(ProtocolError),
    /// Bounded polling ran out of attempts
    #[from(TimeoutError)]
    Timeout(TimeoutError),
    /// Engine-level failure
    #[from(PipelineError)]
    Pipeline(PipelineError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization error on engine-owned data
    #[from(JsonError)]
    Json(JsonError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
}

/// Coarse grouping of errors for host-side handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorCategory {
    /// External service failed
    #[display("collaborator")]
    Collaborator,
    /// External service answered with malformed content
    #[display("parse")]
    Parse,
    /// Caller misused the suspend/resume protocol
    #[display("protocol")]
    Protocol,
    /// Polling budget exhausted
    #[display("timeout")]
    Timeout,
    /// Engine-level failure (loop bound, cancellation)
    #[display("pipeline")]
    Pipeline,
    /// Configuration problem
    #[display("config")]
    Config,
    /// Serialization or construction bug inside the engine
    #[display("internal")]
    Internal,
}

/// Fabulist error with kind discrimination.
///
/// # Examples
///
/// ```
/// use fabulist_error::{ErrorCategory, FabulistResult, ProtocolError, ProtocolErrorKind};
///
/// fn resume() -> FabulistResult<()> {
///     Err(ProtocolError::new(ProtocolErrorKind::NoSuspendedRun("s1".into())))?
/// }
///
/// let err = resume().unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Protocol);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Fabulist Error: {}", _0)]
pub struct FabulistError(Box<FabulistErrorKind>);

impl FabulistError {
    /// Create a new error from a kind.
    pub fn new(kind: FabulistErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &FabulistErrorKind {
        &self.0
    }

    /// Get the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            FabulistErrorKind::Collaborator(_) => ErrorCategory::Collaborator,
            FabulistErrorKind::Parse(_) => ErrorCategory::Parse,
            FabulistErrorKind::Protocol(_) => ErrorCategory::Protocol,
            FabulistErrorKind::Timeout(_) => ErrorCategory::Timeout,
            FabulistErrorKind::Pipeline(_) => ErrorCategory::Pipeline,
            FabulistErrorKind::Config(_) => ErrorCategory::Config,
            FabulistErrorKind::Json(_) | FabulistErrorKind::Builder(_) => ErrorCategory::Internal,
        }
    }
}

impl RetryableError for FabulistError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            FabulistErrorKind::Collaborator(e) => e.is_retryable(),
            FabulistErrorKind::Timeout(_) => true,
            _ => false,
        }
    }

    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        match self.kind() {
            FabulistErrorKind::Collaborator(e) => e.retry_strategy_params(),
            _ => (2000, 5, 60),
        }
    }
}

// Generic From implementation for any type that converts to FabulistErrorKind
impl<T> From<T> for FabulistError
where
    T: Into<FabulistErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Fabulist operations.
///
/// # Examples
///
/// ```
/// use fabulist_error::{FabulistResult, ConfigError};
///
/// fn load() -> FabulistResult<String> {
///     Err(ConfigError::new("ark.base_url is empty"))?
/// }
/// assert!(load().is_err());
/// ```
pub type FabulistResult<T> = std::result::Result<T, FabulistError>;
