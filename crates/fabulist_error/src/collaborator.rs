//! Errors raised by external collaborators (chat, image and video services).

/// Failure conditions reported by a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CollaboratorErrorKind {
    /// Network-level failure before a response was received
    #[display("Transport failure: {}", _0)]
    Transport(String),
    /// The request exceeded the client's own timeout
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Credentials rejected (401/403) or missing
    #[display("Authentication failed: {}", _0)]
    Auth(String),
    /// The service throttled the request (429)
    #[display("Rate limited: {}", _0)]
    RateLimited(String),
    /// Account quota exhausted
    #[display("Quota exceeded: {}", _0)]
    Quota(String),
    /// The service rejected the request as invalid (400/422)
    #[display("Request rejected: {}", _0)]
    Validation(String),
    /// Any other non-success HTTP status
    #[display("HTTP {} error: {}", status, message)]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },
    /// The service answered successfully but returned nothing usable
    #[display("Empty response from {}", _0)]
    EmptyResponse(String),
    /// A long-running generation task reported failure
    #[display("Generation task {} failed", _0)]
    TaskFailed(String),
}

impl CollaboratorErrorKind {
    /// Check if this error type is worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        match self {
            CollaboratorErrorKind::Transport(_)
            | CollaboratorErrorKind::Timeout(_)
            | CollaboratorErrorKind::RateLimited(_) => true,
            CollaboratorErrorKind::Api { status, .. } => {
                matches!(*status, 408 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Get retry strategy parameters for this error type.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    pub fn retry_strategy_params(&self) -> (u64, usize, u64) {
        match self {
            CollaboratorErrorKind::RateLimited(_) => (5000, 3, 40),
            CollaboratorErrorKind::Api { status: 503, .. } => (2000, 5, 60),
            CollaboratorErrorKind::Api { .. } => (1000, 3, 8),
            _ => (2000, 5, 60),
        }
    }
}

/// Collaborator error with source location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{CollaboratorError, CollaboratorErrorKind, RetryableError};
///
/// let err = CollaboratorError::new(CollaboratorErrorKind::Api {
///     status: 503,
///     message: "Service unavailable".to_string(),
/// });
///
/// assert!(err.is_retryable());
/// assert!(format!("{}", err).contains("503"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Collaborator Error: {} at line {} in {}", kind, line, file)]
pub struct CollaboratorError {
    /// The kind of error that occurred
    pub kind: CollaboratorErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CollaboratorError {
    /// Create a new CollaboratorError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CollaboratorErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Map an HTTP status and body onto the collaborator taxonomy.
    ///
    /// ```
    /// use fabulist_error::{CollaboratorError, CollaboratorErrorKind};
    ///
    /// let err = CollaboratorError::from_status(429, "slow down");
    /// assert!(matches!(err.kind, CollaboratorErrorKind::RateLimited(_)));
    /// ```
    #[track_caller]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        let kind = match status {
            401 | 403 => CollaboratorErrorKind::Auth(message),
            429 if message.to_lowercase().contains("quota") => {
                CollaboratorErrorKind::Quota(message)
            }
            429 => CollaboratorErrorKind::RateLimited(message),
            400 | 422 => CollaboratorErrorKind::Validation(message),
            _ => CollaboratorErrorKind::Api { status, message },
        };
        Self::new(kind)
    }
}

/// Trait for errors that support retry logic.
///
/// The core never retries on its own; hosts use this to decide whether to
/// re-issue a query or resume after a collaborator failure.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;

    /// Get retry strategy parameters for this error.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        (2000, 5, 60)
    }
}

impl RetryableError for CollaboratorError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        self.kind.retry_strategy_params()
    }
}
