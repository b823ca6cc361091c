//! Bounded-polling timeout errors.

/// A polled task did not reach a terminal status within its attempt budget.
///
/// # Examples
///
/// ```
/// use fabulist_error::TimeoutError;
///
/// let err = TimeoutError::new("video task cgt-123", 60);
/// assert_eq!(err.attempts, 60);
/// assert!(format!("{}", err).contains("cgt-123"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display(
    "Timeout Error: {} still pending after {} attempts at line {} in {}",
    operation,
    attempts,
    line,
    file
)]
pub struct TimeoutError {
    /// What was being polled
    pub operation: String,
    /// Number of polls performed before giving up
    pub attempts: u32,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl TimeoutError {
    /// Create a new TimeoutError with automatic location tracking.
    #[track_caller]
    pub fn new(operation: impl Into<String>, attempts: u32) -> Self {
        let location = std::panic::Location::caller();
        Self {
            operation: operation.into(),
            attempts,
            line: location.line(),
            file: location.file(),
        }
    }
}
