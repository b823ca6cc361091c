//! Errors for collaborator replies that do not have the expected shape.

/// Specific parse/shape failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ParseErrorKind {
    /// No JSON object or array could be located in the reply
    #[display("No JSON found in response (length: {})", _0)]
    NoJson(usize),
    /// JSON was located but could not be decoded into the target type
    #[display("Invalid JSON: {}", _0)]
    InvalidJson(String),
    /// The story had too few or too many chapters
    #[display(
        "Expected between {} and {} chapters, got {}",
        expected_min,
        expected_max,
        actual
    )]
    ChapterCount {
        /// Smallest acceptable chapter count
        expected_min: usize,
        /// Largest acceptable chapter count
        expected_max: usize,
        /// Count actually returned
        actual: usize,
    },
    /// A required field was missing or empty
    #[display("Missing field: {}", _0)]
    MissingField(String),
    /// A stage identifier did not name a known stage
    #[display("Unknown stage name: {}", _0)]
    InvalidStageName(String),
}

/// Parse error with location tracking.
///
/// # Examples
///
/// ```
/// use fabulist_error::{ParseError, ParseErrorKind};
///
/// let err = ParseError::new(ParseErrorKind::ChapterCount {
///     expected_min: 3,
///     expected_max: 5,
///     actual: 1,
/// });
/// assert!(format!("{}", err).contains("got 1"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Parse Error: {} at line {} in {}", kind, line, file)]
pub struct ParseError {
    /// The specific error condition
    pub kind: ParseErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ParseError {
    /// Create a new ParseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ParseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
