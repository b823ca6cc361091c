//! Error types for the Fabulist pipeline.
//!
//! This crate provides the foundation error types used throughout the Fabulist workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! The top-level [`FabulistError`] groups every error into an [`ErrorCategory`]
//! so hosts can tell a collaborator outage apart from a malformed model reply,
//! a misused resume call, or an exhausted poll budget.
//!
//! # Examples
//!
//! ```
//! use fabulist_error::{ErrorCategory, FabulistResult, ParseError, ParseErrorKind};
//!
//! fn parse_reply() -> FabulistResult<String> {
//!     Err(ParseError::new(ParseErrorKind::NoJson(42)))?
//! }
//!
//! let err = parse_reply().unwrap_err();
//! assert_eq!(err.category(), ErrorCategory::Parse);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod collaborator;
mod config;
mod error;
mod json;
mod parse;
mod pipeline;
mod protocol;
mod timeout;

pub use builder::{BuilderError, BuilderErrorKind};
pub use collaborator::{CollaboratorError, CollaboratorErrorKind, RetryableError};
pub use config::ConfigError;
pub use error::{ErrorCategory, FabulistError, FabulistErrorKind, FabulistResult};
pub use json::JsonError;
pub use parse::{ParseError, ParseErrorKind};
pub use pipeline::{PipelineError, PipelineErrorKind};
pub use protocol::{ProtocolError, ProtocolErrorKind};
pub use timeout::TimeoutError;
