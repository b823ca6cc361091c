//! Trait definitions for the Fabulist pipeline.
//!
//! The pipeline core only talks to the outside world through the traits
//! defined here:
//!
//! - [`SessionStore`] and [`CheckpointStore`] hold per-session state and the
//!   continuation marker of a suspended run.
//! - [`ChatCompletion`], [`ImageGeneration`] and [`VideoGeneration`] are the
//!   generation collaborators.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::{CheckpointStore, ChatCompletion, ImageGeneration, SessionStore, VideoGeneration};
pub use types::{
    ImageRequest, ImageRequestBuilder, TaskStatus, VideoTaskRequest, VideoTaskRequestBuilder,
    VideoTaskStatus,
};
