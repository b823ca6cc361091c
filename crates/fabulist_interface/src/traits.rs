//! Trait definitions for stores and generation collaborators.

use crate::{ImageRequest, VideoTaskRequest, VideoTaskStatus};
use async_trait::async_trait;
use fabulist_core::SessionState;
use fabulist_error::FabulistResult;

/// Keyed, mutable workflow state.
///
/// Both operations are total: an unseen key yields a freshly initialised
/// state. Implementations must give readers/writer exclusivity per key
/// without letting operations on different keys block each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the state for a session, creating the default if absent.
    async fn get(&self, session_key: &str) -> SessionState;

    /// Overwrite the state for a session.
    async fn save(&self, session_key: &str, state: SessionState);
}

/// Storage for serialized continuation markers of suspended runs.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Fetch the checkpoint stored for a session, if any.
    async fn get(&self, session_key: &str) -> FabulistResult<Option<Vec<u8>>>;

    /// Store (or replace) a session's checkpoint.
    async fn set(&self, session_key: &str, checkpoint: Vec<u8>) -> FabulistResult<()>;

    /// Remove a session's checkpoint. Removing a missing one is not an error.
    async fn delete(&self, session_key: &str) -> FabulistResult<()>;
}

/// Language-model chat completion.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Complete `user_content` under the system `instruction`.
    async fn complete(&self, instruction: &str, user_content: &str) -> FabulistResult<String>;

    /// Model identifier used for completions.
    fn model_name(&self) -> &str;
}

/// Synchronous image generation.
#[async_trait]
pub trait ImageGeneration: Send + Sync {
    /// Generate images and return their references (URLs or data URIs).
    async fn generate(&self, request: &ImageRequest) -> FabulistResult<Vec<String>>;
}

/// Asynchronous video generation.
///
/// The caller owns the poll loop; implementations answer one poll at a time.
#[async_trait]
pub trait VideoGeneration: Send + Sync {
    /// Start a task and return its identifier.
    async fn create_task(&self, request: &VideoTaskRequest) -> FabulistResult<String>;

    /// Report the current status of a task.
    async fn poll_status(&self, task_id: &str) -> FabulistResult<VideoTaskStatus>;
}
