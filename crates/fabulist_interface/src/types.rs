//! Request and response types for the generation collaborators.

use derive_builder::Builder;
use derive_getters::Getters;
use fabulist_error::BuilderError;
use serde::{Deserialize, Serialize};

/// One image-generation call.
///
/// # Examples
///
/// ```
/// use fabulist_interface::ImageRequest;
///
/// let request = ImageRequest::builder()
///     .prompt("A baby triceratops in a fern forest")
///     .size("2304x1728")
///     .build()
///     .unwrap();
///
/// assert_eq!(request.sequential_mode(), "auto");
/// assert!(request.reference_images().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into), build_fn(error = "BuilderError"))]
pub struct ImageRequest {
    /// Text prompt
    prompt: String,
    /// Output size, e.g. `2304x1728`
    size: String,
    /// Sequential (multi-image) generation mode
    #[builder(default = "String::from(\"auto\")")]
    sequential_mode: String,
    /// Upper bound on images returned for this prompt
    #[builder(default = "3")]
    max_images: u32,
    /// Images the result should stay consistent with
    #[builder(default)]
    reference_images: Vec<String>,
}

impl ImageRequest {
    /// Creates a new builder for `ImageRequest`.
    pub fn builder() -> ImageRequestBuilder {
        ImageRequestBuilder::default()
    }
}

/// A request to start a video-generation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into), build_fn(error = "BuilderError"))]
pub struct VideoTaskRequest {
    /// Text prompt
    prompt: String,
    /// Images the video should draw on, in chapter order
    #[builder(default)]
    reference_images: Vec<String>,
    /// Optional opening frame
    #[builder(default, setter(strip_option))]
    first_frame: Option<String>,
    /// Optional closing frame
    #[builder(default, setter(strip_option))]
    last_frame: Option<String>,
}

impl VideoTaskRequest {
    /// Creates a new builder for `VideoTaskRequest`.
    pub fn builder() -> VideoTaskRequestBuilder {
        VideoTaskRequestBuilder::default()
    }
}

/// Lifecycle of a video-generation task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued or running
    #[display("pending")]
    Pending,
    /// Finished successfully
    #[display("succeeded")]
    Succeeded,
    /// Finished with an error
    #[display("failed")]
    Failed,
}

impl TaskStatus {
    /// Map a provider status string onto the lifecycle.
    ///
    /// Anything that is not a recognised terminal status counts as pending.
    ///
    /// ```
    /// use fabulist_interface::TaskStatus;
    ///
    /// assert_eq!(TaskStatus::from_provider("succeeded"), TaskStatus::Succeeded);
    /// assert_eq!(TaskStatus::from_provider("running"), TaskStatus::Pending);
    /// ```
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "succeeded" | "success" | "completed" => TaskStatus::Succeeded,
            "failed" | "error" | "cancelled" | "canceled" | "expired" => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

/// One poll of a video task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct VideoTaskStatus {
    /// Current lifecycle position
    status: TaskStatus,
    /// Video reference, present once the task succeeded
    video_url: Option<String>,
}

impl VideoTaskStatus {
    /// Create a status report.
    pub fn new(status: TaskStatus, video_url: Option<String>) -> Self {
        Self { status, video_url }
    }

    /// A still-running task.
    pub fn pending() -> Self {
        Self::new(TaskStatus::Pending, None)
    }

    /// The video URL if the task succeeded with a non-empty reference.
    pub fn finished_url(&self) -> Option<&str> {
        match self.status {
            TaskStatus::Succeeded => self.video_url.as_deref().filter(|url| !url.is_empty()),
            _ => None,
        }
    }
}
