//! Offline stand-ins for the Ark collaborators.

use async_trait::async_trait;
use fabulist_core::StoryConfig;
use fabulist_error::FabulistResult;
use fabulist_interface::{
    ChatCompletion, ImageGeneration, ImageRequest, TaskStatus, VideoGeneration, VideoTaskRequest,
    VideoTaskStatus,
};
use tracing::warn;

/// A 1×1 PNG pixel.
const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR4nGNgYAAAAAMAASsJTYQAAAAASUVORK5CYII=";

/// Task id returned for every mock video task.
pub const MOCK_TASK_ID: &str = "mock-task";

/// Video reference returned for every mock video task.
pub const MOCK_VIDEO_URL: &str = "https://example.com/mock_video.mp4";

/// Deterministic collaborators that never touch the network.
///
/// Chat replies with a placeholder story sized to the story constraints
/// (or a one-line illustration prompt), images are a single pixel, and
/// video tasks succeed on the first poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStudio {
    story: StoryConfig,
}

impl MockStudio {
    /// Create mocks producing stories of the minimum allowed length.
    pub fn new(story: StoryConfig) -> Self {
        warn!("Using mock collaborators; no Ark requests will be made");
        Self { story }
    }

    fn story_reply(&self, user_content: &str) -> String {
        let theme = user_content
            .lines()
            .find_map(|line| line.strip_prefix("Theme:"))
            .map(str::trim)
            .filter(|theme| !theme.is_empty())
            .unwrap_or("a mystery");
        let chapters: Vec<serde_json::Value> = (1..=*self.story.min_chapters())
            .map(|i| {
                serde_json::json!({
                    "chapter_title": format!("Part {}", i),
                    "chapter_body": format!("Part {} of a story about {}.", i, theme),
                })
            })
            .collect();
        serde_json::json!({ "chapters": chapters }).to_string()
    }
}

#[async_trait]
impl ChatCompletion for MockStudio {
    async fn complete(&self, instruction: &str, user_content: &str) -> FabulistResult<String> {
        if instruction.contains("\"chapters\"") {
            return Ok(self.story_reply(user_content));
        }
        let subject = user_content.lines().next().unwrap_or_default().trim();
        Ok(format!("A gentle watercolor illustration of {}", subject))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl ImageGeneration for MockStudio {
    async fn generate(&self, _request: &ImageRequest) -> FabulistResult<Vec<String>> {
        Ok(vec![format!("data:image/png;base64,{}", PIXEL_PNG)])
    }
}

#[async_trait]
impl VideoGeneration for MockStudio {
    async fn create_task(&self, _request: &VideoTaskRequest) -> FabulistResult<String> {
        Ok(MOCK_TASK_ID.to_string())
    }

    async fn poll_status(&self, _task_id: &str) -> FabulistResult<VideoTaskStatus> {
        Ok(VideoTaskStatus::new(
            TaskStatus::Succeeded,
            Some(MOCK_VIDEO_URL.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_story_matches_constraints() {
        let studio = MockStudio::new(StoryConfig::default().with_min_chapters(4));
        let reply = studio
            .complete("Respond with {\"chapters\": [...]}", "Theme: dinosaurs")
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        let chapters = value["chapters"].as_array().unwrap();
        assert_eq!(chapters.len(), 4);
        assert!(chapters[0]["chapter_body"].as_str().unwrap().contains("dinosaurs"));
    }

    #[tokio::test]
    async fn test_mock_media() {
        let studio = MockStudio::default();
        let request = ImageRequest::builder()
            .prompt("x")
            .size("1x1")
            .build()
            .unwrap();
        let images = studio.generate(&request).await.unwrap();
        assert!(images[0].starts_with("data:image/png;base64,"));

        let status = studio.poll_status(MOCK_TASK_ID).await.unwrap();
        assert_eq!(status.finished_url(), Some(MOCK_VIDEO_URL));
    }
}
