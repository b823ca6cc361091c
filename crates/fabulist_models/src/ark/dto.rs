//! Ark API request and response bodies.

use base64::Engine;
use fabulist_interface::{ImageRequest, TaskStatus, VideoTaskRequest, VideoTaskStatus};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ChatMessage {
    role: ChatRole,
    content: String,
}

/// Body of `POST /api/v3/chat/completions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// A system instruction (omitted when blank) followed by the user content.
    pub(crate) fn new(model: &str, instruction: &str, user_content: &str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !instruction.trim().is_empty() {
            messages.push(ChatMessage {
                role: ChatRole::System,
                content: instruction.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: ChatRole::User,
            content: user_content.to_string(),
        });
        Self {
            model: model.to_string(),
            messages,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatContent>,
    #[serde(default)]
    delta: Option<ChatContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl ChatResponse {
    /// Text of the first choice, falling back to its delta.
    pub(crate) fn into_content(self) -> Option<String> {
        let choice = self.choices.into_iter().next()?;
        [choice.message, choice.delta]
            .into_iter()
            .flatten()
            .filter_map(|c| c.content)
            .find(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct SequentialOptions {
    max_images: u32,
}

/// Body of `POST /api/v3/images/generations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ImageGenerationRequest {
    model: String,
    prompt: String,
    size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequential_image_generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequential_image_generation_options: Option<SequentialOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    image: Vec<String>,
}

impl ImageGenerationRequest {
    pub(crate) fn new(model: &str, request: &ImageRequest) -> Self {
        let mode = request.sequential_mode().trim();
        let sequential_image_generation = (!mode.is_empty()).then(|| mode.to_string());
        // The image cap only applies to automatic sequential generation.
        let sequential_image_generation_options = (mode == "auto" && *request.max_images() > 0)
            .then(|| SequentialOptions {
                max_images: *request.max_images(),
            });
        Self {
            model: model.to_string(),
            prompt: request.prompt().clone(),
            size: request.size().clone(),
            sequential_image_generation,
            sequential_image_generation_options,
            image: request.reference_images().clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

impl ImageGenerationResponse {
    /// URLs as given; inline payloads as `data:` URIs.
    pub(crate) fn into_references(self) -> Vec<String> {
        self.data
            .into_iter()
            .filter_map(|datum| {
                if let Some(url) = datum.url.filter(|u| !u.is_empty()) {
                    return Some(url);
                }
                let payload = datum.b64_json.filter(|b| !b.is_empty())?;
                if base64::engine::general_purpose::STANDARD
                    .decode(&payload)
                    .is_err()
                {
                    warn!("Skipping image with an undecodable base64 payload");
                    return None;
                }
                let format = datum.format.unwrap_or_else(|| "png".to_string());
                Some(format!("data:image/{};base64,{}", format, payload))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum FrameRole {
    FirstFrame,
    LastFrame,
    ReferenceImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ImageUrl {
    url: String,
    role: FrameRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentItem {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentItem {
    fn image(url: &str, role: FrameRole) -> Self {
        ContentItem::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
                role,
            },
        }
    }
}

/// Body of `POST /api/v3/contents/generations/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct VideoTaskBody {
    model: String,
    content: Vec<ContentItem>,
}

impl VideoTaskBody {
    /// Frames win over references: first+last, then first alone, then
    /// every reference image.
    pub(crate) fn new(model: &str, request: &VideoTaskRequest) -> Self {
        let mut content = vec![ContentItem::Text {
            text: request.prompt().clone(),
        }];
        match (request.first_frame(), request.last_frame()) {
            (Some(first), Some(last)) => {
                content.push(ContentItem::image(first, FrameRole::FirstFrame));
                content.push(ContentItem::image(last, FrameRole::LastFrame));
            }
            (Some(first), None) => content.push(ContentItem::image(first, FrameRole::FirstFrame)),
            _ => content.extend(
                request
                    .reference_images()
                    .iter()
                    .map(|url| ContentItem::image(url, FrameRole::ReferenceImage)),
            ),
        }
        Self {
            model: model.to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateTaskResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl CreateTaskResponse {
    pub(crate) fn into_task_id(self) -> Option<String> {
        self.task_id
            .filter(|id| !id.is_empty())
            .or(self.id.filter(|id| !id.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TaskOutput {
    #[serde(default)]
    video_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskStatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    output: Option<TaskOutput>,
    #[serde(default)]
    content: Option<TaskOutput>,
}

impl TaskStatusResponse {
    pub(crate) fn into_status(self) -> VideoTaskStatus {
        let url = [
            self.video_url,
            self.output.and_then(|o| o.video_url),
            self.content.and_then(|c| c.video_url),
        ]
        .into_iter()
        .flatten()
        .find(|url| !url.is_empty());
        VideoTaskStatus::new(TaskStatus::from_provider(&self.status), url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_skips_blank_instruction() {
        let body = serde_json::to_value(ChatRequest::new("m", "  ", "hello")).unwrap();
        assert_eq!(
            body,
            json!({"model": "m", "messages": [{"role": "user", "content": "hello"}]})
        );
    }

    #[test]
    fn test_chat_content_falls_back_to_delta() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": ""}, "delta": {"content": "streamed"}}]
        }))
        .unwrap();
        assert_eq!(response.into_content().as_deref(), Some("streamed"));

        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(empty.into_content().is_none());
    }

    #[test]
    fn test_image_request_body() {
        let request = ImageRequest::builder()
            .prompt("a dragon")
            .size("2304x1728")
            .reference_images(vec!["https://img.test/1.png".to_string()])
            .build()
            .unwrap();
        let body = serde_json::to_value(ImageGenerationRequest::new("seedream", &request)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "seedream",
                "prompt": "a dragon",
                "size": "2304x1728",
                "sequential_image_generation": "auto",
                "sequential_image_generation_options": {"max_images": 3},
                "image": ["https://img.test/1.png"],
            })
        );
    }

    #[test]
    fn test_image_options_only_for_auto_mode() {
        let request = ImageRequest::builder()
            .prompt("a dragon")
            .size("1024x1024")
            .sequential_mode("disabled")
            .build()
            .unwrap();
        let body = serde_json::to_value(ImageGenerationRequest::new("seedream", &request)).unwrap();
        assert_eq!(body["sequential_image_generation"], "disabled");
        assert!(body.get("sequential_image_generation_options").is_none());
        assert!(body.get("image").is_none());
    }

    #[test]
    fn test_image_response_references() {
        let response: ImageGenerationResponse = serde_json::from_value(json!({
            "data": [
                {"url": "https://img.test/a.png"},
                {"b64_json": "aGVsbG8=", "format": "jpeg"},
                {"b64_json": "aGVsbG8="},
                {"b64_json": "not base64!"},
                {}
            ]
        }))
        .unwrap();
        assert_eq!(
            response.into_references(),
            vec![
                "https://img.test/a.png".to_string(),
                "data:image/jpeg;base64,aGVsbG8=".to_string(),
                "data:image/png;base64,aGVsbG8=".to_string(),
            ]
        );
    }

    #[test]
    fn test_video_body_prefers_frames() {
        let request = VideoTaskRequest::builder()
            .prompt("story")
            .reference_images(vec!["r1".to_string(), "r2".to_string()])
            .first_frame("f")
            .last_frame("l")
            .build()
            .unwrap();
        let body = serde_json::to_value(VideoTaskBody::new("seedance", &request)).unwrap();
        assert_eq!(
            body["content"],
            json!([
                {"type": "text", "text": "story"},
                {"type": "image_url", "image_url": {"url": "f", "role": "first_frame"}},
                {"type": "image_url", "image_url": {"url": "l", "role": "last_frame"}},
            ])
        );
    }

    #[test]
    fn test_video_body_reference_images() {
        let request = VideoTaskRequest::builder()
            .prompt("story")
            .reference_images(vec!["r1".to_string(), "r2".to_string()])
            .build()
            .unwrap();
        let body = serde_json::to_value(VideoTaskBody::new("seedance", &request)).unwrap();
        let content = body["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[2]["image_url"]["role"], "reference_image");
        assert_eq!(content[2]["image_url"]["url"], "r2");
    }

    #[test]
    fn test_task_id_and_status_fallbacks() {
        let created: CreateTaskResponse = serde_json::from_value(json!({"id": "cgt-1"})).unwrap();
        assert_eq!(created.into_task_id().as_deref(), Some("cgt-1"));
        let created: CreateTaskResponse = serde_json::from_value(json!({"task_id": ""})).unwrap();
        assert!(created.into_task_id().is_none());

        let status: TaskStatusResponse = serde_json::from_value(json!({
            "status": "succeeded",
            "output": {"video_url": "https://video.test/v.mp4"}
        }))
        .unwrap();
        assert_eq!(
            status.into_status().finished_url(),
            Some("https://video.test/v.mp4")
        );

        let status: TaskStatusResponse =
            serde_json::from_value(json!({"status": "running"})).unwrap();
        assert_eq!(*status.into_status().status(), TaskStatus::Pending);
    }
}
