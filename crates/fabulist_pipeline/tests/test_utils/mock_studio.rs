//! Mock chat, image, and video collaborators.

use async_trait::async_trait;
use fabulist_error::{CollaboratorError, CollaboratorErrorKind, FabulistError, FabulistResult};
use fabulist_interface::{
    ChatCompletion, ImageGeneration, ImageRequest, TaskStatus, VideoGeneration, VideoTaskRequest,
    VideoTaskStatus,
};
use fabulist_pipeline::{Collaborators, IMAGE_PROMPT_INSTRUCTION};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock chat model.
///
/// Story requests are answered from a script (the last reply repeats);
/// image-prompt requests get a prompt naming the chapter title.
pub struct MockChat {
    story_replies: Mutex<VecDeque<String>>,
    story_requests: Mutex<Vec<String>>,
    prompt_calls: Mutex<usize>,
    failure: Option<CollaboratorErrorKind>,
    delay: Duration,
}

impl MockChat {
    /// Answer every story request with the given replies in order.
    pub fn new_sequence(replies: Vec<String>) -> Self {
        Self {
            story_replies: Mutex::new(replies.into()),
            story_requests: Mutex::new(Vec::new()),
            prompt_calls: Mutex::new(0),
            failure: None,
            delay: Duration::ZERO,
        }
    }

    /// Answer like [`MockChat::new_sequence`], after sleeping `delay` per call.
    pub fn new_slow(delay: Duration, replies: Vec<String>) -> Self {
        Self {
            delay,
            ..Self::new_sequence(replies)
        }
    }

    /// Fail every call with the given error.
    pub fn new_error(kind: CollaboratorErrorKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::new_sequence(Vec::new())
        }
    }

    /// Number of story requests received.
    pub fn story_calls(&self) -> usize {
        self.story_requests.lock().unwrap().len()
    }

    /// User content of every story request, in order.
    pub fn story_requests(&self) -> Vec<String> {
        self.story_requests.lock().unwrap().clone()
    }

    /// Number of image-prompt requests received.
    pub fn prompt_calls(&self) -> usize {
        *self.prompt_calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatCompletion for MockChat {
    async fn complete(&self, instruction: &str, user_content: &str) -> FabulistResult<String> {
        if let Some(kind) = &self.failure {
            return Err(FabulistError::from(CollaboratorError::new(kind.clone())));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if instruction == IMAGE_PROMPT_INSTRUCTION {
            *self.prompt_calls.lock().unwrap() += 1;
            let title = user_content.lines().next().unwrap_or_default();
            return Ok(format!("  Watercolor illustration of {}  ", title));
        }

        self.story_requests
            .lock()
            .unwrap()
            .push(user_content.to_string());
        let mut replies = self.story_replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.ok_or_else(|| {
            CollaboratorError::new(CollaboratorErrorKind::EmptyResponse(
                "mock story script exhausted".to_string(),
            ))
            .into()
        })
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

/// Mock image model returning one URL per call.
#[derive(Default)]
pub struct MockImages {
    requests: Mutex<Vec<ImageRequest>>,
    empty: bool,
}

impl MockImages {
    /// Return one image per request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return no images at all.
    pub fn new_empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    /// Number of generate calls.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGeneration for MockImages {
    async fn generate(&self, request: &ImageRequest) -> FabulistResult<Vec<String>> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(vec![format!("https://img.test/{}.png", requests.len())])
    }
}

/// Mock video model replaying a status script (the last status repeats).
pub struct MockVideo {
    statuses: Mutex<VecDeque<VideoTaskStatus>>,
    requests: Mutex<Vec<VideoTaskRequest>>,
    poll_count: Mutex<usize>,
}

impl MockVideo {
    /// Replay the given statuses.
    pub fn new_sequence(statuses: Vec<VideoTaskStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            requests: Mutex::new(Vec::new()),
            poll_count: Mutex::new(0),
        }
    }

    /// Pending once, then succeeded.
    pub fn new_success() -> Self {
        Self::new_sequence(vec![
            VideoTaskStatus::pending(),
            VideoTaskStatus::new(
                TaskStatus::Succeeded,
                Some("https://video.test/story.mp4".to_string()),
            ),
        ])
    }

    /// Number of tasks created.
    pub fn create_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of status polls.
    pub fn poll_count(&self) -> usize {
        *self.poll_count.lock().unwrap()
    }

    /// Every task request received.
    pub fn requests(&self) -> Vec<VideoTaskRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoGeneration for MockVideo {
    async fn create_task(&self, request: &VideoTaskRequest) -> FabulistResult<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("task-{}", requests.len()))
    }

    async fn poll_status(&self, _task_id: &str) -> FabulistResult<VideoTaskStatus> {
        *self.poll_count.lock().unwrap() += 1;
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or_else(VideoTaskStatus::pending))
    }
}

/// The three mocks, shared with the code under test.
#[derive(Clone)]
pub struct Studio {
    pub chat: Arc<MockChat>,
    pub images: Arc<MockImages>,
    pub video: Arc<MockVideo>,
}

impl Studio {
    /// Mocks that complete a run without revisions.
    pub fn new(story_replies: Vec<String>) -> Self {
        Self::with_video(story_replies, MockVideo::new_success())
    }

    /// Mocks with a custom video script.
    pub fn with_video(story_replies: Vec<String>, video: MockVideo) -> Self {
        Self {
            chat: Arc::new(MockChat::new_sequence(story_replies)),
            images: Arc::new(MockImages::new()),
            video: Arc::new(video),
        }
    }

    /// Total collaborator calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.chat.story_calls()
            + self.chat.prompt_calls()
            + self.images.call_count()
            + self.video.create_count()
            + self.video.poll_count()
    }

    /// Collaborators for an illustrator.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(self.chat.clone(), self.images.clone(), self.video.clone())
    }
}
