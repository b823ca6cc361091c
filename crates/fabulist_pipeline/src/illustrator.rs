//! Generator logic shared by the interruptible pipeline and the simple agent.
//!
//! Each operation reads the session state, calls one collaborator, writes
//! the results back and advances `state` to the successor stage. Nothing is
//! written back unless the whole operation succeeds.

use crate::{
    extraction::parse_story,
    prompts::{
        IMAGE_PROMPT_INSTRUCTION, image_prompt_request, revised_image_prompt, story_instruction,
        story_request, story_revision_request, video_prompt,
    },
};
use derive_getters::Getters;
use fabulist_core::{
    FabulistConfig, ImageConfig, ImagePrompt, SessionState, StageName, StoryConfig, VideoConfig,
};
use fabulist_error::{
    CollaboratorError, CollaboratorErrorKind, FabulistResult, ParseError, ParseErrorKind,
    PipelineError, PipelineErrorKind, ProtocolError, ProtocolErrorKind, TimeoutError,
};
use fabulist_interface::{
    ChatCompletion, ImageGeneration, ImageRequest, TaskStatus, VideoGeneration, VideoTaskRequest,
};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The external services a run depends on.
#[derive(Clone, Getters)]
pub struct Collaborators {
    /// Chat completion
    chat: Arc<dyn ChatCompletion>,
    /// Image generation
    images: Arc<dyn ImageGeneration>,
    /// Video generation
    video: Arc<dyn VideoGeneration>,
}

impl Collaborators {
    /// Bundle the three collaborators.
    pub fn new(
        chat: Arc<dyn ChatCompletion>,
        images: Arc<dyn ImageGeneration>,
        video: Arc<dyn VideoGeneration>,
    ) -> Self {
        Self { chat, images, video }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("chat_model", &self.chat.model_name())
            .finish_non_exhaustive()
    }
}

/// Runs the generation steps against a session state.
#[derive(Debug, Clone, Getters)]
pub struct Illustrator {
    collaborators: Collaborators,
    story: StoryConfig,
    images: ImageConfig,
    video: VideoConfig,
}

impl Illustrator {
    /// Create an illustrator with default settings.
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            story: StoryConfig::default(),
            images: ImageConfig::default(),
            video: VideoConfig::default(),
        }
    }

    /// Create an illustrator using the story, image and video sections of a config.
    pub fn from_config(collaborators: Collaborators, config: &FabulistConfig) -> Self {
        Self {
            collaborators,
            story: config.story,
            images: config.images.clone(),
            video: config.video,
        }
    }

    /// Replace the story constraints.
    pub fn with_story_config(mut self, story: StoryConfig) -> Self {
        self.story = story;
        self
    }

    /// Replace the image settings.
    pub fn with_image_config(mut self, images: ImageConfig) -> Self {
        self.images = images;
        self
    }

    /// Replace the video polling settings.
    pub fn with_video_config(mut self, video: VideoConfig) -> Self {
        self.video = video;
        self
    }

    /// Draft the story, or revise it when feedback is given.
    ///
    /// Leaves the state at `story_review`.
    #[instrument(skip(self, state, cancel), fields(theme = %state.story().theme, revising = feedback.is_some()))]
    pub async fn write_story(
        &self,
        state: &mut SessionState,
        feedback: Option<&str>,
        cancel: &CancellationToken,
    ) -> FabulistResult<()> {
        let theme = state.story().theme.trim();
        if theme.is_empty() {
            return Err(ProtocolError::new(ProtocolErrorKind::MissingState(
                "story theme".to_string(),
            ))
            .into());
        }

        let request = match feedback {
            Some(feedback) if !state.story().is_empty() => {
                story_revision_request(state.story(), feedback)
            }
            _ => story_request(theme),
        };
        let instruction = story_instruction(&self.story);

        let reply = cancellable(
            cancel,
            StageName::StoryGenerate,
            self.collaborators.chat.complete(&instruction, &request),
        )
        .await?;
        let chapters = parse_story(&reply, *self.story.min_chapters(), *self.story.max_chapters())?;

        info!(chapters = chapters.len(), "Story written");
        state.replace_chapters(chapters);
        state.advance_to(StageName::StoryReview);
        Ok(())
    }

    /// Derive one illustration prompt per chapter.
    ///
    /// Leaves the state at `image_generate`.
    #[instrument(skip(self, state, cancel), fields(chapters = state.story().chapters.len()))]
    pub async fn derive_image_prompts(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> FabulistResult<()> {
        if state.story().is_empty() {
            return Err(ProtocolError::new(ProtocolErrorKind::MissingState(
                "story chapters".to_string(),
            ))
            .into());
        }

        let mut prompts = Vec::with_capacity(state.story().chapters.len());
        for (chapter_index, chapter) in state.story().chapters.iter().enumerate() {
            let reply = cancellable(
                cancel,
                StageName::ImagePrompt,
                self.collaborators
                    .chat
                    .complete(IMAGE_PROMPT_INSTRUCTION, &image_prompt_request(chapter)),
            )
            .await?;
            let prompt = reply.trim();
            if prompt.is_empty() {
                return Err(ParseError::new(ParseErrorKind::MissingField(format!(
                    "image prompt for chapter {}",
                    chapter_index + 1
                )))
                .into());
            }
            debug!(chapter_index, "Image prompt derived");
            prompts.push(ImagePrompt {
                chapter_index,
                prompt: prompt.to_string(),
            });
        }

        info!(prompts = prompts.len(), "Image prompts derived");
        state.set_image_prompts(prompts)?;
        state.advance_to(StageName::ImageGenerate);
        Ok(())
    }

    /// Render illustrations for every prompt.
    ///
    /// With feedback, the feedback is appended to each prompt and the
    /// chapter's previous images are sent as references. Leaves the state
    /// at `image_review`.
    #[instrument(skip(self, state, cancel), fields(prompts = state.image_prompts().len(), revising = feedback.is_some()))]
    pub async fn render_images(
        &self,
        state: &mut SessionState,
        feedback: Option<&str>,
        cancel: &CancellationToken,
    ) -> FabulistResult<()> {
        if state.image_prompts().is_empty() {
            return Err(ProtocolError::new(ProtocolErrorKind::MissingState(
                "image prompts".to_string(),
            ))
            .into());
        }

        let mut rendered = Vec::with_capacity(state.image_prompts().len());
        for prompt in state.image_prompts() {
            let (text, references) = match feedback {
                Some(feedback) => (
                    revised_image_prompt(&prompt.prompt, feedback),
                    state
                        .generated_images()
                        .get(&prompt.chapter_index)
                        .cloned()
                        .unwrap_or_default(),
                ),
                None => (prompt.prompt.clone(), Vec::new()),
            };

            let request = ImageRequest::builder()
                .prompt(text)
                .size(self.images.size().clone())
                .sequential_mode(self.images.sequential_mode().clone())
                .max_images(*self.images.max_images())
                .reference_images(references)
                .build()?;

            let images = cancellable(
                cancel,
                StageName::ImageGenerate,
                self.collaborators.images.generate(&request),
            )
            .await?;
            if images.is_empty() {
                return Err(CollaboratorError::new(CollaboratorErrorKind::EmptyResponse(
                    format!("image generation for chapter {}", prompt.chapter_index + 1),
                ))
                .into());
            }
            debug!(chapter_index = prompt.chapter_index, images = images.len(), "Chapter illustrated");
            rendered.push((prompt.chapter_index, images));
        }

        for (chapter_index, images) in rendered {
            state.set_chapter_images(chapter_index, images)?;
        }
        info!(chapters = state.generated_images().len(), "Images rendered");
        state.advance_to(StageName::ImageReview);
        Ok(())
    }

    /// Render the final video and poll until it is ready.
    ///
    /// Leaves the state at `complete` and returns the video reference.
    ///
    /// # Errors
    ///
    /// Returns a [`TimeoutError`] if the task is still pending after the
    /// configured number of polls, and a collaborator error if it fails.
    #[instrument(skip(self, state, cancel), fields(chapters = state.story().chapters.len()))]
    pub async fn render_video(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> FabulistResult<String> {
        if !state.all_chapters_illustrated() {
            return Err(ProtocolError::new(ProtocolErrorKind::MissingState(
                "generated images for every chapter".to_string(),
            ))
            .into());
        }

        let request = VideoTaskRequest::builder()
            .prompt(video_prompt(state.story()))
            .reference_images(state.images_in_chapter_order())
            .build()?;

        let task_id = cancellable(
            cancel,
            StageName::VideoGenerate,
            self.collaborators.video.create_task(&request),
        )
        .await?;
        info!(task_id = %task_id, "Video task created");

        let attempts = *self.video.poll_attempts();
        for attempt in 1..=attempts {
            let status = cancellable(
                cancel,
                StageName::VideoGenerate,
                self.collaborators.video.poll_status(&task_id),
            )
            .await?;
            debug!(attempt, status = %status.status(), "Polled video task");

            if let Some(url) = status.finished_url() {
                let url = url.to_string();
                info!(task_id = %task_id, attempt, "Video ready");
                state.set_video_url(url.clone());
                state.advance_to(StageName::Complete);
                return Ok(url);
            }
            if *status.status() == TaskStatus::Failed {
                tracing::error!(task_id = %task_id, "Video task failed");
                return Err(CollaboratorError::new(CollaboratorErrorKind::TaskFailed(task_id)).into());
            }

            if attempt < attempts {
                let interval = self.video.poll_interval();
                cancellable(cancel, StageName::VideoGenerate, async move {
                    tokio::time::sleep(interval).await;
                    Ok(())
                })
                .await?;
            }
        }

        warn!(task_id = %task_id, attempts, "Video task did not finish in time");
        Err(TimeoutError::new(format!("video task {}", task_id), attempts).into())
    }
}

/// Await `work` unless the token is cancelled first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    stage: StageName,
    work: impl Future<Output = FabulistResult<T>>,
) -> FabulistResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(stage = %stage, "Cancelled while waiting on a collaborator");
            Err(PipelineError::new(PipelineErrorKind::Cancelled(stage.to_string())).into())
        }
        result = work => result,
    }
}
