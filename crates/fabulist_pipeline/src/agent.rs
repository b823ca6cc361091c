//! A single-call conversational agent over the same generation steps.
//!
//! Unlike [`Runner`](crate::Runner), the agent never suspends: each call
//! reads the session's stage, treats the input as the reply that stage is
//! waiting for, does as much work as that reply unlocks, and returns.

use crate::{
    illustrator::Illustrator,
    review::{ReviewDecision, review_prompt},
    runner::SessionLocks,
    store::InMemorySessionStore,
};
use derive_getters::Getters;
use fabulist_core::{ReviewConfig, SessionState, StageName};
use fabulist_error::{FabulistError, FabulistResult, ProtocolError, ProtocolErrorKind};
use fabulist_interface::SessionStore;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// The agent's answer to one call.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct AgentReply {
    /// Stage the session is at after the call
    stage: StageName,
    /// What to show the user
    message: String,
}

impl AgentReply {
    fn new(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Story-to-video agent driven by one message per call.
#[derive(Clone)]
pub struct IllustrationAgent {
    illustrator: Arc<Illustrator>,
    sessions: Arc<dyn SessionStore>,
    sentinel: String,
    locks: SessionLocks,
}

impl std::fmt::Debug for IllustrationAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IllustrationAgent")
            .field("illustrator", &self.illustrator)
            .field("sentinel", &self.sentinel)
            .finish_non_exhaustive()
    }
}

impl IllustrationAgent {
    /// Create an agent over a session store.
    pub fn new(illustrator: Illustrator, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            illustrator: Arc::new(illustrator),
            sessions,
            sentinel: ReviewConfig::default().approval_sentinel().clone(),
            locks: SessionLocks::default(),
        }
    }

    /// Create an agent with a process-local session store.
    pub fn in_memory(illustrator: Illustrator) -> Self {
        Self::new(illustrator, Arc::new(InMemorySessionStore::new()))
    }

    /// Replace the reply that counts as approval.
    pub fn with_approval_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Current state of a session.
    pub async fn session_state(&self, session_key: &str) -> SessionState {
        self.sessions.get(session_key).await
    }

    /// Handle one user message.
    ///
    /// A fresh session takes the message as the theme. At a review stage
    /// the message is the review reply. A completed session reports its
    /// video without calling any collaborator. The session is saved only
    /// when the call succeeds.
    #[instrument(skip(self, input, cancel), fields(session = %session_key))]
    pub async fn invoke(
        &self,
        session_key: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> FabulistResult<AgentReply> {
        let _guard = self.locks.acquire(session_key).await;
        let mut state = self.sessions.get(session_key).await;
        debug!(stage = %state.state(), "Agent invoked");

        let message = match *state.state() {
            StageName::Init => {
                let theme = input.trim();
                if theme.is_empty() {
                    return Err(ProtocolError::new(ProtocolErrorKind::EmptyInput(
                        "story theme".to_string(),
                    ))
                    .into());
                }
                state.begin(theme);
                self.write(&mut state, None, cancel).await?
            }
            StageName::StoryGenerate => {
                let feedback = state.pending_story_feedback().map(String::from);
                self.write(&mut state, feedback.as_deref(), cancel).await?
            }
            StageName::StoryReview => match self.decide(input, StageName::StoryReview)? {
                ReviewDecision::Approve => {
                    ReviewDecision::Approve.apply(&mut state, StageName::StoryReview)?;
                    self.illustrate(&mut state, cancel).await?
                }
                ReviewDecision::Revise(feedback) => {
                    ReviewDecision::Revise(feedback.clone())
                        .apply(&mut state, StageName::StoryReview)?;
                    self.write(&mut state, Some(&feedback), cancel).await?
                }
            },
            StageName::ImagePrompt => self.illustrate(&mut state, cancel).await?,
            StageName::ImageGenerate => {
                let feedback = state.pending_image_feedback().map(String::from);
                self.render(&mut state, feedback.as_deref(), cancel).await?
            }
            StageName::ImageReview => match self.decide(input, StageName::ImageReview)? {
                ReviewDecision::Approve => {
                    ReviewDecision::Approve.apply(&mut state, StageName::ImageReview)?;
                    self.illustrator.render_video(&mut state, cancel).await?
                }
                ReviewDecision::Revise(feedback) => {
                    ReviewDecision::Revise(feedback.clone())
                        .apply(&mut state, StageName::ImageReview)?;
                    self.render(&mut state, Some(&feedback), cancel).await?
                }
            },
            StageName::VideoGenerate => self.illustrator.render_video(&mut state, cancel).await?,
            StageName::Complete => state.video_url().clone().ok_or_else(|| {
                FabulistError::from(ProtocolError::new(ProtocolErrorKind::MissingState(
                    "video url of a completed session".to_string(),
                )))
            })?,
        };

        self.sessions.save(session_key, state.clone()).await;
        info!(stage = %state.state(), "Agent call complete");
        Ok(AgentReply::new(*state.state(), message))
    }

    fn decide(&self, input: &str, stage: StageName) -> Result<ReviewDecision, ProtocolError> {
        ReviewDecision::classify(Some(&Value::String(input.to_string())), stage, &self.sentinel)
    }

    async fn write(
        &self,
        state: &mut SessionState,
        feedback: Option<&str>,
        cancel: &CancellationToken,
    ) -> FabulistResult<String> {
        self.illustrator.write_story(state, feedback, cancel).await?;
        Ok(review_prompt(state, StageName::StoryReview, &self.sentinel))
    }

    async fn render(
        &self,
        state: &mut SessionState,
        feedback: Option<&str>,
        cancel: &CancellationToken,
    ) -> FabulistResult<String> {
        self.illustrator.render_images(state, feedback, cancel).await?;
        Ok(review_prompt(state, StageName::ImageReview, &self.sentinel))
    }

    async fn illustrate(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> FabulistResult<String> {
        self.illustrator.derive_image_prompts(state, cancel).await?;
        self.render(state, None, cancel).await
    }
}
