//! Stages: the atoms of a pipeline.

use crate::{
    checkpoint::NodeCheckpoint,
    illustrator::Illustrator,
    review::{ReviewDecision, review_prompt},
};
use fabulist_core::{
    ControlAction, Event, InterruptContext, ResumeParams, SessionState, StageName, StageOutput,
};
use fabulist_error::{
    FabulistResult, PipelineError, PipelineErrorKind, ProtocolError, ProtocolErrorKind,
};
use fabulist_interface::SessionStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Where events from a running pipeline go.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub(crate) async fn emit(&self, event: Event) {
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }
}

/// Everything a stage may touch during one invocation.
pub(crate) struct StageContext<'a> {
    pub(crate) session_key: &'a str,
    pub(crate) state: &'a mut SessionState,
    pub(crate) illustrator: &'a Illustrator,
    pub(crate) sessions: &'a dyn SessionStore,
    pub(crate) events: &'a EventSink,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) sentinel: &'a str,
}

impl StageContext<'_> {
    /// Persist the working copy of the session state.
    pub(crate) async fn commit(&self) {
        self.sessions.save(self.session_key, self.state.clone()).await;
    }

    pub(crate) fn check_cancelled(&self, stage: StageName) -> FabulistResult<()> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::new(PipelineErrorKind::Cancelled(stage.to_string())).into());
        }
        Ok(())
    }

    async fn output(&self, stage: StageName, content: impl Into<String>) {
        self.events
            .emit(Event::Output(StageOutput::new(stage, content)))
            .await;
    }
}

/// The bound of the loop a review belongs to.
///
/// Checked before a revision is committed, so an exhausted loop leaves the
/// review suspended and the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RevisionLimit<'a> {
    pub(crate) loop_name: &'a str,
    pub(crate) max_iterations: u32,
}

impl RevisionLimit<'_> {
    /// Fail if `rounds` generator runs leave no room for another; 0 is unbounded.
    pub(crate) fn check(&self, rounds: u32) -> FabulistResult<()> {
        if self.max_iterations > 0 && rounds >= self.max_iterations {
            error!(
                loop_name = %self.loop_name,
                max_iterations = self.max_iterations,
                "Review loop exhausted without approval"
            );
            return Err(PipelineError::new(PipelineErrorKind::LoopExhausted {
                loop_name: self.loop_name.to_string(),
                max_iterations: self.max_iterations,
            })
            .into());
        }
        Ok(())
    }
}

/// What a node asks of its parent after running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Finished; optional text to feed the next generator run
    Continue(Option<String>),
    /// Leave the directly enclosing loop
    BreakLoop,
    /// Stop the whole pipeline
    Exit,
    /// Suspended at the given path
    Suspend(NodeCheckpoint),
}

/// The closed set of stage behaviors.
///
/// Generator stages call a collaborator and advance the session to their
/// successor. Review stages suspend for a reviewer and classify the reply
/// on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Draft or revise the story
    StoryGenerate,
    /// Gate the story on approval
    StoryReview,
    /// Derive per-chapter illustration prompts
    ImagePrompt,
    /// Render or re-render illustrations
    ImageGenerate,
    /// Gate the illustrations on approval
    ImageReview,
    /// Render the final video
    VideoGenerate,
}

impl Stage {
    /// The state-machine node this stage implements.
    pub fn name(&self) -> StageName {
        match self {
            Stage::StoryGenerate => StageName::StoryGenerate,
            Stage::StoryReview => StageName::StoryReview,
            Stage::ImagePrompt => StageName::ImagePrompt,
            Stage::ImageGenerate => StageName::ImageGenerate,
            Stage::ImageReview => StageName::ImageReview,
            Stage::VideoGenerate => StageName::VideoGenerate,
        }
    }

    /// Whether this stage suspends for review.
    pub fn is_review(&self) -> bool {
        self.name().is_review()
    }

    /// Run the stage from the current session state.
    ///
    /// `input` is the previous review's feedback when a loop re-runs its
    /// generator.
    pub(crate) async fn run(
        &self,
        ctx: &mut StageContext<'_>,
        input: Option<String>,
    ) -> FabulistResult<Flow> {
        let name = self.name();
        ctx.check_cancelled(name)?;
        debug!(stage = %name, has_input = input.is_some(), "Entering stage");

        match self {
            Stage::StoryGenerate => {
                let feedback = input.or_else(|| ctx.state.pending_story_feedback().map(String::from));
                ctx.illustrator
                    .write_story(ctx.state, feedback.as_deref(), ctx.cancel)
                    .await?;
                ctx.commit().await;
                ctx.output(name, ctx.state.story().render()).await;
            }
            Stage::ImagePrompt => {
                ctx.illustrator
                    .derive_image_prompts(ctx.state, ctx.cancel)
                    .await?;
                ctx.commit().await;
                ctx.output(
                    name,
                    format!("Generated {} image prompts", ctx.state.image_prompts().len()),
                )
                .await;
            }
            Stage::ImageGenerate => {
                let feedback = input.or_else(|| ctx.state.pending_image_feedback().map(String::from));
                ctx.illustrator
                    .render_images(ctx.state, feedback.as_deref(), ctx.cancel)
                    .await?;
                ctx.commit().await;
                ctx.output(
                    name,
                    format!(
                        "Rendered {} images for {} chapters",
                        ctx.state.images_in_chapter_order().len(),
                        ctx.state.generated_images().len()
                    ),
                )
                .await;
            }
            Stage::VideoGenerate => {
                let url = ctx.illustrator.render_video(ctx.state, ctx.cancel).await?;
                ctx.commit().await;
                ctx.output(name, url).await;
            }
            Stage::StoryReview | Stage::ImageReview => return self.suspend(ctx).await,
        }

        info!(stage = %name, next = %ctx.state.state(), "Stage complete");
        Ok(Flow::Continue(None))
    }

    async fn suspend(&self, ctx: &mut StageContext<'_>) -> FabulistResult<Flow> {
        let name = self.name();
        ctx.state.advance_to(name);
        ctx.commit().await;

        let interrupt = InterruptContext::new(review_prompt(ctx.state, name, ctx.sentinel), name);
        info!(stage = %name, interrupt_id = %interrupt.id, "Suspending for review");
        Ok(Flow::Suspend(NodeCheckpoint::Stage {
            stage: name,
            interrupt,
        }))
    }

    /// Re-enter a stage that suspended at `checkpoint`.
    ///
    /// Unless the params target this stage's interrupt, the identical
    /// suspension is returned and the session state is left untouched. A
    /// revision that `limit` does not allow fails before anything is saved.
    pub(crate) async fn resume(
        &self,
        ctx: &mut StageContext<'_>,
        checkpoint: &NodeCheckpoint,
        params: &ResumeParams,
        limit: Option<RevisionLimit<'_>>,
    ) -> FabulistResult<Flow> {
        let name = self.name();
        let NodeCheckpoint::Stage { stage, interrupt } = checkpoint else {
            return Err(mismatch(format!("expected a stage marker for {}", name)));
        };
        if *stage != name || !self.is_review() {
            return Err(mismatch(format!(
                "marker for {} cannot resume stage {}",
                stage, name
            )));
        }

        if !params.is_target(&interrupt.id) {
            debug!(stage = %name, interrupt_id = %interrupt.id, "Not the resume target, asking again");
            return Ok(Flow::Suspend(checkpoint.clone()));
        }
        ctx.check_cancelled(name)?;

        let decision = ReviewDecision::classify(params.payload(&interrupt.id), name, ctx.sentinel)?;
        if let (ReviewDecision::Revise(_), Some(limit)) = (&decision, limit) {
            limit.check(ctx.state.loop_round(limit.loop_name))?;
        }
        decision.apply(ctx.state, name)?;
        ctx.commit().await;
        info!(stage = %name, interrupt_id = %interrupt.id, decision = %decision, "Review resolved");

        match decision {
            ReviewDecision::Approve => {
                ctx.events
                    .emit(Event::Action(ControlAction::BreakLoop { stage: name }))
                    .await;
                Ok(Flow::BreakLoop)
            }
            ReviewDecision::Revise(feedback) => {
                ctx.output(name, feedback.clone()).await;
                Ok(Flow::Continue(Some(feedback)))
            }
        }
    }
}

pub(crate) fn mismatch(reason: String) -> fabulist_error::FabulistError {
    ProtocolError::new(ProtocolErrorKind::CheckpointMismatch(reason)).into()
}
