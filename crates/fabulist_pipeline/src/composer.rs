//! Composition of stages: review loops and the sequential pipeline.

use crate::{
    checkpoint::{LoopMember, NodeCheckpoint},
    stage::{Flow, RevisionLimit, Stage, StageContext, mismatch},
};
use derive_getters::Getters;
use fabulist_core::{ResumeParams, ReviewConfig, StageName};
use fabulist_error::{
    BuilderError, BuilderErrorKind, FabulistResult, PipelineError, PipelineErrorKind,
};
use tracing::{debug, info, instrument};

/// Re-runs a generator and its review until the review approves.
///
/// The review's feedback becomes the next generator run's input. The only
/// successful way out is the review's break-loop action; errors propagate
/// immediately. `max_iterations` bounds generator runs since the last
/// approval (0 disables the bound), and exceeding it is
/// [`PipelineErrorKind::LoopExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct LoopController {
    name: String,
    generator: Stage,
    review: Stage,
    max_iterations: u32,
}

impl LoopController {
    /// Pair a generator with its review stage.
    ///
    /// # Errors
    ///
    /// Fails if `review` is not a review stage or `generator` is one.
    ///
    /// ```
    /// use fabulist_pipeline::{LoopController, Stage};
    ///
    /// assert!(LoopController::new("story_loop", Stage::StoryGenerate, Stage::StoryReview).is_ok());
    /// assert!(LoopController::new("bad", Stage::StoryReview, Stage::StoryGenerate).is_err());
    /// ```
    pub fn new(name: impl Into<String>, generator: Stage, review: Stage) -> Result<Self, BuilderError> {
        if generator.is_review() || !review.is_review() {
            return Err(BuilderError::new(BuilderErrorKind::ValidationFailed(format!(
                "a loop needs a generator then a review stage, got {} then {}",
                generator.name(),
                review.name()
            ))));
        }
        Ok(Self::pair(name, generator, review))
    }

    fn pair(name: impl Into<String>, generator: Stage, review: Stage) -> Self {
        Self {
            name: name.into(),
            generator,
            review,
            max_iterations: 0,
        }
    }

    /// Bound the number of generator runs; 0 means unbounded.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn covers(&self, stage: StageName) -> bool {
        stage == self.generator.name() || stage == self.review.name()
    }

    fn limit(&self) -> RevisionLimit<'_> {
        RevisionLimit {
            loop_name: &self.name,
            max_iterations: self.max_iterations,
        }
    }

    #[instrument(skip(self, ctx, input), fields(loop_name = %self.name))]
    async fn run(&self, ctx: &mut StageContext<'_>, input: Option<String>) -> FabulistResult<Flow> {
        // A session parked at the review (e.g. after its marker was lost)
        // re-enters at the review instead of regenerating.
        let start = if *ctx.state.state() == self.review.name() {
            LoopMember::Review
        } else {
            LoopMember::Generator
        };
        self.drive(ctx, input, start, None).await
    }

    #[instrument(skip(self, ctx, checkpoint, params), fields(loop_name = %self.name))]
    async fn resume(
        &self,
        ctx: &mut StageContext<'_>,
        checkpoint: &NodeCheckpoint,
        params: &ResumeParams,
    ) -> FabulistResult<Flow> {
        let NodeCheckpoint::Loop { member, inner, .. } = checkpoint else {
            return Err(mismatch(format!("expected a loop marker for {}", self.name)));
        };
        self.drive(ctx, None, *member, Some((inner.as_ref(), params)))
            .await
    }

    /// Alternate generator and review until approval.
    ///
    /// Generator runs are counted in the session state so the bound holds
    /// across calls, and the count is cleared when the review approves.
    async fn drive(
        &self,
        ctx: &mut StageContext<'_>,
        mut feed: Option<String>,
        start: LoopMember,
        mut pending: Option<(&NodeCheckpoint, &ResumeParams)>,
    ) -> FabulistResult<Flow> {
        let mut member = start;
        loop {
            if member == LoopMember::Generator {
                let flow = match pending.take() {
                    Some((checkpoint, params)) => {
                        self.generator.resume(ctx, checkpoint, params, None).await?
                    }
                    None => {
                        self.limit().check(ctx.state.loop_round(&self.name))?;
                        let iteration = ctx.state.record_loop_round(&self.name);
                        debug!(loop_name = %self.name, iteration, "Running generator");
                        self.generator.run(ctx, feed.take()).await?
                    }
                };
                match flow {
                    Flow::Continue(_) => member = LoopMember::Review,
                    Flow::BreakLoop => return self.approved(ctx).await,
                    Flow::Exit => return Ok(Flow::Exit),
                    Flow::Suspend(inner) => {
                        return Ok(self.suspended(ctx, LoopMember::Generator, inner));
                    }
                }
            }

            let flow = match pending.take() {
                Some((checkpoint, params)) => {
                    self.review
                        .resume(ctx, checkpoint, params, Some(self.limit()))
                        .await?
                }
                None => self.review.run(ctx, None).await?,
            };
            match flow {
                Flow::Continue(feedback) => {
                    debug!(
                        loop_name = %self.name,
                        iteration = ctx.state.loop_round(&self.name),
                        "Revision requested"
                    );
                    feed = feedback;
                    member = LoopMember::Generator;
                }
                Flow::BreakLoop => return self.approved(ctx).await,
                Flow::Exit => return Ok(Flow::Exit),
                Flow::Suspend(inner) => {
                    return Ok(self.suspended(ctx, LoopMember::Review, inner));
                }
            }
        }
    }

    async fn approved(&self, ctx: &mut StageContext<'_>) -> FabulistResult<Flow> {
        info!(
            loop_name = %self.name,
            iteration = ctx.state.loop_round(&self.name),
            "Approved, leaving loop"
        );
        ctx.state.reset_loop_rounds(&self.name);
        ctx.commit().await;
        Ok(Flow::Continue(None))
    }

    fn suspended(&self, ctx: &StageContext<'_>, member: LoopMember, inner: NodeCheckpoint) -> Flow {
        Flow::Suspend(NodeCheckpoint::Loop {
            iteration: ctx.state.loop_round(&self.name),
            member,
            inner: Box::new(inner),
        })
    }
}

/// One entry of a sequential pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// A single stage run once
    Stage(Stage),
    /// A generator/review loop
    Loop(LoopController),
}

impl Member {
    fn covers(&self, stage: StageName) -> bool {
        match self {
            Member::Stage(s) => s.name() == stage,
            Member::Loop(l) => l.covers(stage),
        }
    }

    async fn run(&self, ctx: &mut StageContext<'_>, input: Option<String>) -> FabulistResult<Flow> {
        match self {
            Member::Stage(stage) => stage.run(ctx, input).await,
            Member::Loop(controller) => controller.run(ctx, input).await,
        }
    }

    async fn resume(
        &self,
        ctx: &mut StageContext<'_>,
        checkpoint: &NodeCheckpoint,
        params: &ResumeParams,
    ) -> FabulistResult<Flow> {
        match self {
            Member::Stage(stage) => stage.resume(ctx, checkpoint, params, None).await,
            Member::Loop(controller) => controller.resume(ctx, checkpoint, params).await,
        }
    }
}

/// Runs its members once, in order.
///
/// Members share nothing but the session state. A suspension or error in
/// any member halts the sequence; the suspension marker records the
/// member's position so re-entry resumes that same member.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Pipeline {
    name: String,
    members: Vec<Member>,
}

impl Pipeline {
    /// Compose members into a named pipeline.
    pub fn new(name: impl Into<String>, members: Vec<Member>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// The standard story → illustrations → video pipeline.
    ///
    /// ```
    /// use fabulist_core::ReviewConfig;
    /// use fabulist_pipeline::{Member, Pipeline, Stage};
    ///
    /// let pipeline = Pipeline::illustrated_story(&ReviewConfig::default());
    /// assert_eq!(pipeline.members().len(), 4);
    /// assert_eq!(pipeline.members()[1], Member::Stage(Stage::ImagePrompt));
    /// ```
    pub fn illustrated_story(review: &ReviewConfig) -> Self {
        let rounds = *review.max_rounds();
        Self::new(
            "illustrated_story",
            vec![
                Member::Loop(
                    LoopController::pair("story_loop", Stage::StoryGenerate, Stage::StoryReview)
                        .with_max_iterations(rounds),
                ),
                Member::Stage(Stage::ImagePrompt),
                Member::Loop(
                    LoopController::pair("image_loop", Stage::ImageGenerate, Stage::ImageReview)
                        .with_max_iterations(rounds),
                ),
                Member::Stage(Stage::VideoGenerate),
            ],
        )
    }

    /// Start from the member covering the session's current stage.
    pub(crate) async fn run(&self, ctx: &mut StageContext<'_>) -> FabulistResult<Flow> {
        let stage = *ctx.state.state();
        match self.members.iter().position(|m| m.covers(stage)) {
            Some(start) => self.drive(ctx, start, None).await,
            None => {
                debug!(stage = %stage, "No member covers the current stage, nothing to run");
                Ok(Flow::Continue(None))
            }
        }
    }

    /// Re-enter the member recorded in the marker.
    pub(crate) async fn resume(
        &self,
        ctx: &mut StageContext<'_>,
        checkpoint: &NodeCheckpoint,
        params: &ResumeParams,
    ) -> FabulistResult<Flow> {
        let NodeCheckpoint::Sequence { index, inner } = checkpoint else {
            return Err(mismatch(format!("expected a sequence marker for {}", self.name)));
        };
        if *index >= self.members.len() {
            return Err(mismatch(format!(
                "member {} does not exist in {}",
                index, self.name
            )));
        }
        self.drive(ctx, *index, Some((inner.as_ref(), params))).await
    }

    async fn drive(
        &self,
        ctx: &mut StageContext<'_>,
        start: usize,
        mut pending: Option<(&NodeCheckpoint, &ResumeParams)>,
    ) -> FabulistResult<Flow> {
        for (index, member) in self.members.iter().enumerate().skip(start) {
            let flow = match pending.take() {
                Some((checkpoint, params)) => member.resume(ctx, checkpoint, params).await?,
                None => {
                    ctx.check_cancelled(*ctx.state.state())?;
                    member.run(ctx, None).await?
                }
            };
            match flow {
                Flow::Continue(_) => {}
                Flow::Exit => return Ok(Flow::Exit),
                Flow::BreakLoop => {
                    return Err(PipelineError::new(PipelineErrorKind::InvalidTransition(format!(
                        "break_loop from member {} of {} outside any loop",
                        index, self.name
                    )))
                    .into());
                }
                Flow::Suspend(inner) => {
                    return Ok(Flow::Suspend(NodeCheckpoint::Sequence {
                        index,
                        inner: Box::new(inner),
                    }));
                }
            }
        }
        Ok(Flow::Continue(None))
    }
}
