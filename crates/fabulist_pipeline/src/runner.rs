//! Session-scoped execution of a pipeline with suspend/resume.

use crate::{
    checkpoint::{Checkpoint, NodeCheckpoint},
    composer::Pipeline,
    illustrator::{Collaborators, Illustrator},
    stage::{EventSink, Flow, StageContext, mismatch},
    store::{InMemoryCheckpointStore, InMemorySessionStore},
};
use fabulist_core::{
    ControlAction, Event, FabulistConfig, InterruptContext, ResumeParams, ReviewConfig,
    SessionState, StageName, StageOutput,
};
use fabulist_error::{
    FabulistError, FabulistResult, PipelineError, PipelineErrorKind, ProtocolError,
    ProtocolErrorKind,
};
use fabulist_interface::{CheckpointStore, SessionStore};
use futures::{Stream, StreamExt};
use std::{
    collections::HashMap,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

const EVENT_BUFFER: usize = 64;

/// One lock per session key so runs on a session never interleave.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub(crate) async fn acquire(&self, session_key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(session_key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// How a run ended, before it is reported.
#[derive(Debug)]
enum Settled {
    Completed,
    Suspended(NodeCheckpoint),
    Reasked(InterruptContext),
}

/// Drives a pipeline for many independent sessions.
///
/// Each call spawns the run and returns its event stream immediately.
/// Calls for the same session are serialized; different sessions run
/// concurrently. A suspended run leaves a checkpoint in the checkpoint
/// store that [`Runner::resume_with_params`] picks up.
#[derive(Clone)]
pub struct Runner {
    pipeline: Arc<Pipeline>,
    illustrator: Arc<Illustrator>,
    sessions: Arc<dyn SessionStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    sentinel: String,
    locks: SessionLocks,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("pipeline", &self.pipeline.name())
            .field("illustrator", &self.illustrator)
            .field("sentinel", &self.sentinel)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Create a runner over the given stores.
    pub fn new(
        pipeline: Pipeline,
        illustrator: Illustrator,
        sessions: Arc<dyn SessionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            illustrator: Arc::new(illustrator),
            sessions,
            checkpoints,
            sentinel: ReviewConfig::default().approval_sentinel().clone(),
            locks: SessionLocks::default(),
        }
    }

    /// Create a runner with process-local stores.
    pub fn in_memory(pipeline: Pipeline, illustrator: Illustrator) -> Self {
        Self::new(
            pipeline,
            illustrator,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        )
    }

    /// Build the standard pipeline from configuration, with in-memory stores.
    pub fn from_config(config: &FabulistConfig, collaborators: Collaborators) -> Self {
        Self::in_memory(
            Pipeline::illustrated_story(&config.review),
            Illustrator::from_config(collaborators, config),
        )
        .with_approval_sentinel(config.review.approval_sentinel().clone())
    }

    /// Replace the reply that counts as approval.
    pub fn with_approval_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// The pipeline this runner drives.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Current state of a session.
    pub async fn session_state(&self, session_key: &str) -> SessionState {
        self.sessions.get(session_key).await
    }

    /// The interrupt a suspended session is waiting on, if any.
    pub async fn pending_interrupt(
        &self,
        session_key: &str,
    ) -> FabulistResult<Option<InterruptContext>> {
        Ok(self
            .load_checkpoint(session_key)
            .await?
            .map(|checkpoint| checkpoint.interrupt().clone()))
    }

    /// Start or continue a session with `input`.
    ///
    /// For a fresh session `input` is the story theme. A completed session
    /// reports its video without calling any collaborator, and a suspended
    /// one is asked its pending interrupt again.
    pub fn query(
        &self,
        session_key: impl Into<String>,
        input: impl Into<String>,
        cancel: CancellationToken,
    ) -> EventStream {
        let session_key = session_key.into();
        let input = input.into();
        let span = info_span!("pipeline_run", session = %session_key, mode = "query");
        self.spawn(span, move |runner, sink| async move {
            let _guard = runner.locks.acquire(&session_key).await;
            let settled = runner
                .run_query(&session_key, &input, &sink, &cancel)
                .await;
            runner.finish(&session_key, settled, &sink).await;
        })
    }

    /// Resume the session's suspended run with targeted payloads.
    ///
    /// Params that do not target the pending interrupt leave the session
    /// untouched and yield the identical interrupt again.
    pub fn resume_with_params(
        &self,
        session_key: impl Into<String>,
        params: ResumeParams,
        cancel: CancellationToken,
    ) -> EventStream {
        let session_key = session_key.into();
        let span = info_span!("pipeline_run", session = %session_key, mode = "resume");
        self.spawn(span, move |runner, sink| async move {
            let _guard = runner.locks.acquire(&session_key).await;
            let settled = runner
                .run_resume(&session_key, &params, &sink, &cancel)
                .await;
            runner.finish(&session_key, settled, &sink).await;
        })
    }

    fn spawn<F, Fut>(&self, span: tracing::Span, task: F) -> EventStream
    where
        F: FnOnce(Runner, EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(task(self.clone(), EventSink::new(tx)).instrument(span));
        EventStream::new(rx)
    }

    async fn run_query(
        &self,
        session_key: &str,
        input: &str,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> FabulistResult<Settled> {
        let mut state = self.sessions.get(session_key).await;

        if *state.state() == StageName::Complete {
            let url = state.video_url().clone().ok_or_else(|| {
                FabulistError::from(ProtocolError::new(ProtocolErrorKind::MissingState(
                    "video url of a completed session".to_string(),
                )))
            })?;
            info!("Session already complete, reporting existing video");
            sink.emit(Event::Output(StageOutput::new(StageName::Complete, url)))
                .await;
            return Ok(Settled::Completed);
        }

        if let Some(checkpoint) = self.load_checkpoint(session_key).await? {
            info!(
                interrupt_id = %checkpoint.interrupt().id,
                "Session is suspended, asking again"
            );
            return Ok(Settled::Reasked(checkpoint.interrupt().clone()));
        }

        if *state.state() == StageName::Init {
            let theme = input.trim();
            if theme.is_empty() {
                return Err(
                    ProtocolError::new(ProtocolErrorKind::EmptyInput("story theme".to_string()))
                        .into(),
                );
            }
            state.begin(theme);
            self.sessions.save(session_key, state.clone()).await;
            info!(theme, "Session started");
        } else {
            debug!(stage = %state.state(), "Continuing session");
        }

        let mut ctx = self.context(session_key, &mut state, sink, cancel);
        let flow = self.pipeline.run(&mut ctx).await?;
        self.settle(flow)
    }

    async fn run_resume(
        &self,
        session_key: &str,
        params: &ResumeParams,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> FabulistResult<Settled> {
        let checkpoint = self.load_checkpoint(session_key).await?.ok_or_else(|| {
            FabulistError::from(ProtocolError::new(ProtocolErrorKind::NoSuspendedRun(
                session_key.to_string(),
            )))
        })?;
        if checkpoint.pipeline != *self.pipeline.name() || checkpoint.session_key != session_key {
            return Err(mismatch(format!(
                "checkpoint belongs to {}/{}, not {}/{}",
                checkpoint.pipeline,
                checkpoint.session_key,
                self.pipeline.name(),
                session_key
            )));
        }

        let mut state = self.sessions.get(session_key).await;
        let result = {
            let mut ctx = self.context(session_key, &mut state, sink, cancel);
            self.pipeline.resume(&mut ctx, &checkpoint.root, params).await
        };

        match result {
            Ok(Flow::Suspend(root)) if root == checkpoint.root => {
                Ok(Settled::Reasked(checkpoint.interrupt().clone()))
            }
            Ok(flow) => self.settle(flow),
            Err(e) => {
                // Progress past the suspended stage makes the marker stale;
                // a later query continues from the committed state.
                if *state.state() != checkpoint.interrupt().stage {
                    self.checkpoints.delete(session_key).await?;
                }
                Err(e)
            }
        }
    }

    fn context<'a>(
        &'a self,
        session_key: &'a str,
        state: &'a mut SessionState,
        sink: &'a EventSink,
        cancel: &'a CancellationToken,
    ) -> StageContext<'a> {
        StageContext {
            session_key,
            state,
            illustrator: &self.illustrator,
            sessions: self.sessions.as_ref(),
            events: sink,
            cancel,
            sentinel: &self.sentinel,
        }
    }

    fn settle(&self, flow: Flow) -> FabulistResult<Settled> {
        match flow {
            Flow::Continue(_) | Flow::Exit => Ok(Settled::Completed),
            Flow::Suspend(root) => Ok(Settled::Suspended(root)),
            Flow::BreakLoop => Err(PipelineError::new(PipelineErrorKind::InvalidTransition(
                format!("break_loop escaped pipeline {}", self.pipeline.name()),
            ))
            .into()),
        }
    }

    async fn load_checkpoint(&self, session_key: &str) -> FabulistResult<Option<Checkpoint>> {
        match self.checkpoints.get(session_key).await? {
            Some(bytes) => Ok(Some(Checkpoint::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist the outcome and emit the run's terminal event.
    async fn finish(
        &self,
        session_key: &str,
        settled: FabulistResult<Settled>,
        sink: &EventSink,
    ) {
        let event = match self.conclude(session_key, settled).await {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, category = ?e.category(), "Run failed");
                Event::Error(e)
            }
        };
        sink.emit(event).await;
    }

    async fn conclude(
        &self,
        session_key: &str,
        settled: FabulistResult<Settled>,
    ) -> FabulistResult<Event> {
        match settled? {
            Settled::Completed => {
                self.checkpoints.delete(session_key).await?;
                info!("Pipeline complete");
                Ok(Event::Action(ControlAction::Exit))
            }
            Settled::Suspended(root) => {
                let checkpoint = Checkpoint::new(self.pipeline.name().clone(), session_key, root);
                self.checkpoints
                    .set(session_key, checkpoint.to_bytes()?)
                    .await?;
                let interrupt = checkpoint.interrupt().clone();
                info!(interrupt_id = %interrupt.id, stage = %interrupt.stage, "Run suspended");
                Ok(Event::Interrupted(vec![interrupt]))
            }
            Settled::Reasked(interrupt) => {
                warn!(interrupt_id = %interrupt.id, "Pending interrupt was not resumed");
                Ok(Event::Interrupted(vec![interrupt]))
            }
        }
    }
}

/// Events of one run, ending with exactly one terminal event.
#[derive(Debug)]
pub struct EventStream {
    inner: ReceiverStream<Event>,
}

impl EventStream {
    fn new(rx: mpsc::Receiver<Event>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Next event, or `None` once the run has finished.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.inner.next().await
    }

    /// Consume events until the run settles.
    ///
    /// # Errors
    ///
    /// Returns the run's error event, or
    /// [`PipelineErrorKind::TaskAborted`] if the stream closes without a
    /// terminal event.
    pub async fn drain(self) -> FabulistResult<RunOutcome> {
        self.drain_with(|_| {}).await
    }

    /// Like [`EventStream::drain`], showing each event to `on_event` first.
    pub async fn drain_with<F>(mut self, mut on_event: F) -> FabulistResult<RunOutcome>
    where
        F: FnMut(&Event),
    {
        let mut outputs = Vec::new();
        while let Some(event) = self.next_event().await {
            on_event(&event);
            match event {
                Event::Output(output) => outputs.push(output),
                Event::Action(ControlAction::BreakLoop { stage }) => {
                    debug!(stage = %stage, "Loop exited");
                }
                Event::Action(ControlAction::Exit) => return Ok(RunOutcome::Completed { outputs }),
                Event::Interrupted(interrupts) => {
                    return Ok(RunOutcome::Interrupted {
                        interrupts,
                        outputs,
                    });
                }
                Event::Error(e) => return Err(e),
            }
        }
        Err(PipelineError::new(PipelineErrorKind::TaskAborted(
            "event stream closed before the run settled".to_string(),
        ))
        .into())
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Summary of a drained run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The pipeline exited successfully
    Completed {
        /// Stage outputs, in emission order
        outputs: Vec<StageOutput>,
    },
    /// The run suspended
    Interrupted {
        /// Interrupts awaiting input
        interrupts: Vec<InterruptContext>,
        /// Stage outputs produced before suspending
        outputs: Vec<StageOutput>,
    },
}

impl RunOutcome {
    /// Stage outputs produced during the run.
    pub fn outputs(&self) -> &[StageOutput] {
        match self {
            RunOutcome::Completed { outputs } | RunOutcome::Interrupted { outputs, .. } => outputs,
        }
    }

    /// The first pending interrupt, if the run suspended.
    pub fn interrupt(&self) -> Option<&InterruptContext> {
        match self {
            RunOutcome::Completed { .. } => None,
            RunOutcome::Interrupted { interrupts, .. } => interrupts.first(),
        }
    }

    /// Whether the pipeline exited successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}
