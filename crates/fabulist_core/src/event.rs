//! Events emitted by a running pipeline.

use crate::{InterruptContext, StageName};
use fabulist_error::FabulistError;
use serde::{Deserialize, Serialize};

/// Content produced by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Stage that produced the content
    pub stage: StageName,
    /// Text shown to the host (a summary, feedback, or a reference)
    pub content: String,
}

impl StageOutput {
    /// Create a stage output.
    pub fn new(stage: StageName, content: impl Into<String>) -> Self {
        Self {
            stage,
            content: content.into(),
        }
    }
}

/// Control-flow requests a stage can make of its enclosing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum ControlAction {
    /// Terminate the loop directly enclosing the emitting review stage
    #[display("break_loop({})", stage)]
    BreakLoop {
        /// Review stage that approved
        stage: StageName,
    },
    /// Terminate the whole pipeline successfully
    #[display("exit")]
    Exit,
}

/// The unit a runner consumes from a running pipeline.
#[derive(Debug, Clone)]
pub enum Event {
    /// A stage produced content
    Output(StageOutput),
    /// A stage failed; the run stops here
    Error(FabulistError),
    /// The run is suspended awaiting input for these interrupts
    Interrupted(Vec<InterruptContext>),
    /// A control-flow request
    Action(ControlAction),
}

impl Event {
    /// Whether this event ends the current run (exit, error, or suspension).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Error(_) | Event::Interrupted(_) | Event::Action(ControlAction::Exit)
        )
    }
}
