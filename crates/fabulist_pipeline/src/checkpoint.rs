//! Serializable continuation markers for suspended runs.
//!
//! A checkpoint records, for each level of the composed pipeline, which
//! member was executing when the run suspended, down to the interrupt the
//! suspended stage is waiting on. Resuming walks the same path.

use chrono::{DateTime, Utc};
use fabulist_core::{InterruptContext, StageName};
use fabulist_error::{FabulistResult, JsonError};
use serde::{Deserialize, Serialize};

/// Which half of a review loop suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum LoopMember {
    /// The generator stage
    #[display("generator")]
    Generator,
    /// The review stage
    #[display("review")]
    Review,
}

/// Position of a suspension inside one level of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeCheckpoint {
    /// Suspended inside the sequence member at `index`
    Sequence {
        /// Member position
        index: usize,
        /// Where inside that member
        inner: Box<NodeCheckpoint>,
    },
    /// Suspended inside a review loop
    Loop {
        /// Generator runs completed so far
        iteration: u32,
        /// Which member suspended
        member: LoopMember,
        /// Where inside that member
        inner: Box<NodeCheckpoint>,
    },
    /// A stage waiting on an interrupt
    Stage {
        /// Stage that suspended
        stage: StageName,
        /// The interrupt it is waiting on
        interrupt: InterruptContext,
    },
}

impl NodeCheckpoint {
    /// The interrupt at the leaf of this path.
    pub fn interrupt(&self) -> &InterruptContext {
        match self {
            NodeCheckpoint::Sequence { inner, .. } | NodeCheckpoint::Loop { inner, .. } => {
                inner.interrupt()
            }
            NodeCheckpoint::Stage { interrupt, .. } => interrupt,
        }
    }
}

/// A suspended run, persisted per session.
///
/// # Examples
///
/// ```
/// use fabulist_core::{InterruptContext, StageName};
/// use fabulist_pipeline::{Checkpoint, NodeCheckpoint};
///
/// let interrupt = InterruptContext::new("Review the story", StageName::StoryReview);
/// let checkpoint = Checkpoint::new(
///     "illustrated_story",
///     "session-1",
///     NodeCheckpoint::Stage { stage: StageName::StoryReview, interrupt: interrupt.clone() },
/// );
///
/// let bytes = checkpoint.to_bytes().unwrap();
/// let restored = Checkpoint::from_bytes(&bytes).unwrap();
/// assert_eq!(restored.interrupt(), &interrupt);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Name of the pipeline the marker belongs to
    pub pipeline: String,
    /// Session that suspended
    pub session_key: String,
    /// Path to the suspended stage
    pub root: NodeCheckpoint,
    /// When the run suspended
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint stamped with the current time.
    pub fn new(pipeline: impl Into<String>, session_key: impl Into<String>, root: NodeCheckpoint) -> Self {
        Self {
            pipeline: pipeline.into(),
            session_key: session_key.into(),
            root,
            created_at: Utc::now(),
        }
    }

    /// The interrupt the run is waiting on.
    pub fn interrupt(&self) -> &InterruptContext {
        self.root.interrupt()
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> FabulistResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| JsonError::new(format!("Failed to serialize checkpoint: {}", e)).into())
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> FabulistResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| JsonError::new(format!("Failed to deserialize checkpoint: {}", e)).into())
    }
}
