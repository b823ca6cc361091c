//! Suspension points and the payloads that resume them.

use crate::StageName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One suspension point awaiting external input.
///
/// The identifier is unique within a run; resuming routes payloads by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterruptContext {
    /// Opaque identifier used to target this interrupt on resume
    pub id: String,
    /// Human-readable prompt shown to the reviewer
    pub info: String,
    /// Stage that suspended
    pub stage: StageName,
}

impl InterruptContext {
    /// Create an interrupt with a fresh identifier.
    ///
    /// ```
    /// use fabulist_core::{InterruptContext, StageName};
    ///
    /// let a = InterruptContext::new("Review the story", StageName::StoryReview);
    /// let b = InterruptContext::new("Review the story", StageName::StoryReview);
    /// assert_ne!(a.id, b.id);
    /// ```
    pub fn new(info: impl Into<String>, stage: StageName) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            info: info.into(),
            stage,
        }
    }
}

/// Resume payloads keyed by the interrupt they target.
///
/// # Examples
///
/// ```
/// use fabulist_core::ResumeParams;
///
/// let params = ResumeParams::feedback("int-1", "make chapter 2 scarier");
/// assert!(params.is_target("int-1"));
/// assert!(!params.is_target("int-2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeParams {
    /// Payload per interrupt identifier
    pub targets: HashMap<String, serde_json::Value>,
}

impl ResumeParams {
    /// Create an empty set of targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a single interrupt with a plain-text reply.
    pub fn feedback(interrupt_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new().with_target(interrupt_id, serde_json::Value::String(text.into()))
    }

    /// Add a payload for an interrupt.
    pub fn with_target(mut self, interrupt_id: impl Into<String>, payload: serde_json::Value) -> Self {
        self.targets.insert(interrupt_id.into(), payload);
        self
    }

    /// Whether the interrupt is explicitly addressed by these params.
    pub fn is_target(&self, interrupt_id: &str) -> bool {
        self.targets.contains_key(interrupt_id)
    }

    /// Payload addressed to the interrupt, if any.
    pub fn payload(&self, interrupt_id: &str) -> Option<&serde_json::Value> {
        self.targets.get(interrupt_id)
    }
}
