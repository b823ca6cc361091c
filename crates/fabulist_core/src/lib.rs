//! Core data types for the Fabulist illustrated-story pipeline.
//!
//! This crate holds the data model shared by every other Fabulist crate:
//! the per-session workflow state, the story itself, and the transient
//! values (interrupts, resume payloads, events) that flow between the
//! pipeline and its host.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod event;
mod interrupt;
mod session;
mod stage_name;
mod story;

pub use config::{ArkConfig, FabulistConfig, ImageConfig, ReviewConfig, StoryConfig, VideoConfig};
pub use event::{ControlAction, Event, StageOutput};
pub use interrupt::{InterruptContext, ResumeParams};
pub use session::SessionState;
pub use stage_name::StageName;
pub use story::{Chapter, ImagePrompt, Story};
