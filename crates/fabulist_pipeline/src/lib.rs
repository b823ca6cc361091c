//! Interruptible story → illustrations → video workflow engine.
//!
//! A [`Pipeline`] is composed from [`Stage`]s and review
//! [`LoopController`]s. A [`Runner`] executes it per session: generator
//! stages call the [`Collaborators`], review stages suspend the run with an
//! interrupt, and [`Runner::resume_with_params`] continues it once the
//! reviewer replies.
//!
//! # Example
//!
//! ```no_run
//! use fabulist_core::{Event, FabulistConfig, ResumeParams};
//! use fabulist_pipeline::{Collaborators, Runner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
//! let config = FabulistConfig::load()?;
//! let runner = Runner::from_config(&config, collaborators);
//!
//! let outcome = runner
//!     .query("session-1", "dinosaurs", CancellationToken::new())
//!     .drain()
//!     .await?;
//! if let Some(interrupt) = outcome.interrupt() {
//!     println!("{}", interrupt.info);
//!     let params = ResumeParams::feedback(interrupt.id.clone(), "ok");
//!     runner
//!         .resume_with_params("session-1", params, CancellationToken::new())
//!         .drain()
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod checkpoint;
mod composer;
mod extraction;
mod illustrator;
mod prompts;
mod review;
mod runner;
mod stage;
mod store;

pub use agent::{AgentReply, IllustrationAgent};
pub use checkpoint::{Checkpoint, LoopMember, NodeCheckpoint};
pub use composer::{LoopController, Member, Pipeline};
pub use extraction::{extract_json, parse_json, parse_story};
pub use illustrator::{Collaborators, Illustrator};
pub use prompts::{
    IMAGE_PROMPT_INSTRUCTION, image_prompt_request, revised_image_prompt, story_instruction,
    story_request, story_revision_request, video_prompt,
};
pub use review::{ReviewDecision, review_prompt};
pub use runner::{EventStream, RunOutcome, Runner};
pub use stage::Stage;
pub use store::{InMemoryCheckpointStore, InMemorySessionStore};
