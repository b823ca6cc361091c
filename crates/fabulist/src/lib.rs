//! Fabulist: turn a theme into an illustrated story and a short video,
//! with a human reviewing the story and the illustrations on the way.
//!
//! This crate re-exports the workspace crates and wires collaborators from
//! configuration.
//!
//! # Architecture
//!
//! - `fabulist_error` - Error types
//! - `fabulist_core` - Session state, events, interrupts and configuration
//! - `fabulist_interface` - Store and collaborator traits
//! - `fabulist_models` - Ark clients and offline mocks
//! - `fabulist_pipeline` - Stages, review loops, the runner and the agent
//!
//! # Quick Start
//!
//! ```no_run
//! use fabulist::{FabulistConfig, ResumeParams, Runner, collaborators};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FabulistConfig::load()?;
//! let runner = Runner::from_config(&config, collaborators(&config)?);
//!
//! let mut outcome = runner
//!     .query("demo", "a lost dinosaur", CancellationToken::new())
//!     .drain()
//!     .await?;
//! while let Some(interrupt) = outcome.interrupt().cloned() {
//!     println!("{}", interrupt.info);
//!     outcome = runner
//!         .resume_with_params("demo", ResumeParams::feedback(interrupt.id, "ok"), CancellationToken::new())
//!         .drain()
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod observability;

pub use fabulist_core::*;
pub use fabulist_error::*;
pub use fabulist_interface::*;
pub use fabulist_models::*;
pub use fabulist_pipeline::*;
pub use observability::{ObservabilityConfig, init_observability, init_observability_with_config};

use std::sync::Arc;

/// Build the chat, image and video collaborators the config asks for.
///
/// With `ark.mock` set every role is served by [`MockStudio`]; otherwise a
/// single [`ArkClient`] serves all three.
///
/// # Errors
///
/// Fails if the Ark client cannot be created, e.g. without an API key.
pub fn collaborators(config: &FabulistConfig) -> FabulistResult<Collaborators> {
    if *config.ark.mock() {
        let studio = Arc::new(MockStudio::new(config.story));
        return Ok(Collaborators::new(studio.clone(), studio.clone(), studio));
    }
    let client = Arc::new(ArkClient::new(config.ark.clone())?);
    tracing::info!(base_url = %config.ark.base_url(), "Using Ark collaborators");
    Ok(Collaborators::new(client.clone(), client.clone(), client))
}
