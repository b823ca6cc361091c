//! Test utilities for Fabulist pipeline tests.
//!
//! This module provides mock collaborators and runner helpers.

pub mod mock_studio;

#[allow(unused_imports)]
pub use mock_studio::{MockChat, MockImages, MockVideo, Studio};

use fabulist_core::{ReviewConfig, VideoConfig};
use fabulist_pipeline::{Illustrator, Pipeline, RunOutcome, Runner};

/// A three-chapter story reply, wrapped in prose the way models answer.
pub fn story_reply(tag: &str) -> String {
    format!(
        r#"Here is your story:
```json
{{"chapters": [
  {{"chapter_title": "The Egg {tag}", "chapter_body": "A speckled egg wobbled in the fern."}},
  {{"chapter_title": "The Hatchling {tag}", "chapter_body": "A tiny triceratops poked out."}},
  {{"chapter_title": "The Herd {tag}", "chapter_body": "The herd welcomed her home."}}
]}}
```"#
    )
}

/// Video settings that poll without waiting.
pub fn fast_video(poll_attempts: u32) -> VideoConfig {
    VideoConfig::default()
        .with_poll_attempts(poll_attempts)
        .with_poll_interval_secs(0)
}

/// Runner over the standard pipeline with in-memory stores.
pub fn runner(studio: &Studio) -> Runner {
    runner_with_review(studio, ReviewConfig::default())
}

/// Runner with custom review settings.
pub fn runner_with_review(studio: &Studio, review: ReviewConfig) -> Runner {
    let illustrator = Illustrator::new(studio.collaborators()).with_video_config(fast_video(5));
    Runner::in_memory(Pipeline::illustrated_story(&review), illustrator)
        .with_approval_sentinel(review.approval_sentinel().clone())
}

/// Identifier of the interrupt an outcome is waiting on.
pub fn interrupt_id(outcome: &RunOutcome) -> String {
    outcome
        .interrupt()
        .expect("run should be suspended")
        .id
        .clone()
}
