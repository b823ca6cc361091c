//! Stage name enumeration.

use fabulist_error::{ParseError, ParseErrorKind};
use serde::{Deserialize, Serialize};

/// Every position the workflow state machine can occupy.
///
/// `StoryReview` and `ImageReview` are the only branching nodes; every
/// other stage has a single unconditional successor.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Fresh session, nothing generated yet
    #[default]
    #[display("init")]
    Init,
    /// Drafting or revising the story
    #[display("story_generate")]
    StoryGenerate,
    /// Waiting for the reviewer to approve the story
    #[display("story_review")]
    StoryReview,
    /// Deriving one illustration prompt per chapter
    #[display("image_prompt")]
    ImagePrompt,
    /// Rendering or re-rendering illustrations
    #[display("image_generate")]
    ImageGenerate,
    /// Waiting for the reviewer to approve the illustrations
    #[display("image_review")]
    ImageReview,
    /// Rendering the final video
    #[display("video_generate")]
    VideoGenerate,
    /// Terminal: the video exists
    #[display("complete")]
    Complete,
}

impl StageName {
    /// Convert to the wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Init => "init",
            StageName::StoryGenerate => "story_generate",
            StageName::StoryReview => "story_review",
            StageName::ImagePrompt => "image_prompt",
            StageName::ImageGenerate => "image_generate",
            StageName::ImageReview => "image_review",
            StageName::VideoGenerate => "video_generate",
            StageName::Complete => "complete",
        }
    }

    /// The stage reached by the unconditional edge leaving this one.
    ///
    /// Review stages return their approval successor; the revise edge back
    /// to the paired generator is [`StageName::revision_target`].
    ///
    /// ```
    /// use fabulist_core::StageName;
    ///
    /// assert_eq!(StageName::StoryReview.successor(), Some(StageName::ImagePrompt));
    /// assert_eq!(StageName::Complete.successor(), None);
    /// ```
    pub fn successor(&self) -> Option<StageName> {
        match self {
            StageName::Init => Some(StageName::StoryGenerate),
            StageName::StoryGenerate => Some(StageName::StoryReview),
            StageName::StoryReview => Some(StageName::ImagePrompt),
            StageName::ImagePrompt => Some(StageName::ImageGenerate),
            StageName::ImageGenerate => Some(StageName::ImageReview),
            StageName::ImageReview => Some(StageName::VideoGenerate),
            StageName::VideoGenerate => Some(StageName::Complete),
            StageName::Complete => None,
        }
    }

    /// The generator a review stage sends work back to on revision.
    pub fn revision_target(&self) -> Option<StageName> {
        match self {
            StageName::StoryReview => Some(StageName::StoryGenerate),
            StageName::ImageReview => Some(StageName::ImageGenerate),
            _ => None,
        }
    }

    /// Whether this stage gates progress on external input.
    pub fn is_review(&self) -> bool {
        matches!(self, StageName::StoryReview | StageName::ImageReview)
    }

    /// Whether this is the terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageName::Complete)
    }
}

impl std::str::FromStr for StageName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(StageName::Init),
            "story_generate" => Ok(StageName::StoryGenerate),
            "story_review" => Ok(StageName::StoryReview),
            "image_prompt" => Ok(StageName::ImagePrompt),
            "image_generate" => Ok(StageName::ImageGenerate),
            "image_review" => Ok(StageName::ImageReview),
            "video_generate" => Ok(StageName::VideoGenerate),
            "complete" => Ok(StageName::Complete),
            _ => Err(ParseError::new(ParseErrorKind::InvalidStageName(
                s.to_string(),
            ))),
        }
    }
}
