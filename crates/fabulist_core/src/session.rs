//! Per-session workflow state.

use crate::{Chapter, ImagePrompt, StageName, Story};
use derive_getters::Getters;
use fabulist_error::{ProtocolError, ProtocolErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a session has produced so far, plus where it stands.
///
/// Fields are private so the mutators can keep the invariants:
/// - every chapter index in `image_prompts` and `generated_images` is a
///   valid position in `story.chapters`;
/// - a revision flag is only set alongside non-empty feedback.
///
/// # Examples
///
/// ```
/// use fabulist_core::{SessionState, StageName};
///
/// let mut state = SessionState::default();
/// assert_eq!(*state.state(), StageName::Init);
///
/// state.begin("dinosaurs");
/// assert_eq!(*state.state(), StageName::StoryGenerate);
/// assert_eq!(state.story().theme, "dinosaurs");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct SessionState {
    /// Current stage
    #[serde(default)]
    state: StageName,
    /// Theme and chapters
    #[serde(default)]
    story: Story,
    /// One prompt per chapter once derived
    #[serde(default)]
    image_prompts: Vec<ImagePrompt>,
    /// Generated image references keyed by chapter index
    #[serde(default)]
    generated_images: BTreeMap<usize, Vec<String>>,
    /// Final video reference
    #[serde(default)]
    video_url: Option<String>,
    /// Reviewer asked for a story revision
    #[serde(default)]
    need_to_edit_story: bool,
    /// Reviewer's story feedback
    #[serde(default)]
    story_feedback: Option<String>,
    /// Reviewer asked for new illustrations
    #[serde(default)]
    need_to_edit_images: bool,
    /// Reviewer's illustration feedback
    #[serde(default)]
    image_feedback: Option<String>,
    /// Generator runs per review loop since that loop last approved
    #[serde(default)]
    loop_rounds: BTreeMap<String, u32>,
}

impl SessionState {
    /// Record the theme of a fresh session and move to story drafting.
    pub fn begin(&mut self, theme: impl Into<String>) {
        self.story.theme = theme.into();
        self.state = StageName::StoryGenerate;
    }

    /// Move to another stage.
    pub fn advance_to(&mut self, stage: StageName) {
        self.state = stage;
    }

    /// Replace the chapters, keeping the theme.
    ///
    /// Prompts and images derived from the old chapters are discarded.
    pub fn replace_chapters(&mut self, chapters: Vec<Chapter>) {
        self.story.chapters = chapters;
        self.image_prompts.clear();
        self.generated_images.clear();
    }

    /// Store the per-chapter illustration prompts.
    pub fn set_image_prompts(&mut self, prompts: Vec<ImagePrompt>) -> Result<(), ProtocolError> {
        for prompt in &prompts {
            self.check_chapter_index(prompt.chapter_index)?;
        }
        for prompt in &prompts {
            self.story.chapters[prompt.chapter_index].image_prompt = Some(prompt.prompt.clone());
        }
        self.image_prompts = prompts;
        Ok(())
    }

    /// Store the images generated for one chapter.
    pub fn set_chapter_images(
        &mut self,
        chapter_index: usize,
        images: Vec<String>,
    ) -> Result<(), ProtocolError> {
        self.check_chapter_index(chapter_index)?;
        self.story.chapters[chapter_index].image_url = images.first().cloned();
        self.generated_images.insert(chapter_index, images);
        Ok(())
    }

    /// Record the final video.
    pub fn set_video_url(&mut self, url: impl Into<String>) {
        self.video_url = Some(url.into());
    }

    /// Flag the story for revision with the reviewer's feedback.
    pub fn request_story_revision(&mut self, feedback: impl Into<String>) -> Result<(), ProtocolError> {
        let feedback = non_empty(feedback.into(), StageName::StoryReview)?;
        self.need_to_edit_story = true;
        self.story_feedback = Some(feedback);
        Ok(())
    }

    /// Clear the story revision flag and its feedback.
    pub fn approve_story(&mut self) {
        self.need_to_edit_story = false;
        self.story_feedback = None;
    }

    /// Flag the illustrations for revision with the reviewer's feedback.
    pub fn request_image_revision(&mut self, feedback: impl Into<String>) -> Result<(), ProtocolError> {
        let feedback = non_empty(feedback.into(), StageName::ImageReview)?;
        self.need_to_edit_images = true;
        self.image_feedback = Some(feedback);
        Ok(())
    }

    /// Clear the illustration revision flag and its feedback.
    pub fn approve_images(&mut self) {
        self.need_to_edit_images = false;
        self.image_feedback = None;
    }

    /// Story feedback, only while a revision is pending.
    pub fn pending_story_feedback(&self) -> Option<&str> {
        self.story_feedback
            .as_deref()
            .filter(|_| self.need_to_edit_story)
    }

    /// Illustration feedback, only while a revision is pending.
    pub fn pending_image_feedback(&self) -> Option<&str> {
        self.image_feedback
            .as_deref()
            .filter(|_| self.need_to_edit_images)
    }

    /// Generator runs the named loop has made since it last approved.
    pub fn loop_round(&self, loop_name: &str) -> u32 {
        self.loop_rounds.get(loop_name).copied().unwrap_or(0)
    }

    /// Count one more generator run for the named loop and return the total.
    pub fn record_loop_round(&mut self, loop_name: &str) -> u32 {
        let rounds = self.loop_rounds.entry(loop_name.to_string()).or_default();
        *rounds += 1;
        *rounds
    }

    /// Forget the named loop's rounds once it approves.
    pub fn reset_loop_rounds(&mut self, loop_name: &str) {
        self.loop_rounds.remove(loop_name);
    }

    /// Every generated image in ascending chapter order.
    pub fn images_in_chapter_order(&self) -> Vec<String> {
        self.generated_images.values().flatten().cloned().collect()
    }

    /// Whether every chapter has at least one generated image.
    pub fn all_chapters_illustrated(&self) -> bool {
        !self.story.chapters.is_empty()
            && (0..self.story.chapters.len()).all(|i| {
                self.generated_images
                    .get(&i)
                    .is_some_and(|images| !images.is_empty())
            })
    }

    /// Check the invariants of a state obtained from outside the mutators.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for prompt in &self.image_prompts {
            self.check_chapter_index(prompt.chapter_index)?;
        }
        for index in self.generated_images.keys() {
            self.check_chapter_index(*index)?;
        }
        if self.need_to_edit_story && self.pending_story_feedback().is_none_or(str::is_empty) {
            return Err(ProtocolError::new(ProtocolErrorKind::EmptyFeedback(
                StageName::StoryReview.to_string(),
            )));
        }
        if self.need_to_edit_images && self.pending_image_feedback().is_none_or(str::is_empty) {
            return Err(ProtocolError::new(ProtocolErrorKind::EmptyFeedback(
                StageName::ImageReview.to_string(),
            )));
        }
        Ok(())
    }

    fn check_chapter_index(&self, index: usize) -> Result<(), ProtocolError> {
        if index < self.story.chapters.len() {
            Ok(())
        } else {
            Err(ProtocolError::new(ProtocolErrorKind::MissingState(format!(
                "chapter {} does not exist (story has {} chapters)",
                index,
                self.story.chapters.len()
            ))))
        }
    }
}

fn non_empty(feedback: String, stage: StageName) -> Result<String, ProtocolError> {
    let trimmed = feedback.trim();
    if trimmed.is_empty() {
        Err(ProtocolError::new(ProtocolErrorKind::EmptyFeedback(
            stage.to_string(),
        )))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_chapter_state() -> SessionState {
        let mut state = SessionState::default();
        state.begin("dinosaurs");
        state.replace_chapters(vec![
            Chapter::new("One", "first"),
            Chapter::new("Two", "second"),
            Chapter::new("Three", "third"),
        ]);
        state
    }

    #[test]
    fn test_default_is_init_and_empty() {
        let state = SessionState::default();
        assert_eq!(*state.state(), StageName::Init);
        assert!(state.story().is_empty());
        assert!(state.image_prompts().is_empty());
        assert!(state.generated_images().is_empty());
        assert!(state.video_url().is_none());
        assert!(!*state.need_to_edit_story());
        assert!(!*state.need_to_edit_images());
    }

    #[test]
    fn test_prompt_for_missing_chapter_is_rejected() {
        let mut state = three_chapter_state();
        let err = state
            .set_image_prompts(vec![ImagePrompt {
                chapter_index: 3,
                prompt: "out of range".into(),
            }])
            .unwrap_err();
        assert!(matches!(err.kind, ProtocolErrorKind::MissingState(_)));
        assert!(state.image_prompts().is_empty());
    }

    #[test]
    fn test_images_for_missing_chapter_are_rejected() {
        let mut state = three_chapter_state();
        assert!(state.set_chapter_images(7, vec!["x".into()]).is_err());
        assert!(state.generated_images().is_empty());
    }

    #[test]
    fn test_chapter_images_mirror_first_url() {
        let mut state = three_chapter_state();
        state
            .set_chapter_images(1, vec!["a".into(), "b".into()])
            .unwrap();
        assert_eq!(state.story().chapters[1].image_url.as_deref(), Some("a"));
        assert!(!state.all_chapters_illustrated());
    }

    #[test]
    fn test_replace_chapters_drops_derived_media() {
        let mut state = three_chapter_state();
        state.set_chapter_images(2, vec!["c".into()]).unwrap();
        state.replace_chapters(vec![Chapter::new("Only", "one")]);
        assert!(state.generated_images().is_empty());
        assert_eq!(state.story().theme, "dinosaurs");
        state.validate().unwrap();
    }

    #[test]
    fn test_revision_requires_feedback() {
        let mut state = three_chapter_state();
        let err = state.request_story_revision("   ").unwrap_err();
        assert!(matches!(err.kind, ProtocolErrorKind::EmptyFeedback(_)));
        assert!(!*state.need_to_edit_story());

        state.request_story_revision(" scarier ").unwrap();
        assert!(*state.need_to_edit_story());
        assert_eq!(state.pending_story_feedback(), Some("scarier"));

        state.approve_story();
        assert!(!*state.need_to_edit_story());
        assert!(state.pending_story_feedback().is_none());
    }

    #[test]
    fn test_images_in_chapter_order() {
        let mut state = three_chapter_state();
        state.set_chapter_images(2, vec!["c".into()]).unwrap();
        state.set_chapter_images(0, vec!["a1".into(), "a2".into()]).unwrap();
        state.set_chapter_images(1, vec!["b".into()]).unwrap();
        assert_eq!(state.images_in_chapter_order(), vec!["a1", "a2", "b", "c"]);
        assert!(state.all_chapters_illustrated());
    }

    #[test]
    fn test_loop_rounds_are_counted_per_loop() {
        let mut state = three_chapter_state();
        assert_eq!(state.loop_round("story_loop"), 0);
        assert_eq!(state.record_loop_round("story_loop"), 1);
        assert_eq!(state.record_loop_round("story_loop"), 2);
        assert_eq!(state.record_loop_round("image_loop"), 1);

        let restored: SessionState = serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(restored.loop_round("story_loop"), 2);

        state.reset_loop_rounds("story_loop");
        assert_eq!(state.loop_round("story_loop"), 0);
        assert_eq!(state.loop_round("image_loop"), 1);
    }

    #[test]
    fn test_validate_rejects_inconsistent_json() {
        let state: SessionState = serde_json::from_str(
            r#"{"state": "image_review", "generated_images": {"4": ["x"]}}"#,
        )
        .unwrap();
        assert!(state.validate().is_err());
    }
}
