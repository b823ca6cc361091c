//! Story content types.

use serde::{Deserialize, Serialize};

/// One chapter of a story, with its illustration once one exists.
///
/// Model replies name the fields either `title`/`content` or
/// `chapter_title`/`chapter_body`; both spellings deserialize.
///
/// # Examples
///
/// ```
/// use fabulist_core::Chapter;
///
/// let chapter: Chapter = serde_json::from_str(
///     r#"{"chapter_title": "The Egg", "chapter_body": "A crack appeared."}"#,
/// ).unwrap();
/// assert_eq!(chapter.title, "The Egg");
/// assert!(chapter.image_url.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter heading
    #[serde(alias = "chapter_title")]
    pub title: String,
    /// Chapter body text
    #[serde(alias = "chapter_body", alias = "body")]
    pub content: String,
    /// Illustration prompt derived for this chapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    /// First illustration generated for this chapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Chapter {
    /// Create a chapter with no illustration yet.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_prompt: None,
            image_url: None,
        }
    }
}

/// A themed story made of ordered chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Story {
    /// Theme the story was written for
    #[serde(default)]
    pub theme: String,
    /// Chapters in reading order
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Story {
    /// Render the chapters as numbered plain text.
    ///
    /// ```
    /// use fabulist_core::{Chapter, Story};
    ///
    /// let story = Story {
    ///     theme: "dinosaurs".into(),
    ///     chapters: vec![Chapter::new("Hatching", "A crack appeared.")],
    /// };
    /// assert_eq!(story.render(), "Chapter 1: Hatching\nA crack appeared.\n");
    /// ```
    pub fn render(&self) -> String {
        self.chapters
            .iter()
            .enumerate()
            .map(|(i, chapter)| format!("Chapter {}: {}\n{}\n", i + 1, chapter.title, chapter.content))
            .collect()
    }

    /// Whether any chapters have been written.
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

/// The illustration prompt for one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImagePrompt {
    /// Zero-based index into the story's chapters
    pub chapter_index: usize,
    /// Prompt text sent to the image collaborator
    pub prompt: String,
}
