//! Instructions and prompt text sent to the chat and video collaborators.

use fabulist_core::{Chapter, Story, StoryConfig};

/// System instruction for drafting or revising a story.
pub fn story_instruction(story: &StoryConfig) -> String {
    format!(
        "You are a children's story writer. Write a story of {} to {} chapters on the \
         user's theme. If the user sends feedback on a previous version, revise that \
         version accordingly. Respond with valid JSON only, in the form \
         {{\"chapters\": [{{\"chapter_title\": \"...\", \"chapter_body\": \"...\"}}]}}",
        story.min_chapters(),
        story.max_chapters()
    )
}

/// User message for a first draft.
pub fn story_request(theme: &str) -> String {
    format!("Theme: {}", theme)
}

/// User message asking for a revision of an existing story.
///
/// The previous story is embedded as JSON so the model edits it rather
/// than starting over.
pub fn story_revision_request(story: &Story, feedback: &str) -> String {
    let previous = serde_json::to_string_pretty(&story.chapters).unwrap_or_else(|_| story.render());
    format!(
        "Theme: {}\n\nRevise the following story based on this feedback: '{}'.\n\nStory:\n{}",
        story.theme, feedback, previous
    )
}

/// System instruction for turning a chapter into an illustration prompt.
pub const IMAGE_PROMPT_INSTRUCTION: &str = "You are a professional illustration prompt writer. \
     Given a chapter of a children's story, write one detailed English image-generation \
     prompt that depicts it. Output only the prompt, with no extra commentary.";

/// User message carrying one chapter.
pub fn image_prompt_request(chapter: &Chapter) -> String {
    format!("{}\n\n{}", chapter.title, chapter.content)
}

/// Illustration prompt adjusted by reviewer feedback.
pub fn revised_image_prompt(prompt: &str, feedback: &str) -> String {
    format!("{}\n{}", prompt, feedback)
}

/// Prompt for the video collaborator, built from the theme and every chapter.
///
/// ```
/// use fabulist_core::{Chapter, Story};
/// use fabulist_pipeline::video_prompt;
///
/// let story = Story {
///     theme: "dinosaurs".into(),
///     chapters: vec![Chapter::new("Egg", "It wobbled.")],
/// };
/// let prompt = video_prompt(&story);
/// assert!(prompt.contains("dinosaurs"));
/// assert!(prompt.contains("Chapter 1: Egg\nIt wobbled."));
/// ```
pub fn video_prompt(story: &Story) -> String {
    let mut prompt = format!(
        "Create a short animated video for a children's story about {}. \
         Keep the characters consistent with the reference images.\n\n",
        story.theme
    );
    prompt.push_str(&story.render());
    prompt
}
