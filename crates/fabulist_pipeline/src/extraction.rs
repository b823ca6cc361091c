//! Extracting structured story data from model replies.
//!
//! Chat models wrap JSON in markdown fences or surround it with prose. The
//! helpers here locate the JSON, decode it, and check the story's shape so
//! malformed replies surface as [`ParseError`]s rather than collaborator
//! failures.

use fabulist_core::Chapter;
use fabulist_error::{FabulistResult, ParseError, ParseErrorKind};
use serde::Deserialize;

/// Extract JSON from a response that may contain markdown or extra text.
///
/// Tries, in order: a fenced code block, then the first balanced object or
/// array (whichever opens first).
///
/// # Examples
///
/// ```
/// use fabulist_pipeline::extract_json;
///
/// let reply = "Here you go:\n```json\n{\"chapters\": []}\n```\nEnjoy!";
/// assert_eq!(extract_json(reply).unwrap(), "{\"chapters\": []}");
/// ```
pub fn extract_json(response: &str) -> FabulistResult<String> {
    if let Some(json) = extract_from_code_block(response) {
        return Ok(json);
    }

    let bracket_pos = response.find('[');
    let brace_pos = response.find('{');

    let found = match (bracket_pos, brace_pos) {
        (Some(b_pos), Some(c_pos)) if b_pos < c_pos => {
            extract_balanced(response, '[', ']').or_else(|| extract_balanced(response, '{', '}'))
        }
        (Some(_), None) => extract_balanced(response, '[', ']'),
        _ => extract_balanced(response, '{', '}').or_else(|| extract_balanced(response, '[', ']')),
    };

    found.ok_or_else(|| {
        tracing::error!(response_length = response.len(), "No JSON found in model reply");
        ParseError::new(ParseErrorKind::NoJson(response.len())).into()
    })
}

/// Extract content from a markdown code block, with or without a language tag.
fn extract_from_code_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let after_fence = start + 3;
    // Skip the language tag, if any
    let content_start = response[after_fence..]
        .find('\n')
        .map(|n| after_fence + n + 1)
        .unwrap_or(after_fence);

    let content = match response[content_start..].find("```") {
        Some(end) => &response[content_start..content_start + end],
        // Unclosed fence: the reply was probably truncated
        None => &response[content_start..],
    };
    let content = content.trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// Extract content between balanced delimiters, ignoring delimiters in strings.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(response[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Decode JSON into `T`, reporting failures as [`ParseErrorKind::InvalidJson`].
pub fn parse_json<T>(json_str: &str) -> FabulistResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(json_str).map_err(|e| {
        let preview = json_str.chars().take(100).collect::<String>();
        tracing::error!(error = %e, json_preview = %preview, "JSON parsing failed");
        ParseError::new(ParseErrorKind::InvalidJson(format!("{} (JSON: {}...)", e, preview))).into()
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoryReply {
    Wrapped { chapters: Vec<Chapter> },
    Bare(Vec<Chapter>),
}

/// Parse a model reply into chapters and check the chapter count.
///
/// # Errors
///
/// Returns a [`ParseError`] if no JSON is present, the JSON does not
/// describe chapters, a chapter is blank, or the count falls outside
/// `min..=max`.
///
/// # Examples
///
/// ```
/// use fabulist_pipeline::parse_story;
///
/// let reply = r#"```json
/// {"chapters": [
///   {"chapter_title": "Egg", "chapter_body": "It wobbled."},
///   {"title": "Hatch", "content": "Crack!"},
///   {"title": "Roar", "content": "A tiny roar."}
/// ]}
/// ```"#;
/// let chapters = parse_story(reply, 3, 5).unwrap();
/// assert_eq!(chapters[1].title, "Hatch");
/// ```
pub fn parse_story(response: &str, min: usize, max: usize) -> FabulistResult<Vec<Chapter>> {
    let json = extract_json(response)?;
    let chapters = match parse_json::<StoryReply>(&json)? {
        StoryReply::Wrapped { chapters } | StoryReply::Bare(chapters) => chapters,
    };

    for (i, chapter) in chapters.iter().enumerate() {
        if chapter.title.trim().is_empty() {
            return Err(ParseError::new(ParseErrorKind::MissingField(format!(
                "title of chapter {}",
                i + 1
            )))
            .into());
        }
        if chapter.content.trim().is_empty() {
            return Err(ParseError::new(ParseErrorKind::MissingField(format!(
                "content of chapter {}",
                i + 1
            )))
            .into());
        }
    }

    if chapters.len() < min || chapters.len() > max {
        return Err(ParseError::new(ParseErrorKind::ChapterCount {
            expected_min: min,
            expected_max: max,
            actual: chapters.len(),
        })
        .into());
    }

    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabulist_error::FabulistErrorKind;

    fn parse_kind(result: FabulistResult<Vec<Chapter>>) -> ParseErrorKind {
        match result.unwrap_err().kind() {
            FabulistErrorKind::Parse(e) => e.kind.clone(),
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn test_extract_json_balanced_braces() {
        let response = r#"Sure! Here it is: {"id": 456, "nested": {"value": "test"}} thanks"#;
        let json = extract_json(response).unwrap();
        assert_eq!(json, r#"{"id": 456, "nested": {"value": "test"}}"#);
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let response = r#"{"text": "a } inside \"quotes\"", "n": 1}"#;
        let json = extract_json(response).unwrap();
        assert_eq!(json, response);
    }

    #[test]
    fn test_extract_json_prefers_array_when_first() {
        let response = "Items: [{\"id\": 1}, {\"id\": 2}]";
        assert!(extract_json(response).unwrap().starts_with('['));
    }

    #[test]
    fn test_unfenced_code_block_without_language() {
        let response = "```\n{\"chapters\": []}\n```";
        assert_eq!(extract_json(response).unwrap(), "{\"chapters\": []}");
    }

    #[test]
    fn test_no_json_is_parse_error() {
        let kind = parse_kind(parse_story("Once upon a time there was no JSON.", 3, 5));
        assert_eq!(kind, ParseErrorKind::NoJson(35));
    }

    #[test]
    fn test_bare_array_is_accepted() {
        let reply = r#"[{"title": "A", "content": "a"}, {"title": "B", "content": "b"}]"#;
        let chapters = parse_story(reply, 1, 5).unwrap();
        assert_eq!(chapters.len(), 2);
    }

    #[test]
    fn test_chapter_count_out_of_range() {
        let reply = r#"{"chapters": [{"title": "A", "content": "a"}]}"#;
        let kind = parse_kind(parse_story(reply, 3, 5));
        assert_eq!(
            kind,
            ParseErrorKind::ChapterCount {
                expected_min: 3,
                expected_max: 5,
                actual: 1
            }
        );
    }

    #[test]
    fn test_blank_chapter_body_is_missing_field() {
        let reply = r#"{"chapters": [{"title": "A", "content": "  "}]}"#;
        let kind = parse_kind(parse_story(reply, 1, 5));
        assert_eq!(kind, ParseErrorKind::MissingField("content of chapter 1".into()));
    }

    #[test]
    fn test_wrong_shape_is_invalid_json() {
        let reply = r#"{"story": "just text"}"#;
        let kind = parse_kind(parse_story(reply, 1, 5));
        assert!(matches!(kind, ParseErrorKind::InvalidJson(_)));
    }
}
