//! Review gates: rendering content for a reviewer and classifying replies.

use fabulist_core::{SessionState, StageName};
use fabulist_error::{
    FabulistResult, PipelineError, PipelineErrorKind, ProtocolError, ProtocolErrorKind,
};
use serde_json::Value;

/// What a reviewer asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ReviewDecision {
    /// Content accepted; leave the loop
    #[display("approve")]
    Approve,
    /// Content rejected with this feedback
    #[display("revise: {}", _0)]
    Revise(String),
}

impl ReviewDecision {
    /// Classify a resume payload.
    ///
    /// Accepted shapes:
    /// - a string: the approval sentinel (case-insensitive, surrounding
    ///   whitespace ignored) approves, any other non-empty text revises;
    /// - `{"no_need_to_edit": true}` approves;
    /// - `{"feedback": "..."}` is classified like a string.
    ///
    /// # Errors
    ///
    /// A missing or `null` payload is [`ProtocolErrorKind::MissingResumeData`],
    /// blank text is [`ProtocolErrorKind::EmptyFeedback`], and anything else
    /// is [`ProtocolErrorKind::InvalidResumeData`].
    ///
    /// # Examples
    ///
    /// ```
    /// use fabulist_core::StageName;
    /// use fabulist_pipeline::ReviewDecision;
    /// use serde_json::json;
    ///
    /// let stage = StageName::StoryReview;
    /// assert_eq!(
    ///     ReviewDecision::classify(Some(&json!(" OK ")), stage, "ok").unwrap(),
    ///     ReviewDecision::Approve
    /// );
    /// assert_eq!(
    ///     ReviewDecision::classify(Some(&json!("make chapter 2 scarier")), stage, "ok").unwrap(),
    ///     ReviewDecision::Revise("make chapter 2 scarier".into())
    /// );
    /// assert!(ReviewDecision::classify(Some(&json!(42)), stage, "ok").is_err());
    /// ```
    pub fn classify(
        payload: Option<&Value>,
        stage: StageName,
        sentinel: &str,
    ) -> Result<Self, ProtocolError> {
        match payload {
            None | Some(Value::Null) => Err(ProtocolError::new(
                ProtocolErrorKind::MissingResumeData(stage.to_string()),
            )),
            Some(Value::String(text)) => Self::from_text(text, stage, sentinel),
            Some(Value::Object(fields)) => {
                if fields.get("no_need_to_edit") == Some(&Value::Bool(true)) {
                    return Ok(ReviewDecision::Approve);
                }
                match fields.get("feedback") {
                    Some(Value::String(text)) => Self::from_text(text, stage, sentinel),
                    Some(other) => Err(invalid(stage, format!("feedback must be a string, got {}", type_name(other)))),
                    None if fields.contains_key("no_need_to_edit") => Err(ProtocolError::new(
                        ProtocolErrorKind::EmptyFeedback(stage.to_string()),
                    )),
                    None => Err(invalid(
                        stage,
                        "object must contain \"no_need_to_edit\" or \"feedback\"".to_string(),
                    )),
                }
            }
            Some(other) => Err(invalid(
                stage,
                format!("expected a string or review object, got {}", type_name(other)),
            )),
        }
    }

    fn from_text(text: &str, stage: StageName, sentinel: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        if text.to_lowercase() == sentinel.trim().to_lowercase() {
            Ok(ReviewDecision::Approve)
        } else if text.is_empty() {
            Err(ProtocolError::new(ProtocolErrorKind::EmptyFeedback(
                stage.to_string(),
            )))
        } else {
            Ok(ReviewDecision::Revise(text.to_string()))
        }
    }

    /// Record the decision in the session state.
    ///
    /// Approval clears the stage's revision flag and moves to the stage
    /// after the review; revision sets the flag and feedback and moves back
    /// to the paired generator.
    pub fn apply(&self, state: &mut SessionState, stage: StageName) -> FabulistResult<()> {
        let (Some(approved), Some(generator)) = (stage.successor(), stage.revision_target()) else {
            return Err(PipelineError::new(PipelineErrorKind::InvalidTransition(format!(
                "{} is not a review stage",
                stage
            )))
            .into());
        };

        match (self, stage) {
            (ReviewDecision::Approve, StageName::StoryReview) => state.approve_story(),
            (ReviewDecision::Approve, _) => state.approve_images(),
            (ReviewDecision::Revise(feedback), StageName::StoryReview) => {
                state.request_story_revision(feedback.as_str())?
            }
            (ReviewDecision::Revise(feedback), _) => state.request_image_revision(feedback.as_str())?,
        }

        state.advance_to(match self {
            ReviewDecision::Approve => approved,
            ReviewDecision::Revise(_) => generator,
        });
        Ok(())
    }
}

fn invalid(stage: StageName, reason: String) -> ProtocolError {
    ProtocolError::new(ProtocolErrorKind::InvalidResumeData {
        stage: stage.to_string(),
        reason,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Text shown to the reviewer at a review gate.
pub fn review_prompt(state: &SessionState, stage: StageName, sentinel: &str) -> String {
    let mut info = match stage {
        StageName::StoryReview => format!("Story content to review:\n{}", state.story().render()),
        _ => {
            let mut info = String::from("Illustrations to review:\n");
            for (i, chapter) in state.story().chapters.iter().enumerate() {
                info.push_str(&format!("Chapter {}: {}\n", i + 1, chapter.title));
                for image in state.generated_images().get(&i).into_iter().flatten() {
                    info.push_str(&format!("  {}\n", image));
                }
            }
            info
        }
    };
    info.push_str(&format!(
        "\nIf you think the content is good as it is, please reply with \"{}\".\nOtherwise, please provide your feedback.",
        sentinel
    ));
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabulist_core::Chapter;
    use serde_json::json;

    const STORY: StageName = StageName::StoryReview;

    fn protocol_kind(result: Result<ReviewDecision, ProtocolError>) -> ProtocolErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn test_sentinel_is_case_insensitive() {
        for reply in ["ok", "OK", "Ok", "  ok\n"] {
            assert_eq!(
                ReviewDecision::classify(Some(&json!(reply)), STORY, "ok").unwrap(),
                ReviewDecision::Approve
            );
        }
    }

    #[test]
    fn test_multiword_sentinel() {
        let decision =
            ReviewDecision::classify(Some(&json!("No need to edit")), STORY, "no need to edit");
        assert_eq!(decision.unwrap(), ReviewDecision::Approve);
    }

    #[test]
    fn test_missing_payload() {
        assert_eq!(
            protocol_kind(ReviewDecision::classify(None, STORY, "ok")),
            ProtocolErrorKind::MissingResumeData("story_review".into())
        );
        assert_eq!(
            protocol_kind(ReviewDecision::classify(Some(&Value::Null), STORY, "ok")),
            ProtocolErrorKind::MissingResumeData("story_review".into())
        );
    }

    #[test]
    fn test_wrong_shape_is_invalid() {
        for payload in [json!(1), json!(true), json!(["ok"]), json!({"verdict": "ok"})] {
            let kind = protocol_kind(ReviewDecision::classify(Some(&payload), STORY, "ok"));
            assert!(matches!(kind, ProtocolErrorKind::InvalidResumeData { .. }), "{payload}");
        }
    }

    #[test]
    fn test_blank_text_is_empty_feedback() {
        let kind = protocol_kind(ReviewDecision::classify(Some(&json!("   ")), STORY, "ok"));
        assert_eq!(kind, ProtocolErrorKind::EmptyFeedback("story_review".into()));
    }

    #[test]
    fn test_structured_payloads() {
        assert_eq!(
            ReviewDecision::classify(Some(&json!({"no_need_to_edit": true})), STORY, "ok").unwrap(),
            ReviewDecision::Approve
        );
        assert_eq!(
            ReviewDecision::classify(
                Some(&json!({"no_need_to_edit": false, "feedback": "more color"})),
                STORY,
                "ok"
            )
            .unwrap(),
            ReviewDecision::Revise("more color".into())
        );
        assert_eq!(
            protocol_kind(ReviewDecision::classify(
                Some(&json!({"no_need_to_edit": false})),
                STORY,
                "ok"
            )),
            ProtocolErrorKind::EmptyFeedback("story_review".into())
        );
    }

    #[test]
    fn test_apply_approve_and_revise() {
        let mut state = SessionState::default();
        state.begin("space");
        state.replace_chapters(vec![Chapter::new("Launch", "Up we go.")]);
        state.advance_to(StageName::StoryReview);

        ReviewDecision::Revise("add a cat".into())
            .apply(&mut state, STORY)
            .unwrap();
        assert!(*state.need_to_edit_story());
        assert_eq!(state.pending_story_feedback(), Some("add a cat"));
        assert_eq!(*state.state(), StageName::StoryGenerate);

        ReviewDecision::Approve.apply(&mut state, STORY).unwrap();
        assert!(!*state.need_to_edit_story());
        assert_eq!(*state.state(), StageName::ImagePrompt);
    }

    #[test]
    fn test_apply_outside_review_is_rejected() {
        let mut state = SessionState::default();
        assert!(ReviewDecision::Approve
            .apply(&mut state, StageName::VideoGenerate)
            .is_err());
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_review_prompt_mentions_sentinel_and_images() {
        let mut state = SessionState::default();
        state.begin("space");
        state.replace_chapters(vec![Chapter::new("Launch", "Up we go.")]);
        state
            .set_chapter_images(0, vec!["https://img/1.png".into()])
            .unwrap();

        let story = review_prompt(&state, StageName::StoryReview, "ok");
        assert!(story.contains("Chapter 1: Launch\nUp we go."));
        assert!(story.contains("reply with \"ok\""));

        let images = review_prompt(&state, StageName::ImageReview, "ok");
        assert!(images.contains("https://img/1.png"));
    }
}
