// Single-call agent tests against mock collaborators.

mod test_utils;

use fabulist_core::StageName;
use fabulist_error::{FabulistErrorKind, ProtocolErrorKind};
use fabulist_pipeline::{IllustrationAgent, Illustrator};
use test_utils::{Studio, fast_video, story_reply};
use tokio_util::sync::CancellationToken;

fn agent(studio: &Studio) -> IllustrationAgent {
    IllustrationAgent::in_memory(
        Illustrator::new(studio.collaborators()).with_video_config(fast_video(5)),
    )
}

#[tokio::test]
async fn test_agent_walks_every_stage() -> anyhow::Result<()> {
    let studio = Studio::new(vec![story_reply("v1"), story_reply("v2")]);
    let agent = agent(&studio);
    let cancel = CancellationToken::new();

    let reply = agent.invoke("s1", "dinosaurs", &cancel).await?;
    assert_eq!(*reply.stage(), StageName::StoryReview);
    assert!(reply.message().contains("The Egg v1"));

    let reply = agent.invoke("s1", "make chapter 2 scarier", &cancel).await?;
    assert_eq!(*reply.stage(), StageName::StoryReview);
    assert!(reply.message().contains("The Egg v2"));
    assert!(studio.chat.story_requests()[1].contains("make chapter 2 scarier"));

    let reply = agent.invoke("s1", "OK", &cancel).await?;
    assert_eq!(*reply.stage(), StageName::ImageReview);
    assert!(reply.message().contains("https://img.test/1.png"));
    assert_eq!(studio.images.call_count(), 3);

    let reply = agent.invoke("s1", "ok", &cancel).await?;
    assert_eq!(*reply.stage(), StageName::Complete);
    assert_eq!(reply.message(), "https://video.test/story.mp4");

    let calls = studio.total_calls();
    let reply = agent.invoke("s1", "again please", &cancel).await?;
    assert_eq!(*reply.stage(), StageName::Complete);
    assert_eq!(reply.message(), "https://video.test/story.mp4");
    assert_eq!(studio.total_calls(), calls);
    Ok(())
}

#[tokio::test]
async fn test_agent_image_revision() -> anyhow::Result<()> {
    let studio = Studio::new(vec![story_reply("v1")]);
    let agent = agent(&studio);
    let cancel = CancellationToken::new();

    agent.invoke("s1", "dinosaurs", &cancel).await?;
    agent.invoke("s1", "ok", &cancel).await?;
    let reply = agent.invoke("s1", "more stars in the sky", &cancel).await?;

    assert_eq!(*reply.stage(), StageName::ImageReview);
    assert_eq!(studio.images.call_count(), 6);
    assert!(studio.images.requests()[5].prompt().ends_with("\nmore stars in the sky"));
    assert_eq!(studio.video.create_count(), 0);

    let state = agent.session_state("s1").await;
    assert!(*state.need_to_edit_images());
    Ok(())
}

#[tokio::test]
async fn test_agent_failure_leaves_session_untouched() {
    let studio = Studio::new(vec!["I cannot write stories today.".to_string()]);
    let agent = agent(&studio);

    let err = agent
        .invoke("s1", "dinosaurs", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), FabulistErrorKind::Parse(_)));
    assert_eq!(*agent.session_state("s1").await.state(), StageName::Init);
}

#[tokio::test]
async fn test_agent_rejects_blank_review_reply() -> anyhow::Result<()> {
    let studio = Studio::new(vec![story_reply("v1")]);
    let agent = agent(&studio);
    let cancel = CancellationToken::new();

    agent.invoke("s1", "dinosaurs", &cancel).await?;
    let err = agent.invoke("s1", "   ", &cancel).await.unwrap_err();

    match err.kind() {
        FabulistErrorKind::Protocol(e) => {
            assert!(matches!(e.kind, ProtocolErrorKind::EmptyFeedback(_)))
        }
        other => panic!("expected a protocol error, got {other}"),
    }
    assert_eq!(*agent.session_state("s1").await.state(), StageName::StoryReview);
    assert_eq!(studio.chat.story_calls(), 1);
    Ok(())
}
