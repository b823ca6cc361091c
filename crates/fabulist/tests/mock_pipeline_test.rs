//! End-to-end runs against the offline mock collaborators.

use fabulist::{
    FabulistConfig, IllustrationAgent, Illustrator, MOCK_VIDEO_URL, ResumeParams, Runner,
    StageName, collaborators,
};
use tokio_util::sync::CancellationToken;

fn mock_config() -> anyhow::Result<FabulistConfig> {
    Ok(FabulistConfig::from_toml_str(
        "[ark]\nmock = true\n\n[video]\npoll_interval_secs = 0\n",
    )?)
}

#[tokio::test]
async fn test_runner_completes_with_mocks() -> anyhow::Result<()> {
    let config = mock_config()?;
    let runner = Runner::from_config(&config, collaborators(&config)?);

    let mut outcome = runner
        .query("s", "a lost dinosaur", CancellationToken::new())
        .drain()
        .await?;
    let mut reviews = 0;
    while let Some(interrupt) = outcome.interrupt().cloned() {
        reviews += 1;
        assert!(reviews <= 2, "approval should not loop");
        outcome = runner
            .resume_with_params(
                "s",
                ResumeParams::feedback(interrupt.id, "OK"),
                CancellationToken::new(),
            )
            .drain()
            .await?;
    }

    assert!(outcome.is_completed());
    assert_eq!(reviews, 2);
    let last = outcome.outputs().last().expect("video output");
    assert_eq!(last.content, MOCK_VIDEO_URL);
    assert_eq!(runner.session_state("s").await.state(), &StageName::Complete);
    Ok(())
}

#[tokio::test]
async fn test_agent_completes_with_mocks() -> anyhow::Result<()> {
    let config = mock_config()?;
    let agent = IllustrationAgent::in_memory(Illustrator::from_config(collaborators(&config)?, &config));
    let cancel = CancellationToken::new();

    let story = agent.invoke("s", "a lost dinosaur", &cancel).await?;
    assert_eq!(story.stage(), &StageName::StoryReview);
    assert!(story.message().contains("a lost dinosaur"));

    let images = agent.invoke("s", "ok", &cancel).await?;
    assert_eq!(images.stage(), &StageName::ImageReview);

    let video = agent.invoke("s", "ok", &cancel).await?;
    assert_eq!(video.stage(), &StageName::Complete);
    assert!(video.message().contains(MOCK_VIDEO_URL));
    Ok(())
}

#[test]
fn test_live_collaborators_need_api_key() -> anyhow::Result<()> {
    let mut config = mock_config()?;
    config.ark = config.ark.with_mock(false).with_api_key(None::<String>);
    assert!(collaborators(&config).is_err());
    Ok(())
}
