//! Drive the story pipeline from the terminal.

use super::{Input, cancel_on_ctrl_c};
use fabulist::{
    Event, EventStream, FabulistConfig, FabulistResult, InterruptContext, ProtocolError,
    ProtocolErrorKind, ResumeParams, Runner, collaborators,
};
use tokio_util::sync::CancellationToken;

/// Run the pipeline for `session`, asking stdin for every review.
///
/// Returns once the video is reported. Fails when a stage fails or stdin
/// closes before the run settles.
#[tracing::instrument(skip(config, theme, input))]
pub async fn run_pipeline(
    config: &FabulistConfig,
    session: &str,
    theme: Option<String>,
    input: &mut Input,
) -> FabulistResult<()> {
    let runner = Runner::from_config(config, collaborators(config)?);
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let theme = match theme {
        Some(theme) => theme,
        None => {
            println!("What should the story be about?");
            read_reply(input).await?
        }
    };

    let mut pending = present(runner.query(session, theme, cancel.child_token())).await?;
    while let Some(interrupt) = pending {
        println!("\n{}", interrupt.info);
        let reply = read_reply(input).await?;
        let params = ResumeParams::feedback(interrupt.id.clone(), reply);
        pending = present(runner.resume_with_params(session, params, cancel.child_token())).await?;
    }
    Ok(())
}

/// Print outputs as they arrive and return the interrupt the run stopped at.
async fn present(stream: EventStream) -> FabulistResult<Option<InterruptContext>> {
    let outcome = stream
        .drain_with(|event| {
            if let Event::Output(output) = event {
                println!("[{}]\n{}\n", output.stage, output.content);
            }
        })
        .await?;
    Ok(outcome.interrupt().cloned())
}

/// Read one line of user input.
pub(super) async fn read_reply(input: &mut Input) -> FabulistResult<String> {
    match input.next_line().await {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(ProtocolError::new(ProtocolErrorKind::InputUnavailable(
            "stdin closed".to_string(),
        ))
        .into()),
        Err(e) => Err(ProtocolError::new(ProtocolErrorKind::InputUnavailable(e.to_string())).into()),
    }
}
