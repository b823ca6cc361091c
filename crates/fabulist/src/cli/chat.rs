//! Conversational front end over the illustration agent.

use super::{Input, cancel_on_ctrl_c, run::read_reply};
use fabulist::{FabulistConfig, FabulistResult, IllustrationAgent, Illustrator, collaborators};
use tokio_util::sync::CancellationToken;

/// Feed stdin lines to the agent until the session completes.
#[tracing::instrument(skip(config, input))]
pub async fn run_chat(config: &FabulistConfig, session: &str, input: &mut Input) -> FabulistResult<()> {
    let agent = IllustrationAgent::in_memory(Illustrator::from_config(collaborators(config)?, config))
        .with_approval_sentinel(config.review.approval_sentinel().clone());
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    println!("What should the story be about?");
    loop {
        let message = read_reply(input).await?;
        match agent.invoke(session, &message, &cancel).await {
            Ok(reply) => {
                println!("\n{}\n", reply.message());
                if reply.stage().is_terminal() {
                    return Ok(());
                }
            }
            Err(e) if cancel.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, "Agent call failed");
                println!("Something went wrong: {}. Send another message to retry.", e);
            }
        }
    }
}
