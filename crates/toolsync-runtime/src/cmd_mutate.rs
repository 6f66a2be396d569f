//! `toolsync checkout-tool|checkin-tool|checkout-job|travel|estop`.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use toolsync_core::Intent;
use toolsync_runtime::SyncClient;

use crate::display::describe_intent;

/// Refresh, run guards, ask for confirmation, submit.
pub async fn cmd_mutate(client: &SyncClient, intent: Intent, assume_yes: bool) -> anyhow::Result<()> {
    if let Err(err) = client.refresh().await {
        tracing::warn!("refresh before mutation incomplete: {err}");
    }

    let confirmation = client.request(intent)?;
    let question = describe_intent(confirmation.intent(), &client.get_snapshot());

    if !assume_yes && !prompt_yes_no(&question).await? {
        client.cancel(confirmation);
        println!("cancelled");
        return Ok(());
    }

    client.confirm(confirmation).await?;
    println!("submitted; the change appears once the server reports it");
    Ok(())
}

/// Entry point for `toolsync estop`. Never prompts.
pub async fn cmd_estop(client: &SyncClient) -> anyhow::Result<()> {
    client.emergency_stop().await?;
    println!("emergency stop sent");
    Ok(())
}

async fn prompt_yes_no(question: &str) -> anyhow::Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{question} [y/N] ").as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(parse_answer(&line))
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
