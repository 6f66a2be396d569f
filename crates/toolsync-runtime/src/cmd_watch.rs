//! `toolsync watch`: stay connected and print every new snapshot.

use toolsync_runtime::SyncClient;

use crate::display::summary_line;

/// Entry point for `toolsync watch`. Runs until Ctrl-C / SIGTERM.
pub async fn cmd_watch(client: &SyncClient, json: bool) -> anyhow::Result<()> {
    let _subscription = client.subscribe(move |snapshot| {
        if json {
            match serde_json::to_string(snapshot.as_ref()) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("cannot encode snapshot: {e}"),
            }
        } else {
            println!("{}", summary_line(snapshot));
        }
    });

    let mut state = client.watch_channel_state();
    client.connect();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                tracing::info!(state = %current, "channel state");
            }
        }
    }

    client.disconnect();
    Ok(())
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await?;
        tracing::info!("received ctrl-c, shutting down");
    }

    Ok(())
}
