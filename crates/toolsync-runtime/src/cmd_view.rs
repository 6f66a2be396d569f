//! `toolsync status|tools|jobs|history`: one-shot refresh and print.

use chrono::Utc;
use serde_json::json;
use toolsync_core::{CacheSnapshot, ResourceKind, history};
use toolsync_runtime::SyncClient;
use toolsync_transport::{Backend, PushSource};

use crate::display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Status,
    Tools,
    Jobs,
    History { search: Option<String> },
}

impl View {
    fn kind(&self) -> ResourceKind {
        match self {
            Self::Status => ResourceKind::Status,
            Self::Tools => ResourceKind::Tools,
            Self::Jobs => ResourceKind::Jobs,
            Self::History { .. } => ResourceKind::History,
        }
    }
}

/// Entry point for the read-only commands.
pub async fn cmd_view<B: Backend + PushSource>(
    client: &SyncClient<B>,
    view: View,
    json: bool,
) -> anyhow::Result<()> {
    if let Err(err) = client.refresh().await {
        // Other collections may still have arrived; only fail if ours is missing.
        if !client.get_snapshot().has_received(view.kind()) {
            anyhow::bail!("cannot load {}: {err}", view.kind());
        }
        tracing::warn!("partial refresh: {err}");
    }
    let snapshot = client.get_snapshot();
    let output = if json {
        serde_json::to_string_pretty(&render_json(&snapshot, &view))?
    } else {
        render_text(&snapshot, &view)
    };
    println!("{output}");
    Ok(())
}

pub(crate) fn render_text(snapshot: &CacheSnapshot, view: &View) -> String {
    let now = Utc::now();
    match view {
        View::Status => display::format_status(snapshot, now),
        View::Tools => display::format_tools(snapshot),
        View::Jobs => display::format_jobs(snapshot),
        View::History { search } => display::format_history(snapshot, search.as_deref(), now),
    }
}

pub(crate) fn render_json(snapshot: &CacheSnapshot, view: &View) -> serde_json::Value {
    match view {
        View::Status => json!(snapshot.status),
        View::Tools => json!(snapshot.tools.values().collect::<Vec<_>>()),
        View::Jobs => {
            let jobs: Vec<_> = snapshot
                .jobs
                .values()
                .map(|job| {
                    json!({
                        "job": job,
                        "unavailableTools": snapshot.unavailable_tools(job),
                    })
                })
                .collect();
            json!(jobs)
        }
        View::History { search } => {
            json!(history::search(&snapshot.history, search.as_deref().unwrap_or("")))
        }
    }
}
