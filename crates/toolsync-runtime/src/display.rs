//! Text rendering of snapshots for the CLI.

use chrono::{DateTime, Utc};
use toolsync_core::{CacheSnapshot, HistoryRecord, Intent, ToolStatus, history};

/// Seconds → short human age.
pub fn relative_time(seconds: i64) -> String {
    let s = seconds.unsigned_abs();
    if s < 60 {
        "just now".to_string()
    } else if s < 3600 {
        format!("{}m ago", s / 60)
    } else if s < 86400 {
        format!("{}h ago", s / 3600)
    } else {
        format!("{}d ago", s / 86400)
    }
}

fn age(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    relative_time((now - ts).num_seconds())
}

// ── Status ──────────────────────────────────────────────────────────────────

pub fn format_status(snapshot: &CacheSnapshot, now: DateTime<Utc>) -> String {
    let Some(status) = &snapshot.status else {
        return "robot: no status received".to_string();
    };
    let link = if status.is_connected {
        "connected"
    } else {
        "DISCONNECTED"
    };
    let position = match (&status.destination_station, status.is_traveling) {
        (Some(dest), true) => format!(
            "traveling {} -> {} [{}]",
            status.current_station,
            dest,
            dest.letter()
        ),
        _ => format!(
            "at {} [{}]",
            status.current_station,
            status.current_station.letter()
        ),
    };
    format!(
        "robot: {link}, {position} (checked {})",
        age(status.last_checked, now)
    )
}

// ── Tools & Jobs ────────────────────────────────────────────────────────────

pub fn format_tools(snapshot: &CacheSnapshot) -> String {
    if snapshot.tools.is_empty() {
        return "(no tools)".to_string();
    }
    let width = snapshot.tools.keys().map(String::len).max().unwrap_or(0);
    snapshot
        .tools
        .values()
        .map(|tool| {
            let holder = match (&tool.status, &tool.checked_out_by) {
                (ToolStatus::CheckedOut, Some(by)) => {
                    let who = by.name().or(by.id()).unwrap_or("?");
                    format!(" by {who}")
                }
                _ => String::new(),
            };
            format!("{:<width$}  {}  {}{holder}", tool.id, tool.name, tool.status)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_jobs(snapshot: &CacheSnapshot) -> String {
    if snapshot.jobs.is_empty() {
        return "(no jobs)".to_string();
    }
    snapshot
        .jobs
        .values()
        .map(|job| {
            let unavailable = snapshot.unavailable_tools(job);
            let state = if unavailable.is_empty() {
                "ready".to_string()
            } else {
                format!("blocked by {}", unavailable.join(", "))
            };
            format!("{}  {}  {} tools, {state}", job.id, job.name, job.tools.len())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── History ─────────────────────────────────────────────────────────────────

pub fn history_line(record: &HistoryRecord, now: DateTime<Utc>) -> String {
    let event = match (record.check_in, record.check_out) {
        (Some(t), _) => format!("returned {}", age(t, now)),
        (None, Some(t)) => format!("out since {}", age(t, now)),
        (None, None) => "no timestamps".to_string(),
    };
    format!("{}  {}  {event}", record.tool_name(), record.user_name())
}

pub fn format_history(snapshot: &CacheSnapshot, search: Option<&str>, now: DateTime<Utc>) -> String {
    let matches = history::search(&snapshot.history, search.unwrap_or(""));
    if matches.is_empty() {
        return "(no history)".to_string();
    }
    matches
        .into_iter()
        .map(|r| history_line(r, now))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Watch & prompts ─────────────────────────────────────────────────────────

/// One-line digest printed by `watch` on every snapshot.
pub fn summary_line(snapshot: &CacheSnapshot) -> String {
    let station = snapshot
        .status
        .as_ref()
        .map(|s| s.displayed_station().letter().to_string())
        .unwrap_or_else(|| "-".to_string());
    let available = snapshot.tools.values().filter(|t| t.is_available()).count();
    let merged = snapshot.last_merged.map_or("-", |k| k.as_str());
    format!(
        "v{} [{merged}] link={} station={station} tools={available}/{} jobs={} history={}",
        snapshot.version,
        if snapshot.is_connected() { "up" } else { "down" },
        snapshot.tools.len(),
        snapshot.jobs.len(),
        snapshot.history.len()
    )
}

/// Confirmation question for an intent, phrased with cached names.
pub fn describe_intent(intent: &Intent, snapshot: &CacheSnapshot) -> String {
    match intent {
        Intent::CheckoutTool { tool_id } => {
            format!("Check out {}?", tool_label(snapshot, tool_id))
        }
        Intent::CheckinTool { tool_id } => {
            format!("Check in {}?", tool_label(snapshot, tool_id))
        }
        Intent::CheckoutJob { job_id } => {
            let job = snapshot.job(job_id);
            let name = job.map_or(job_id.as_str(), |j| j.name.as_str());
            let count = job.map_or(0, |j| j.tools.len());
            format!("Check out all {count} tools for job {name}?")
        }
        Intent::Travel { destination } => {
            let from = snapshot
                .status
                .as_ref()
                .map_or("Unknown", |s| s.current_station.as_str());
            format!("Send robot from {from} to {destination}?")
        }
        Intent::EmergencyStop => "Stop the robot now?".to_string(),
    }
}

fn tool_label(snapshot: &CacheSnapshot, tool_id: &str) -> String {
    match snapshot.tool(tool_id) {
        Some(tool) => format!("{} ({tool_id})", tool.name),
        None => tool_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use toolsync_core::{ResourceCache, ResourceKind, ResourceUpdate, Station};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_565_000, 0).single().expect("ts")
    }

    fn snapshot() -> std::sync::Arc<CacheSnapshot> {
        let mut cache = ResourceCache::new();
        let updates = [
            (
                ResourceKind::Status,
                r#"{"isConnected":true,"currentStation":"Station A","isTraveling":true,
                   "destinationStation":"Station C","lastChecked":"2024-05-01T12:00:00Z"}"#,
            ),
            (
                ResourceKind::Tools,
                r#"[{"_id":"t-1","name":"Drill","status":"Available"},
                    {"_id":"t-22","name":"Saw","status":"Checked Out",
                     "checkedOutBy":{"_id":"u-2","name":"Ana"}}]"#,
            ),
            (
                ResourceKind::Jobs,
                r#"[{"_id":"j-1","name":"Cabinet","tools":["t-1","t-22"]}]"#,
            ),
            (
                ResourceKind::History,
                r#"[{"toolId":{"_id":"t-1","name":"Drill"},"userId":{"_id":"u-1","name":"Sam"},
                     "checkOut":"2024-05-01T10:00:00Z","checkIn":null},
                    {"toolId":{"_id":"t-22","name":"Saw"},"userId":{"_id":"u-2","name":"Ana"},
                     "checkOut":"2024-05-01T09:00:00Z","checkIn":"2024-05-01T11:00:00Z"}]"#,
            ),
        ];
        for (kind, body) in updates {
            cache.apply(ResourceUpdate::from_body(kind, body).expect("decode"));
        }
        cache.snapshot()
    }

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(30), "just now");
        assert_eq!(relative_time(180), "3m ago");
        assert_eq!(relative_time(7200), "2h ago");
        assert_eq!(relative_time(3 * 86400), "3d ago");
    }

    #[test]
    fn status_shows_travel_and_letter() {
        let line = format_status(&snapshot(), now());
        assert!(line.starts_with("robot: connected, traveling Station A -> Station C [C]"));
    }

    #[test]
    fn status_without_data() {
        assert_eq!(
            format_status(&CacheSnapshot::default(), now()),
            "robot: no status received"
        );
    }

    #[test]
    fn tools_show_holder() {
        let out = format_tools(&snapshot());
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "t-1   Drill  Available");
        assert_eq!(lines[1], "t-22  Saw  Checked Out by Ana");
    }

    #[test]
    fn jobs_show_blockers() {
        assert_eq!(format_jobs(&snapshot()), "j-1  Cabinet  2 tools, blocked by t-22");
    }

    #[test]
    fn history_most_recent_first_and_searchable() {
        let snap = snapshot();
        let out = format_history(&snap, None, now());
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].starts_with("Saw  Ana  returned"));
        assert!(lines[1].starts_with("Drill  Sam  out since"));

        assert_eq!(format_history(&snap, Some("SAM"), now()).lines().count(), 1);
        assert_eq!(format_history(&snap, Some("nobody"), now()), "(no history)");
    }

    #[test]
    fn history_line_ages() {
        let record = HistoryRecord {
            tool: None,
            user: None,
            check_out: Some(now() - Duration::minutes(5)),
            check_in: None,
        };
        assert_eq!(
            history_line(&record, now()),
            "Unknown Tool  Unknown User  out since 5m ago"
        );
    }

    #[test]
    fn summary_counts() {
        assert_eq!(
            summary_line(&snapshot()),
            "v4 [history] link=up station=C tools=1/2 jobs=1 history=2"
        );
        assert_eq!(
            summary_line(&CacheSnapshot::default()),
            "v0 [-] link=down station=- tools=0/0 jobs=0 history=0"
        );
    }

    #[test]
    fn prompts_use_cached_names() {
        let snap = snapshot();
        assert_eq!(
            describe_intent(&Intent::CheckoutTool { tool_id: "t-1".into() }, &snap),
            "Check out Drill (t-1)?"
        );
        assert_eq!(
            describe_intent(&Intent::CheckoutJob { job_id: "j-1".into() }, &snap),
            "Check out all 2 tools for job Cabinet?"
        );
        assert_eq!(
            describe_intent(
                &Intent::Travel {
                    destination: Station::new("Station B")
                },
                &snap
            ),
            "Send robot from Station A to Station B?"
        );
    }
}
