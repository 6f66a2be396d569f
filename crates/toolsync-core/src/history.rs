//! History display ordering and search.

use crate::types::HistoryRecord;

/// Sort records most-recent-activity first (`check_in ?? check_out`, descending).
///
/// Stable: records with equal keys keep payload order. Records with neither
/// timestamp go last.
pub fn sort_for_display(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.activity_key().cmp(&a.activity_key()));
}

/// Case-insensitive substring match against tool or user display name.
/// An empty (or all-whitespace) term matches everything.
pub fn matches_search(record: &HistoryRecord, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    record.tool_name().to_lowercase().contains(&term)
        || record.user_name().to_lowercase().contains(&term)
}

pub fn search<'a>(records: &'a [HistoryRecord], term: &str) -> Vec<&'a HistoryRecord> {
    records.iter().filter(|r| matches_search(r, term)).collect()
}
