//! Text rendering of file listings

use chrono::DateTime;
use depot_common::protocol::FileMetadata;

use crate::constants::{MSG_LIST_HEADER, MSG_NO_FILES};

/// Render `files` as a tab-separated table with RFC 3339 timestamps
#[must_use]
pub fn format_listing(files: &[FileMetadata]) -> String {
    if files.is_empty() {
        return MSG_NO_FILES.to_string();
    }

    let mut out = String::from(MSG_LIST_HEADER);
    for file in files {
        out.push('\n');
        out.push_str(&format!(
            "{}\t{}\t{}",
            file.filename,
            format_timestamp(file.created_at),
            format_timestamp(file.updated_at)
        ));
    }
    out
}

/// RFC 3339 in UTC, or the raw seconds if out of range
fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
