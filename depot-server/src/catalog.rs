//! Listing of stored files

use std::time::{SystemTime, UNIX_EPOCH};

use depot_common::protocol::FileMetadata;

use crate::constants::ERR_READ_FILES;
use crate::error::CallError;
use crate::store::FileStore;

/// Describe every regular file in the store
///
/// The store keeps a single timestamp per file, so the modification time is
/// reported as both `created_at` and `updated_at`.
///
/// # Errors
///
/// Returns `Internal` if the store root cannot be read.
pub(crate) async fn list_files(store: &FileStore) -> Result<Vec<FileMetadata>, CallError> {
    let files = store
        .list()
        .await
        .map_err(|e| CallError::internal(format!("{ERR_READ_FILES}{e}")))?;

    Ok(files
        .into_iter()
        .map(|file| {
            let timestamp = unix_seconds(file.modified);
            FileMetadata {
                filename: file.name,
                created_at: timestamp,
                updated_at: timestamp,
            }
        })
        .collect())
}

/// Seconds since the Unix epoch, negative for earlier times
fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}
