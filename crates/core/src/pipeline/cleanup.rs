//! Temp file housekeeping.

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Removes entries in `dir` older than `max_age_secs`.
///
/// Orphaned working directories accumulate when runs are interrupted;
/// a periodic sweep keeps the temp area bounded. Returns the number of
/// entries removed.
pub async fn cleanup_temp_files(dir: &Path, max_age_secs: u64) -> std::io::Result<usize> {
    let mut removed = 0;
    let max_age = Duration::from_secs(max_age_secs);
    let now = SystemTime::now();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                continue;
            }
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if age.map(|a| a > max_age).unwrap_or(false) {
            let result = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        info!(removed, dir = %dir.display(), "Cleaned up stale temp files");
    }
    Ok(removed)
}
