//! Age-based sweep of the media directory.
//!
//! The pipeline never deletes what it downloads, even when a job fails, so that partial
//! artifacts can still be retrieved. This sweep is the only thing that removes them.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

use crate::utils::format_file_size;
use crate::Result;

/// A retention window of `count` hours; absurdly large values clamp instead of wrapping
pub fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(3600))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Regular files looked at
    pub scanned: usize,
    /// Files removed (or that would be removed on a dry run)
    pub deleted: Vec<PathBuf>,
    pub freed_bytes: u64,
    /// Files that could not be inspected or removed
    pub failed: usize,
}

impl CleanupReport {
    pub fn summary(&self) -> String {
        format!(
            "scanned {} files, removed {} ({}), {} errors",
            self.scanned,
            self.deleted.len(),
            format_file_size(self.freed_bytes),
            self.failed
        )
    }
}

/// Delete regular files in `root` last modified more than `max_age` ago
pub async fn sweep(root: &Path, max_age: Duration, dry_run: bool) -> Result<CleanupReport> {
    sweep_at(root, max_age, dry_run, SystemTime::now()).await
}

async fn sweep_at(root: &Path, max_age: Duration, dry_run: bool, now: SystemTime) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        tracing::warn!("Media directory not found: {}", root.display());
        return Ok(report);
    }

    let mut entries = tokio::fs::read_dir(root)
        .await
        .with_context(|| format!("Failed to read media directory {}", root.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Error processing file {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };
        report.scanned += 1;

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }

        if !dry_run {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to delete {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        }

        tracing::info!("Deleting old file: {}", path.display());
        report.freed_bytes += metadata.len();
        report.deleted.push(path);
    }

    Ok(report)
}

/// Run [`sweep`] every `interval` until the task is aborted
pub fn spawn_periodic(root: PathBuf, max_age: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match sweep(&root, max_age, false).await {
                Ok(report) => tracing::info!("Media cleanup: {}", report.summary()),
                Err(e) => tracing::error!("Media cleanup failed: {:#}", e),
            }
        }
    })
}
