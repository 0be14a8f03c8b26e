//! Export: documents selected by a view query → one JSON file per document.
//!
//! Pipeline: open bucket → run the view → collect row ids in order → bulk
//! fetch with bounded parallelism → write `<sanitized-key>.json` for each
//! document that came back.
//!
//! The bulk fetch never stops on a failed key: every key gets a
//! [`FetchOutcome`], and each failure becomes its own diagnostic. Row ids are
//! not deduplicated; a key emitted twice is fetched twice and written twice.

use std::fs;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::contract::{BucketHandle, Cluster, ViewRow};
use crate::error::{ClientError, SyncError, SyncResult};
use crate::report::{Diagnostic, DiagnosticKind, ExportReport};
use crate::sanitize::sanitize_file_name;

pub const DEFAULT_PARALLELISM: usize = 20;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub bucket: String,
    /// Bucket-scoped secret; without it the cluster client's own credentials are used.
    pub bucket_password: Option<String>,
    pub design: String,
    pub view: String,
    pub target_dir: PathBuf,
    /// Maximum number of concurrent document fetches.
    pub parallelism: usize,
}

/// Result of fetching one key.
#[derive(Debug)]
pub struct FetchOutcome {
    pub key: String,
    pub result: Result<serde_json::Value, ClientError>,
}

/// Ids of the emitting documents, in row order. Rows without an id are skipped.
pub fn extract_keys(rows: &[ViewRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| {
            if row.id.is_none() {
                debug!(key = %row.key, "[EXPORT] Row without document id");
            }
            row.id.clone()
        })
        .collect()
}

/// Fetches every key with at most `parallelism` requests in flight.
/// Outcomes come back in the order of `keys`, after all fetches have finished.
pub async fn bulk_fetch<B>(bucket: &B, keys: &[String], parallelism: usize) -> Vec<FetchOutcome>
where
    B: BucketHandle + ?Sized,
{
    stream::iter(keys.iter().cloned())
        .map(|key| async move {
            let result = bucket.get(&key).await;
            FetchOutcome { key, result }
        })
        .buffered(parallelism.max(1))
        .collect()
        .await
}

/// Writes one document as indented JSON to `<dir>/<sanitized-key>.json`.
pub fn write_document(dir: &Path, key: &str, value: &serde_json::Value) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{}.json", sanitize_file_name(key)));
    let body = serde_json::to_string_pretty(value)?;
    fs::write(&path, body)?;
    Ok(path)
}

pub async fn export<C>(cluster: &C, options: &ExportOptions) -> SyncResult<ExportReport>
where
    C: Cluster + ?Sized,
{
    info!(
        bucket = %options.bucket,
        design = %options.design,
        view = %options.view,
        target_dir = %options.target_dir.display(),
        "[EXPORT] Starting export"
    );

    let bucket = cluster
        .open_bucket(&options.bucket, options.bucket_password.clone())
        .await
        .map_err(|e| {
            error!(bucket = %options.bucket, error = %e, "[EXPORT][ERROR] Cannot open bucket");
            SyncError::Connection(e)
        })?;

    let result = export_from(&*bucket, options).await;

    if let Err(e) = bucket.close().await {
        debug!(bucket = %options.bucket, error = %e, "[EXPORT] Closing bucket failed");
    }
    result
}

async fn export_from<B>(bucket: &B, options: &ExportOptions) -> SyncResult<ExportReport>
where
    B: BucketHandle + ?Sized,
{
    let rows = bucket
        .query_view(&options.design, &options.view)
        .await
        .map_err(|e| {
            error!(bucket = %options.bucket, design = %options.design, view = %options.view, error = %e, "[EXPORT][ERROR] Query failed");
            SyncError::Query {
                bucket: options.bucket.clone(),
                design: options.design.clone(),
                view: options.view.clone(),
                source: e,
            }
        })?;
    let keys = extract_keys(&rows);

    fs::create_dir_all(&options.target_dir).map_err(|e| SyncError::LocalTree {
        path: options.target_dir.clone(),
        source: e,
    })?;

    info!(keys = keys.len(), parallelism = options.parallelism, "[EXPORT] Fetching data");
    let outcomes = bulk_fetch(bucket, &keys, options.parallelism).await;
    info!("[EXPORT] Done fetching");

    let mut report = ExportReport {
        requested: keys.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        let written = match outcome.result {
            Ok(value) => write_document(&options.target_dir, &outcome.key, &value)
                .map_err(|e| format!("cannot write document: {e}")),
            Err(e) => Err(format!("cannot fetch document: {e}")),
        };
        match written {
            Ok(path) => {
                debug!(key = %outcome.key, path = %path.display(), "[EXPORT] saved");
                report.written.push(path);
            }
            Err(message) => {
                warn!(key = %outcome.key, error = %message, "[EXPORT] Document failed");
                report.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::PerDocumentFailure,
                    outcome.key,
                    message,
                ));
            }
        }
    }

    info!(
        written = report.written.len(),
        failed = report.failed(),
        "[EXPORT] Export complete"
    );
    Ok(report)
}
