//! Pull: remote cluster → local bucket tree.
//!
//! Writes `<base>/<bucket>/config.json` and `<base>/<bucket>/<design>/<view>.js`
//! for every data-bearing remote bucket. The bucket filter is checked before
//! anything touches the file system, so an unmatched filter writes nothing.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::contract::{BucketConfig, Cluster};
use crate::error::SyncResult;
use crate::index::RemoteBucketIndex;
use crate::local::LocalBucketTree;
use crate::model::LocalBucketConfiguration;
use crate::report::{Diagnostic, DiagnosticKind, PullReport, PulledBucket};

#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Directory that receives one subdirectory per bucket.
    pub base_path: PathBuf,
    /// Restrict the run to one bucket (case-insensitive).
    pub bucket: Option<String>,
}

pub async fn pull<C>(cluster: &C, options: &PullOptions) -> SyncResult<PullReport>
where
    C: Cluster + ?Sized,
{
    info!(base_path = %options.base_path.display(), bucket = ?options.bucket, "[PULL] Starting pull");

    let index = RemoteBucketIndex::fetch(cluster)
        .await?
        .narrowed(options.bucket.as_deref())?;

    let mut report = PullReport::default();
    for remote in index.iter() {
        if !remote.is_data_bearing() {
            info!(bucket = %remote.name, bucket_type = %remote.bucket_type, "[PULL] Skipping bucket without views");
            continue;
        }
        pull_bucket(cluster, remote, options, &mut report).await;
    }

    info!(
        buckets = report.buckets.len(),
        diagnostics = report.diagnostics.len(),
        "[PULL] Pull complete"
    );
    Ok(report)
}

async fn pull_bucket<C>(cluster: &C, remote: &BucketConfig, options: &PullOptions, report: &mut PullReport)
where
    C: Cluster + ?Sized,
{
    debug!(bucket = %remote.name, "[PULL] processing");

    let bucket = match cluster.open_bucket(&remote.name, remote.open_password()).await {
        Ok(bucket) => bucket,
        Err(e) => {
            error!(bucket = %remote.name, error = %e, "[PULL][ERROR] Cannot open bucket");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::BucketUnavailable,
                remote.name.as_str(),
                format!("cannot open bucket: {e}"),
            ));
            return;
        }
    };

    let designs = match bucket.get_design_documents().await {
        Ok(designs) => designs,
        Err(e) => {
            warn!(bucket = %remote.name, error = %e, "[PULL] Cannot process design documents");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::BucketUnavailable,
                remote.name.as_str(),
                format!("cannot list design documents: {e}"),
            ));
            Vec::new()
        }
    };
    if let Err(e) = bucket.close().await {
        debug!(bucket = %remote.name, error = %e, "[PULL] Closing bucket failed");
    }

    let mut tree = LocalBucketTree::new(LocalBucketConfiguration::from_remote(remote));
    for design in designs {
        if design.name.is_empty() {
            continue;
        }
        tree.design_documents.insert(design.name.clone(), design);
    }

    match tree.write_to(&options.base_path, &remote.name) {
        Ok(path) => {
            info!(
                bucket = %remote.name,
                designs = tree.design_documents.len(),
                views = tree.view_count(),
                path = %path.display(),
                "[PULL] Wrote bucket"
            );
            report.buckets.push(PulledBucket {
                name: remote.name.clone(),
                path,
                design_documents: tree.design_documents.len(),
                views: tree.view_count(),
            });
        }
        Err(e) => {
            error!(bucket = %remote.name, error = %e, "[PULL][ERROR] Cannot write bucket directory");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::LocalIo,
                remote.name.as_str(),
                format!("cannot write local files: {e}"),
            ));
        }
    }
}
