//! Makes sure a remote bucket exists for every local bucket directory.

use tracing::{debug, error, info};

use crate::contract::Cluster;
use crate::index::RemoteBucketIndex;
use crate::model::LocalBucketConfiguration;
use crate::report::{Diagnostic, DiagnosticKind, PushReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The index already listed a bucket with this exact name.
    Existing,
    Created,
    /// The create request was rejected; a diagnostic has been recorded.
    CreateFailed,
}

/// Settles the effective bucket name for a local directory.
///
/// An empty `name` in the configuration adopts the directory name; otherwise
/// the configured name wins and is used for all remote matching.
pub fn resolve_bucket_name(dir_name: &str, config: &mut LocalBucketConfiguration) -> String {
    if config.name.is_empty() {
        config.name = dir_name.to_string();
    } else if config.name != dir_name {
        debug!(dir = dir_name, bucket = %config.name, "Configured bucket name overrides directory name");
    }
    config.name.clone()
}

/// Creates the bucket when the index has no bucket named `name`.
pub async fn provision_bucket<C>(
    cluster: &C,
    index: &RemoteBucketIndex,
    name: &str,
    config: &LocalBucketConfiguration,
    report: &mut PushReport,
) -> Provisioned
where
    C: Cluster + ?Sized,
{
    if index.contains(name) {
        debug!(bucket = name, "[PUSH] Remote bucket exists");
        return Provisioned::Existing;
    }

    let request = config.to_create_request(name);
    info!(
        bucket = name,
        ram_quota_bytes = request.ram_quota_bytes,
        bucket_type = request.bucket_type.as_remote_tag(),
        "[PUSH] Creating remote bucket"
    );
    match cluster.create_bucket(&request).await {
        Ok(()) => {
            info!(bucket = name, "[PUSH] Created remote bucket");
            report.created_buckets.push(name.to_string());
            Provisioned::Created
        }
        Err(e) => {
            error!(bucket = name, error = %e, "[PUSH][ERROR] Cannot create bucket");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::WriteFailure,
                name,
                format!("cannot create bucket: {e}"),
            ));
            Provisioned::CreateFailed
        }
    }
}
