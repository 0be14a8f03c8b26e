//! Push: local bucket tree → remote cluster.
//!
//! For every bucket directory under the base path:
//!   - read `config.json` (missing: skip with a warning; malformed: report and
//!     continue with defaults),
//!   - create the remote bucket if the run's bucket index does not list it,
//!   - replace each design document with the one assembled from the local
//!     `*.js` files.
//!
//! Only listing the remote buckets and reading the base directory can abort
//! the run. Everything else is recorded in the [`PushReport`] and processing
//! moves on to the next design or bucket.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::contract::Cluster;
use crate::error::{SyncError, SyncResult};
use crate::index::{names_match, RemoteBucketIndex};
use crate::local::{self, ConfigFile};
use crate::model::LocalBucketConfiguration;
use crate::provision::{provision_bucket, resolve_bucket_name};
use crate::reconcile::replace_design_document;
use crate::report::{Diagnostic, DiagnosticKind, PushReport};

#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Directory holding one subdirectory per bucket.
    pub base_path: PathBuf,
    /// Restrict the run to one bucket (case-insensitive).
    pub bucket: Option<String>,
}

pub async fn push<C>(cluster: &C, options: &PushOptions) -> SyncResult<PushReport>
where
    C: Cluster + ?Sized,
{
    info!(base_path = %options.base_path.display(), bucket = ?options.bucket, "[PUSH] Starting push");

    let index = RemoteBucketIndex::fetch(cluster)
        .await?
        .narrowed(options.bucket.as_deref())?;

    let bucket_dirs = local::list_subdirectories(&options.base_path).map_err(|e| {
        error!(path = %options.base_path.display(), error = %e, "[PUSH][ERROR] Cannot read local buckets");
        SyncError::LocalTree {
            path: options.base_path.clone(),
            source: e,
        }
    })?;

    let mut report = PushReport::default();
    for bucket_dir in bucket_dirs {
        let dir_name = local::dir_name(&bucket_dir);
        if let Some(filter) = options.bucket.as_deref() {
            if !names_match(&dir_name, filter) {
                continue;
            }
        }
        push_bucket(cluster, &index, &bucket_dir, &dir_name, &mut report).await;
    }

    info!(
        created = report.created_buckets.len(),
        designs = report.replaced_designs.len(),
        diagnostics = report.diagnostics.len(),
        "[PUSH] Push complete"
    );
    Ok(report)
}

async fn push_bucket<C>(
    cluster: &C,
    index: &RemoteBucketIndex,
    bucket_dir: &Path,
    dir_name: &str,
    report: &mut PushReport,
) where
    C: Cluster + ?Sized,
{
    debug!(bucket = dir_name, "[PUSH] processing");

    let mut config = match local::read_bucket_config(bucket_dir) {
        Ok(ConfigFile::Loaded(config)) => config,
        Ok(ConfigFile::Missing) => {
            warn!(bucket = dir_name, "[PUSH] No configuration file for bucket");
            report.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::MissingConfiguration,
                dir_name,
                format!("no {} in {}", local::CONFIG_FILE, bucket_dir.display()),
            ));
            return;
        }
        Ok(ConfigFile::Partial { config, problems }) => {
            for problem in problems {
                warn!(bucket = dir_name, problem = %problem, "[PUSH] Config field unreadable, using its default");
                report.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::ParseError,
                    dir_name,
                    format!("{}: {problem}", local::CONFIG_FILE),
                ));
            }
            config
        }
        Ok(ConfigFile::Malformed(e)) => {
            error!(bucket = dir_name, error = %e, "[PUSH][ERROR] Cannot parse config file, using defaults");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::ParseError,
                dir_name,
                format!("cannot parse {}: {e}", local::CONFIG_FILE),
            ));
            LocalBucketConfiguration::default()
        }
        Err(e) => {
            error!(bucket = dir_name, error = %e, "[PUSH][ERROR] Cannot read config file");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::LocalIo,
                dir_name,
                format!("cannot read {}: {e}", local::CONFIG_FILE),
            ));
            return;
        }
    };

    let name = resolve_bucket_name(dir_name, &mut config);
    provision_bucket(cluster, index, &name, &config, report).await;

    let design_dirs = match local::list_subdirectories(bucket_dir) {
        Ok(dirs) => dirs,
        Err(e) => {
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::LocalIo,
                name.as_str(),
                format!("cannot list design directories: {e}"),
            ));
            return;
        }
    };
    if design_dirs.is_empty() {
        debug!(bucket = %name, "[PUSH] No design directories");
        return;
    }

    // A bucket whose creation failed fails here, when it cannot be opened.
    let bucket = match cluster.open_bucket(&name, None).await {
        Ok(bucket) => bucket,
        Err(e) => {
            error!(bucket = %name, error = %e, "[PUSH][ERROR] Cannot open bucket");
            report.diagnostics.push(Diagnostic::error(
                DiagnosticKind::BucketUnavailable,
                name.as_str(),
                format!("cannot open bucket: {e}"),
            ));
            return;
        }
    };

    for design_dir in design_dirs {
        // Local files are read before anything is removed remotely.
        let doc = match local::read_design_document(&design_dir) {
            Ok(doc) => doc,
            Err(e) => {
                let subject = format!("{name}/{}", local::dir_name(&design_dir));
                warn!(design = %subject, error = %e, "[PUSH] Cannot read design directory");
                report.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::LocalIo,
                    subject,
                    format!("cannot read views: {e}"),
                ));
                continue;
            }
        };
        replace_design_document(&*bucket, &name, &doc, report).await;
    }

    if let Err(e) = bucket.close().await {
        debug!(bucket = %name, error = %e, "[PUSH] Closing bucket failed");
    }
}
