//! Replaces remote design documents with their local version.
//!
//! Replacement is a two-step protocol, never an update in place:
//! 1. remove the remote design document (absence is fine),
//! 2. insert the document assembled from local view files.
//!
//! Views deleted locally therefore disappear remotely too.

use tracing::{debug, info, warn};

use crate::contract::{BucketHandle, DeleteOutcome};
use crate::model::DesignDocument;
use crate::report::{Diagnostic, DiagnosticKind, PushReport};

/// Removes the design document named `name`, folding "not found" into
/// [`DeleteOutcome::Absent`]. Other failures are returned to the caller.
pub async fn remove_design<B>(bucket: &B, name: &str) -> Result<DeleteOutcome, crate::error::ClientError>
where
    B: BucketHandle + ?Sized,
{
    match bucket.remove_design_document(name).await {
        Err(e) if e.is_not_found() => Ok(DeleteOutcome::Absent),
        other => other,
    }
}

/// Replaces one design document. Returns whether the insert succeeded.
pub async fn replace_design_document<B>(
    bucket: &B,
    bucket_name: &str,
    doc: &DesignDocument,
    report: &mut PushReport,
) -> bool
where
    B: BucketHandle + ?Sized,
{
    let subject = format!("{bucket_name}/{}", doc.name);

    match remove_design(bucket, &doc.name).await {
        Ok(DeleteOutcome::Deleted) => {
            debug!(bucket = bucket_name, design = %doc.name, "[PUSH] Removed remote design");
        }
        Ok(DeleteOutcome::Absent) => {
            debug!(bucket = bucket_name, design = %doc.name, "[PUSH] Design doesn't exist remotely");
        }
        Err(e) => {
            warn!(bucket = bucket_name, design = %doc.name, error = %e, "[PUSH] Cannot remove remote design");
            report.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::DeleteFailure,
                subject.clone(),
                format!("cannot remove design: {e}"),
            ));
        }
    }

    info!(bucket = bucket_name, design = %doc.name, views = doc.views.len(), "[PUSH] Attempting to create design");
    match bucket.insert_design_document(doc).await {
        Ok(()) => {
            info!(bucket = bucket_name, design = %doc.name, "[PUSH] Created design");
            report
                .replaced_designs
                .push((bucket_name.to_string(), doc.name.clone()));
            true
        }
        Err(e) => {
            warn!(bucket = bucket_name, design = %doc.name, error = %e, "[PUSH] Cannot create design");
            report.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::WriteFailure,
                subject,
                format!("cannot create design: {e}"),
            ));
            false
        }
    }
}
