//! Error types shared by the pipelines and the cluster collaborator.
//!
//! Two layers exist:
//! - [`ClientError`]: what a [`crate::contract::Cluster`] or
//!   [`crate::contract::BucketHandle`] implementation reports for a single
//!   remote call.
//! - [`SyncError`]: the abort-class failures that stop a whole run. Everything
//!   else is recoverable and ends up as a [`crate::report::Diagnostic`].

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single call against the remote cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot decode response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

/// Abort-class failures: any of these ends the run with a non-zero status.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot connect to cluster: {0}")]
    Connection(#[source] ClientError),

    #[error("no bucket with name {0}")]
    ObjectNotFound(String),

    #[error("local file system error at {path}: {source}")]
    LocalTree {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("query {design}/{view} failed on bucket {bucket}: {source}")]
    Query {
        bucket: String,
        design: String,
        view: String,
        #[source]
        source: ClientError,
    },
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
