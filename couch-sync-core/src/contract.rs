#![allow(unused)]

//! # contract: interface to the remote cluster
//!
//! This module defines the two traits the pipelines talk to, and the plain
//! data types that cross them:
//!
//! - [`Cluster`]: cluster-level administration (list/create buckets, open a bucket).
//! - [`BucketHandle`]: one open bucket (design documents, view queries, document reads).
//!
//! ## Interface & Extensibility
//! - All methods are async and return [`ClientError`] on failure.
//! - The concrete REST client lives in the CLI crate; the core never performs
//!   any I/O against the network itself.
//! - A bucket handle is shared read-only by concurrent fetches during export,
//!   so implementors must be `Send + Sync` and safe for concurrent reads.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so consumers can generate
//!   `MockCluster` and `MockBucketHandle` for unit and integration tests.
//!   The mocks are exported with the `test-export-mocks` feature (on by default).

use async_trait::async_trait;

use mockall::{automock, predicate::*};

use crate::error::ClientError;
use crate::model::{AuthType, BucketType, DesignDocument};

/// A bucket as observed on the remote cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    /// Unique within one cluster snapshot.
    pub name: String,
    /// Raw type tag as reported by the cluster (`membase`, `memcached`, ...).
    pub bucket_type: String,
    /// Raw auth tag (`sasl` or `none`).
    pub auth_type: String,
    pub sasl_password: String,
    pub ram_quota_bytes: u64,
    pub replica_number: u8,
    pub replica_index: bool,
    pub flush_enabled: bool,
    pub threads_number: u8,
}

impl BucketConfig {
    /// Memcached buckets hold no design documents and are skipped by pull.
    pub fn is_data_bearing(&self) -> bool {
        BucketType::from_remote_tag(&self.bucket_type).supports_views()
    }

    /// Secret to open the bucket with, if the bucket uses credential-based auth.
    pub fn open_password(&self) -> Option<String> {
        match AuthType::from_remote_tag(&self.auth_type) {
            AuthType::Sasl => Some(self.sasl_password.clone()),
            AuthType::None => None,
        }
    }
}

/// Create-bucket request. RAM quota is in bytes, the remote unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBucket {
    pub name: String,
    pub ram_quota_bytes: u64,
    pub bucket_type: BucketType,
    pub replica_number: u8,
    pub replica_index: bool,
    pub flush_enabled: bool,
    pub auth_type: AuthType,
    pub password: String,
    pub thread_number: u8,
}

/// Successful outcome of removing a design document.
///
/// Absence is not an error: the caller treats both variants the same when
/// deciding to insert the replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent,
}

/// One row of a view query result.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// Id of the emitting document. Reduce rows carry none.
    pub id: Option<String>,
    pub key: serde_json::Value,
}

/// Cluster-level administration.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Lists every bucket on the cluster, in the order the cluster reports them.
    async fn list_buckets(&self) -> Result<Vec<BucketConfig>, ClientError>;

    /// Creates a bucket.
    async fn create_bucket(&self, req: &NewBucket) -> Result<(), ClientError>;

    /// Opens a bucket, with its own secret when given, otherwise with the
    /// credentials the cluster client was built with.
    async fn open_bucket(
        &self,
        name: &str,
        password: Option<String>,
    ) -> Result<Box<dyn BucketHandle>, ClientError>;
}

/// One open bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketHandle: Send + Sync {
    /// All design documents of the bucket, names already stripped of `_design/`.
    async fn get_design_documents(&self) -> Result<Vec<DesignDocument>, ClientError>;

    /// Inserts (or overwrites) a design document.
    async fn insert_design_document(&self, doc: &DesignDocument) -> Result<(), ClientError>;

    /// Removes a design document; a missing document yields [`DeleteOutcome::Absent`].
    async fn remove_design_document(&self, name: &str) -> Result<DeleteOutcome, ClientError>;

    /// Runs a view query with default options.
    async fn query_view(&self, design: &str, view: &str) -> Result<Vec<ViewRow>, ClientError>;

    /// Fetches one document body by key.
    async fn get(&self, key: &str) -> Result<serde_json::Value, ClientError>;

    /// Releases the bucket connection.
    async fn close(&self) -> Result<(), ClientError>;
}
