//! Snapshot of the remote buckets, taken once per run.

use tracing::{error, info};

use crate::contract::{BucketConfig, Cluster};
use crate::error::{SyncError, SyncResult};

/// Case-insensitive name comparison used for operator-supplied bucket filters.
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct RemoteBucketIndex {
    buckets: Vec<BucketConfig>,
}

impl RemoteBucketIndex {
    /// Lists the cluster's buckets. Failure here means the cluster is unreachable
    /// or rejected the credentials, so it aborts the run.
    pub async fn fetch<C>(cluster: &C) -> SyncResult<Self>
    where
        C: Cluster + ?Sized,
    {
        match cluster.list_buckets().await {
            Ok(buckets) => {
                info!(count = buckets.len(), "Listed remote buckets");
                Ok(Self { buckets })
            }
            Err(e) => {
                error!(error = %e, "Cannot list remote buckets");
                Err(SyncError::Connection(e))
            }
        }
    }

    pub fn from_buckets(buckets: Vec<BucketConfig>) -> Self {
        Self { buckets }
    }

    /// Keeps only the bucket named `name` (case-insensitive).
    /// An empty result is [`SyncError::ObjectNotFound`].
    pub fn filter_by_name(self, name: &str) -> SyncResult<Self> {
        let buckets: Vec<BucketConfig> = self
            .buckets
            .into_iter()
            .filter(|b| names_match(&b.name, name))
            .collect();
        if buckets.is_empty() {
            error!(bucket = name, "No remote bucket matches the requested name");
            return Err(SyncError::ObjectNotFound(name.to_string()));
        }
        Ok(Self { buckets })
    }

    /// Applies `filter_by_name` when a filter is given.
    pub fn narrowed(self, filter: Option<&str>) -> SyncResult<Self> {
        match filter {
            Some(name) => self.filter_by_name(name),
            None => Ok(self),
        }
    }

    /// Exact, case-sensitive existence check.
    pub fn contains(&self, name: &str) -> bool {
        self.buckets.iter().any(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BucketConfig> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
