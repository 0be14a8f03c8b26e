//! Local data model: the per-bucket `config.json` and design documents.
//!
//! RAM quota is stored in megabytes locally and in bytes remotely. The two
//! conversion helpers below are the only place the factor lives; they are
//! applied at the pull write boundary and at the create-bucket call site.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::contract::{BucketConfig, NewBucket};

pub const BYTES_PER_MEGABYTE: u64 = 1_048_576;

pub fn bytes_to_megabytes(bytes: u64) -> u64 {
    bytes / BYTES_PER_MEGABYTE
}

pub fn megabytes_to_bytes(megabytes: u64) -> u64 {
    megabytes.saturating_mul(BYTES_PER_MEGABYTE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketType {
    /// Persistent bucket with view support (`membase` on the wire of older clusters).
    #[default]
    #[serde(alias = "membase")]
    Couchbase,
    Memcached,
    Ephemeral,
}

impl BucketType {
    /// Maps a remote bucket-type tag. Unknown tags are treated as persistent buckets.
    pub fn from_remote_tag(tag: &str) -> Self {
        match tag {
            "memcached" => BucketType::Memcached,
            "ephemeral" => BucketType::Ephemeral,
            "membase" | "couchbase" => BucketType::Couchbase,
            other => {
                warn!(bucket_type = other, "Unknown remote bucket type, assuming couchbase");
                BucketType::Couchbase
            }
        }
    }

    pub fn as_remote_tag(&self) -> &'static str {
        match self {
            BucketType::Couchbase => "couchbase",
            BucketType::Memcached => "memcached",
            BucketType::Ephemeral => "ephemeral",
        }
    }

    /// Only persistent buckets carry design documents.
    pub fn supports_views(&self) -> bool {
        matches!(self, BucketType::Couchbase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    None,
    #[default]
    Sasl,
}

impl AuthType {
    pub fn from_remote_tag(tag: &str) -> Self {
        if tag == "sasl" {
            AuthType::Sasl
        } else {
            AuthType::None
        }
    }

    pub fn as_remote_tag(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Sasl => "sasl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfRange {
    pub what: &'static str,
    pub value: u8,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} out of range: {}", self.what, self.value)
    }
}

/// Number of replicas, 0 to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReplicaNumber(u8);

impl ReplicaNumber {
    pub const MAX: u8 = 3;

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for ReplicaNumber {
    fn default() -> Self {
        ReplicaNumber(2)
    }
}

impl TryFrom<u8> for ReplicaNumber {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(ReplicaNumber(value))
        } else {
            Err(OutOfRange { what: "replica number", value })
        }
    }
}

impl From<ReplicaNumber> for u8 {
    fn from(r: ReplicaNumber) -> u8 {
        r.0
    }
}

/// Reader/writer thread count, 2 to 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ThreadNumber(u8);

impl ThreadNumber {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 8;

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for ThreadNumber {
    fn default() -> Self {
        ThreadNumber(2)
    }
}

impl TryFrom<u8> for ThreadNumber {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(ThreadNumber(value))
        } else {
            Err(OutOfRange { what: "thread number", value })
        }
    }
}

impl From<ThreadNumber> for u8 {
    fn from(t: ThreadNumber) -> u8 {
        t.0
    }
}

/// Contents of `<base>/<bucket>/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBucketConfiguration {
    /// Empty means "use the directory name".
    pub name: String,
    pub ram_quota_mb: u64,
    pub bucket_type: BucketType,
    pub replica_number: ReplicaNumber,
    pub index_replicas: bool,
    pub flush_enabled: bool,
    pub auth_type: AuthType,
    pub bucket_password: String,
    pub thread_number: ThreadNumber,
}

impl Default for LocalBucketConfiguration {
    fn default() -> Self {
        Self {
            name: String::new(),
            ram_quota_mb: 100,
            bucket_type: BucketType::default(),
            replica_number: ReplicaNumber::default(),
            index_replicas: false,
            flush_enabled: false,
            auth_type: AuthType::default(),
            bucket_password: String::new(),
            thread_number: ThreadNumber::default(),
        }
    }
}

impl LocalBucketConfiguration {
    /// Builds the local configuration from a remote snapshot, converting bytes to megabytes.
    pub fn from_remote(remote: &BucketConfig) -> Self {
        let replica_number = ReplicaNumber::try_from(remote.replica_number).unwrap_or_else(|e| {
            warn!(bucket = %remote.name, error = %e, "Using default replica number");
            ReplicaNumber::default()
        });
        let thread_number = ThreadNumber::try_from(remote.threads_number).unwrap_or_else(|e| {
            warn!(bucket = %remote.name, error = %e, "Using default thread number");
            ThreadNumber::default()
        });
        Self {
            name: remote.name.clone(),
            ram_quota_mb: bytes_to_megabytes(remote.ram_quota_bytes),
            bucket_type: BucketType::from_remote_tag(&remote.bucket_type),
            replica_number,
            index_replicas: remote.replica_index,
            flush_enabled: remote.flush_enabled,
            auth_type: AuthType::from_remote_tag(&remote.auth_type),
            bucket_password: remote.sasl_password.clone(),
            thread_number,
        }
    }

    /// Field-by-field read of a `config.json` object that failed strict parsing.
    /// Each field that cannot be read keeps its default and is listed in the
    /// returned problems; the other fields, `name` included, are kept.
    pub fn from_json_fields(
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> (Self, Vec<String>) {
        let mut config = Self::default();
        let mut problems = Vec::new();
        read_field(fields, "name", &mut config.name, &mut problems);
        read_field(fields, "ram_quota_mb", &mut config.ram_quota_mb, &mut problems);
        read_field(fields, "bucket_type", &mut config.bucket_type, &mut problems);
        read_field(fields, "replica_number", &mut config.replica_number, &mut problems);
        read_field(fields, "index_replicas", &mut config.index_replicas, &mut problems);
        read_field(fields, "flush_enabled", &mut config.flush_enabled, &mut problems);
        read_field(fields, "auth_type", &mut config.auth_type, &mut problems);
        read_field(fields, "bucket_password", &mut config.bucket_password, &mut problems);
        read_field(fields, "thread_number", &mut config.thread_number, &mut problems);
        (config, problems)
    }

    /// Create-bucket request for `name`. The RAM quota is converted to bytes here and nowhere else.
    pub fn to_create_request(&self, name: &str) -> NewBucket {
        NewBucket {
            name: name.to_string(),
            ram_quota_bytes: megabytes_to_bytes(self.ram_quota_mb),
            bucket_type: self.bucket_type,
            replica_number: self.replica_number.get(),
            replica_index: self.index_replicas,
            flush_enabled: self.flush_enabled,
            auth_type: self.auth_type,
            password: self.bucket_password.clone(),
            thread_number: self.thread_number.get(),
        }
    }
}

fn read_field<T: DeserializeOwned>(
    fields: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    slot: &mut T,
    problems: &mut Vec<String>,
) {
    let Some(value) = fields.get(key) else {
        return;
    };
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => *slot = parsed,
        Err(e) => {
            warn!(field = key, error = %e, "Using default for unreadable config field");
            problems.push(format!("{key}: {e}"));
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ViewBody {
    map: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reduce: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ViewsBody {
    #[serde(default)]
    views: BTreeMap<String, ViewBody>,
}

/// A named set of views; only map functions are carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignDocument {
    pub name: String,
    /// View name to map-function source.
    pub views: BTreeMap<String, String>,
}

impl DesignDocument {
    pub const ID_PREFIX: &'static str = "_design/";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: BTreeMap::new(),
        }
    }

    /// Strips the `_design/` prefix from a remote document id.
    pub fn name_from_id(id: &str) -> &str {
        id.strip_prefix(Self::ID_PREFIX).unwrap_or(id)
    }

    pub fn id(&self) -> String {
        format!("{}{}", Self::ID_PREFIX, self.name)
    }

    /// Body sent to the cluster: `{"views": {"<name>": {"map": "<source>"}}}`.
    pub fn to_json(&self) -> serde_json::Value {
        let body = ViewsBody {
            views: self
                .views
                .iter()
                .map(|(name, map)| {
                    (
                        name.clone(),
                        ViewBody {
                            map: map.clone(),
                            reduce: None,
                        },
                    )
                })
                .collect(),
        };
        serde_json::json!({ "views": body.views })
    }

    /// Parses a design-document body. Reduce functions are dropped.
    pub fn from_json(name: impl Into<String>, body: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let parsed: ViewsBody = serde_json::from_value(body.clone())?;
        Ok(Self {
            name: name.into(),
            views: parsed.views.into_iter().map(|(k, v)| (k, v.map)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(ram: u64) -> BucketConfig {
        BucketConfig {
            name: "beer-sample".into(),
            bucket_type: "membase".into(),
            auth_type: "sasl".into(),
            sasl_password: "secret".into(),
            ram_quota_bytes: ram,
            replica_number: 1,
            replica_index: true,
            flush_enabled: false,
            threads_number: 3,
        }
    }

    #[test]
    fn ram_quota_round_trips_for_whole_megabytes() {
        let bytes = 256 * BYTES_PER_MEGABYTE;
        let local = LocalBucketConfiguration::from_remote(&remote(bytes));
        assert_eq!(local.ram_quota_mb, 256);
        assert_eq!(local.to_create_request("beer-sample").ram_quota_bytes, bytes);
    }

    #[test]
    fn from_remote_maps_every_field() {
        let local = LocalBucketConfiguration::from_remote(&remote(100 * BYTES_PER_MEGABYTE));
        assert_eq!(local.name, "beer-sample");
        assert_eq!(local.bucket_type, BucketType::Couchbase);
        assert_eq!(local.auth_type, AuthType::Sasl);
        assert_eq!(local.bucket_password, "secret");
        assert_eq!(local.replica_number.get(), 1);
        assert!(local.index_replicas);
        assert_eq!(local.thread_number.get(), 3);
    }

    #[test]
    fn out_of_range_remote_values_fall_back_to_defaults() {
        let mut r = remote(0);
        r.replica_number = 9;
        r.threads_number = 1;
        let local = LocalBucketConfiguration::from_remote(&r);
        assert_eq!(local.replica_number, ReplicaNumber::default());
        assert_eq!(local.thread_number, ThreadNumber::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let local: LocalBucketConfiguration = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(local.name, "x");
        assert_eq!(local.ram_quota_mb, 100);
        assert_eq!(local.replica_number.get(), 2);
        assert_eq!(local.thread_number.get(), 2);
        assert_eq!(local.auth_type, AuthType::Sasl);
        assert_eq!(local.bucket_password, "");
    }

    #[test]
    fn invalid_replica_number_is_rejected() {
        let err = serde_json::from_str::<LocalBucketConfiguration>(r#"{"replica_number": 7}"#);
        assert!(err.is_err());
    }

    #[test]
    fn membase_is_an_alias_of_couchbase() {
        let local: LocalBucketConfiguration =
            serde_json::from_str(r#"{"bucket_type": "membase"}"#).unwrap();
        assert_eq!(local.bucket_type, BucketType::Couchbase);
    }

    #[test]
    fn unreadable_fields_keep_defaults_and_the_rest_survives() {
        let value = serde_json::json!({
            "name": "orders",
            "ram_quota_mb": 512,
            "thread_number": 9,
            "bucket_type": "columnar",
            "flush_enabled": true
        });
        let (local, problems) = LocalBucketConfiguration::from_json_fields(value.as_object().unwrap());
        assert_eq!(local.name, "orders");
        assert_eq!(local.ram_quota_mb, 512);
        assert!(local.flush_enabled);
        assert_eq!(local.thread_number, ThreadNumber::default());
        assert_eq!(local.bucket_type, BucketType::Couchbase);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.starts_with("thread_number:")));
        assert!(problems.iter().any(|p| p.starts_with("bucket_type:")));
    }

    #[test]
    fn design_document_body_uses_views_key() {
        let mut doc = DesignDocument::new("by_type");
        doc.views.insert("all".into(), "function (doc, meta) { emit(meta.id); }".into());
        let body = doc.to_json();
        assert_eq!(
            body["views"]["all"]["map"],
            "function (doc, meta) { emit(meta.id); }"
        );
        assert_eq!(body.as_object().unwrap().len(), 1);

        let parsed = DesignDocument::from_json("by_type", &body).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn design_name_strips_prefix() {
        assert_eq!(DesignDocument::name_from_id("_design/dev_orders"), "dev_orders");
        assert_eq!(DesignDocument::name_from_id("orders"), "orders");
    }
}
