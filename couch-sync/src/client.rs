#![doc = "REST client for the cluster: implements the core `Cluster` and `BucketHandle` traits over HTTP."]
//
//! # Cluster REST client
//!
//! This module bridges the pipelines in [`couch_sync_core`] to a live cluster.
//! It wires the [`Cluster`] and [`BucketHandle`] traits to the cluster's HTTP
//! API:
//!
//! - management API (server URL host and port, usually 8091): buckets, design
//!   document listing, document reads;
//! - views API (same host on the views port, usually 8092): design document
//!   insert/remove and view queries.
//!
//! Every request uses HTTP basic authentication, either with the
//! administrative credentials or with the bucket name and bucket password.
//! Response parsing lives in small pure functions so it can be tested without
//! a server.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use couch_sync_core::config::{ConnectionSettings, Credentials};
use couch_sync_core::contract::{
    BucketConfig, BucketHandle, Cluster, DeleteOutcome, NewBucket, ViewRow,
};
use couch_sync_core::error::ClientError;
use couch_sync_core::model::{bytes_to_megabytes, DesignDocument};

/// Base URLs of the two APIs the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    management: Url,
    views: Url,
}

impl Endpoints {
    /// Derives both roots from a server URL such as `http://localhost:8091/pools`.
    /// Path, query and fragment are dropped.
    pub fn from_server_url(server_url: &str, views_port: u16) -> anyhow::Result<Self> {
        let mut management = Url::parse(server_url)
            .map_err(|e| anyhow::anyhow!("invalid server url {server_url:?}: {e}"))?;
        if management.cannot_be_a_base() || !matches!(management.scheme(), "http" | "https") {
            anyhow::bail!("server url must be an http(s) url: {server_url}");
        }
        management.set_path("/");
        management.set_query(None);
        management.set_fragment(None);

        let mut views = management.clone();
        views
            .set_port(Some(views_port))
            .map_err(|_| anyhow::anyhow!("cannot set views port on {server_url}"))?;

        Ok(Self { management, views })
    }

    pub fn management(&self, segments: &[&str]) -> Url {
        join(&self.management, segments)
    }

    pub fn views(&self, segments: &[&str]) -> Url {
        join(&self.views, segments)
    }
}

/// Appends percent-encoded path segments.
fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn with_auth(req: RequestBuilder, auth: Option<&Credentials>) -> RequestBuilder {
    match auth {
        Some(c) => req.basic_auth(&c.username, Some(&c.password)),
        None => req,
    }
}

/// Sends the request and maps non-success statuses onto [`ClientError`].
async fn send(req: RequestBuilder, what: &str) -> Result<Response, ClientError> {
    let resp = req
        .send()
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), what, body = %body, "Request rejected");
    Err(status_error(status, what, body))
}

fn status_error(status: StatusCode, what: &str, body: String) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(what.to_string()),
        StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
        _ => ClientError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}

async fn read_text(resp: Response) -> Result<String, ClientError> {
    resp.text()
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))
}

fn decode_err(e: serde_json::Error) -> ClientError {
    ClientError::Decode(e.to_string())
}

#[derive(Debug, Default, Deserialize)]
struct WireQuota {
    #[serde(default)]
    ram: u64,
}

#[derive(Debug, Default, Deserialize)]
struct WireControllers {
    #[serde(default)]
    flush: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBucket {
    name: String,
    #[serde(default)]
    bucket_type: String,
    #[serde(default)]
    auth_type: String,
    #[serde(default)]
    sasl_password: String,
    #[serde(default)]
    quota: WireQuota,
    #[serde(default)]
    replica_number: u8,
    #[serde(default)]
    replica_index: bool,
    #[serde(default)]
    threads_number: u8,
    #[serde(default)]
    controllers: WireControllers,
}

/// Parses the body of `GET /pools/default/buckets`.
pub fn parse_bucket_list(body: &str) -> Result<Vec<BucketConfig>, ClientError> {
    let wire: Vec<WireBucket> = serde_json::from_str(body).map_err(decode_err)?;
    Ok(wire
        .into_iter()
        .map(|b| BucketConfig {
            name: b.name,
            bucket_type: b.bucket_type,
            auth_type: b.auth_type,
            sasl_password: b.sasl_password,
            ram_quota_bytes: b.quota.ram,
            replica_number: b.replica_number,
            replica_index: b.replica_index,
            flush_enabled: b.controllers.flush.is_some(),
            threads_number: b.threads_number,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct WireMeta {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireDesignDoc {
    meta: WireMeta,
    #[serde(default)]
    json: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireDesignRow {
    doc: WireDesignDoc,
}

#[derive(Debug, Default, Deserialize)]
struct WireDesignList {
    #[serde(default)]
    rows: Vec<WireDesignRow>,
}

/// Parses the body of `GET /pools/default/buckets/<bucket>/ddocs`.
pub fn parse_design_documents(body: &str) -> Result<Vec<DesignDocument>, ClientError> {
    let wire: WireDesignList = serde_json::from_str(body).map_err(decode_err)?;
    wire.rows
        .into_iter()
        .map(|row| {
            let name = DesignDocument::name_from_id(&row.doc.meta.id).to_string();
            if row.doc.json.is_null() {
                return Ok(DesignDocument::new(name));
            }
            DesignDocument::from_json(name, &row.doc.json).map_err(decode_err)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct WireViewRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    key: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireViewResult {
    #[serde(default)]
    rows: Vec<WireViewRow>,
}

/// Parses a view query response.
pub fn parse_view_rows(body: &str) -> Result<Vec<ViewRow>, ClientError> {
    let wire: WireViewResult = serde_json::from_str(body).map_err(decode_err)?;
    Ok(wire
        .rows
        .into_iter()
        .map(|r| ViewRow { id: r.id, key: r.key })
        .collect())
}

/// Extracts the document body from a document read (`{"meta": .., "json": ..}`).
pub fn parse_document(body: &str) -> Result<serde_json::Value, ClientError> {
    let mut value: serde_json::Value = serde_json::from_str(body).map_err(decode_err)?;
    match value.get_mut("json") {
        Some(json) => Ok(json.take()),
        None => Ok(value),
    }
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

/// Cluster-level client holding the administrative credentials.
pub struct RestCluster {
    http: reqwest::Client,
    endpoints: Endpoints,
    admin: Option<Credentials>,
}

impl RestCluster {
    pub fn new(settings: &ConnectionSettings) -> anyhow::Result<Self> {
        let endpoints = Endpoints::from_server_url(&settings.server_url, settings.views_port)?;
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        tracing::info!(
            management = %endpoints.management,
            views = %endpoints.views,
            admin_set = settings.admin.is_some(),
            "Initialized cluster client"
        );
        Ok(Self {
            http,
            endpoints,
            admin: settings.admin.clone(),
        })
    }
}

#[async_trait]
impl Cluster for RestCluster {
    async fn list_buckets(&self) -> Result<Vec<BucketConfig>, ClientError> {
        let url = self.endpoints.management(&["pools", "default", "buckets"]);
        tracing::debug!(%url, "Listing buckets");
        let req = with_auth(self.http.get(url), self.admin.as_ref());
        let body = read_text(send(req, "bucket list").await?).await?;
        parse_bucket_list(&body)
    }

    async fn create_bucket(&self, req: &NewBucket) -> Result<(), ClientError> {
        let url = self.endpoints.management(&["pools", "default", "buckets"]);
        let form = vec![
            ("name", req.name.clone()),
            ("bucketType", req.bucket_type.as_remote_tag().to_string()),
            ("ramQuotaMB", bytes_to_megabytes(req.ram_quota_bytes).to_string()),
            ("replicaNumber", req.replica_number.to_string()),
            ("replicaIndex", flag(req.replica_index)),
            ("flushEnabled", flag(req.flush_enabled)),
            ("authType", req.auth_type.as_remote_tag().to_string()),
            ("saslPassword", req.password.clone()),
            ("threadsNumber", req.thread_number.to_string()),
        ];
        tracing::info!(bucket = %req.name, "Creating bucket");
        let http_req = with_auth(self.http.post(url), self.admin.as_ref()).form(&form);
        send(http_req, &req.name).await?;
        Ok(())
    }

    async fn open_bucket(
        &self,
        name: &str,
        password: Option<String>,
    ) -> Result<Box<dyn BucketHandle>, ClientError> {
        let auth = match password {
            Some(password) => Some(Credentials {
                username: name.to_string(),
                password,
            }),
            None => self.admin.clone(),
        };
        let url = self.endpoints.management(&["pools", "default", "buckets", name]);
        let req = with_auth(self.http.get(url), auth.as_ref());
        send(req, name).await?;
        tracing::debug!(bucket = name, "Opened bucket");
        Ok(Box::new(RestBucket {
            http: self.http.clone(),
            endpoints: self.endpoints.clone(),
            name: name.to_string(),
            auth,
        }))
    }
}

/// One bucket, authenticated either as admin or with the bucket's own secret.
pub struct RestBucket {
    http: reqwest::Client,
    endpoints: Endpoints,
    name: String,
    auth: Option<Credentials>,
}

impl RestBucket {
    fn design_url(&self, design: &str) -> Url {
        self.endpoints
            .views(&[self.name.as_str(), "_design", design])
    }
}

#[async_trait]
impl BucketHandle for RestBucket {
    async fn get_design_documents(&self) -> Result<Vec<DesignDocument>, ClientError> {
        let url = self
            .endpoints
            .management(&["pools", "default", "buckets", &self.name, "ddocs"]);
        let req = with_auth(self.http.get(url), self.auth.as_ref());
        let body = read_text(send(req, &self.name).await?).await?;
        parse_design_documents(&body)
    }

    async fn insert_design_document(&self, doc: &DesignDocument) -> Result<(), ClientError> {
        let req = with_auth(self.http.put(self.design_url(&doc.name)), self.auth.as_ref())
            .json(&doc.to_json());
        send(req, &doc.id()).await?;
        Ok(())
    }

    async fn remove_design_document(&self, name: &str) -> Result<DeleteOutcome, ClientError> {
        let req = with_auth(self.http.delete(self.design_url(name)), self.auth.as_ref());
        match send(req, name).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(ClientError::NotFound(_)) => Ok(DeleteOutcome::Absent),
            Err(e) => Err(e),
        }
    }

    async fn query_view(&self, design: &str, view: &str) -> Result<Vec<ViewRow>, ClientError> {
        let url = self
            .endpoints
            .views(&[self.name.as_str(), "_design", design, "_view", view]);
        let req = with_auth(self.http.get(url), self.auth.as_ref());
        let body = read_text(send(req, &format!("{design}/{view}")).await?).await?;
        parse_view_rows(&body)
    }

    async fn get(&self, key: &str) -> Result<serde_json::Value, ClientError> {
        let url = self
            .endpoints
            .management(&["pools", "default", "buckets", &self.name, "docs", key]);
        let req = with_auth(self.http.get(url), self.auth.as_ref());
        let body = read_text(send(req, key).await?).await?;
        parse_document(&body)
    }

    async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!(bucket = %self.name, "Closed bucket");
        Ok(())
    }
}
