use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use couch_sync_core::contract::{
    BucketConfig, BucketHandle, DeleteOutcome, MockBucketHandle, MockCluster, NewBucket,
};
use couch_sync_core::error::{ClientError, SyncError};
use couch_sync_core::model::{DesignDocument, BYTES_PER_MEGABYTE};
use couch_sync_core::push::{push, PushOptions};
use couch_sync_core::report::DiagnosticKind;
use tempfile::tempdir;

fn remote_bucket(name: &str) -> BucketConfig {
    BucketConfig {
        name: name.to_string(),
        bucket_type: "membase".to_string(),
        auth_type: "sasl".to_string(),
        sasl_password: String::new(),
        ram_quota_bytes: 100 * BYTES_PER_MEGABYTE,
        replica_number: 1,
        replica_index: false,
        flush_enabled: false,
        threads_number: 3,
    }
}

fn write_bucket(base: &Path, dir: &str, config: Option<&str>, designs: &[(&str, &[(&str, &str)])]) {
    let bucket_dir = base.join(dir);
    fs::create_dir_all(&bucket_dir).unwrap();
    if let Some(config) = config {
        fs::write(bucket_dir.join("config.json"), config).unwrap();
    }
    for (design, views) in designs {
        let design_dir = bucket_dir.join(design);
        fs::create_dir_all(&design_dir).unwrap();
        for (view, source) in *views {
            fs::write(design_dir.join(format!("{view}.js")), source).unwrap();
        }
    }
}

/// Bucket mock that accepts every call and records inserted design documents.
fn recording_bucket(inserted: Arc<Mutex<Vec<DesignDocument>>>) -> MockBucketHandle {
    let mut bucket = MockBucketHandle::new();
    bucket
        .expect_remove_design_document()
        .returning(|_| Ok(DeleteOutcome::Absent));
    bucket.expect_insert_design_document().returning(move |doc| {
        inserted.lock().unwrap().push(doc.clone());
        Ok(())
    });
    bucket.expect_close().returning(|| Ok(()));
    bucket
}

fn options(base: &Path, bucket: Option<&str>) -> PushOptions {
    PushOptions {
        base_path: base.to_path_buf(),
        bucket: bucket.map(str::to_string),
    }
}

#[tokio::test]
async fn creates_missing_bucket_with_ram_quota_in_bytes() {
    let base = tempdir().unwrap();
    write_bucket(
        base.path(),
        "orders",
        Some(r#"{"ram_quota_mb": 128, "replica_number": 1, "flush_enabled": true}"#),
        &[("by_date", &[("all", "function (doc, meta) { emit(meta.id); }")])],
    );

    let created: Arc<Mutex<Vec<NewBucket>>> = Arc::default();
    let inserted: Arc<Mutex<Vec<DesignDocument>>> = Arc::default();

    let mut cluster = MockCluster::new();
    cluster.expect_list_buckets().returning(|| Ok(vec![]));
    let created_in = created.clone();
    cluster.expect_create_bucket().times(1).returning(move |req| {
        created_in.lock().unwrap().push(req.clone());
        Ok(())
    });
    let inserted_in = inserted.clone();
    cluster
        .expect_open_bucket()
        .withf(|name, password| name == "orders" && password.is_none())
        .times(1)
        .returning(move |_, _| Ok(Box::new(recording_bucket(inserted_in.clone())) as Box<dyn BucketHandle>));

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();

    let created = created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "orders");
    assert_eq!(created[0].ram_quota_bytes, 128 * 1_048_576);
    assert_eq!(created[0].replica_number, 1);
    assert!(created[0].flush_enabled);
    assert_eq!(report.created_buckets, vec!["orders".to_string()]);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(inserted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn existing_bucket_is_not_recreated() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "users", Some("{}"), &[]);

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("users")]));
    cluster.expect_create_bucket().times(0);
    cluster.expect_open_bucket().times(0);

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();
    assert!(report.created_buckets.is_empty());
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn remote_views_equal_local_js_files_after_push() {
    let base = tempdir().unwrap();
    write_bucket(
        base.path(),
        "catalog",
        Some("{}"),
        &[(
            "products",
            &[
                ("by_sku", "function (d) { emit(d.sku); }"),
                ("by_price", "function (d) {\n  emit(d.price, null);\n}\n"),
            ],
        )],
    );
    fs::write(base.path().join("catalog/products/README.md"), "not a view").unwrap();

    let removed: Arc<Mutex<Vec<String>>> = Arc::default();
    let inserted: Arc<Mutex<Vec<DesignDocument>>> = Arc::default();

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("catalog")]));
    let (removed_in, inserted_in) = (removed.clone(), inserted.clone());
    cluster.expect_open_bucket().returning(move |_, _| {
        let mut bucket = MockBucketHandle::new();
        let removed = removed_in.clone();
        let removed_seen = removed_in.clone();
        let inserted = inserted_in.clone();
        bucket.expect_remove_design_document().returning(move |name| {
            removed.lock().unwrap().push(name.to_string());
            Ok(DeleteOutcome::Deleted)
        });
        bucket.expect_insert_design_document().returning(move |doc| {
            assert!(
                removed_seen.lock().unwrap().contains(&doc.name),
                "design {} inserted before removal",
                doc.name
            );
            inserted.lock().unwrap().push(doc.clone());
            Ok(())
        });
        bucket.expect_close().returning(|| Ok(()));
        Ok(Box::new(bucket) as Box<dyn BucketHandle>)
    });

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();

    assert_eq!(removed.lock().unwrap().as_slice(), ["products".to_string()]);
    let inserted = inserted.lock().unwrap();
    assert_eq!(inserted.len(), 1);
    let views: Vec<&String> = inserted[0].views.keys().collect();
    assert_eq!(views, vec!["by_price", "by_sku"]);
    assert_eq!(inserted[0].views["by_price"], "function (d) {\n  emit(d.price, null);\n}\n");
    assert_eq!(
        report.replaced_designs,
        vec![("catalog".to_string(), "products".to_string())]
    );
}

#[tokio::test]
async fn not_found_on_remove_is_benign() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "logs", Some("{}"), &[("errors", &[("by_level", "function (d) {}")])]);

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("logs")]));
    cluster.expect_open_bucket().returning(|_, _| {
        let mut bucket = MockBucketHandle::new();
        bucket
            .expect_remove_design_document()
            .returning(|name| Err(ClientError::NotFound(name.to_string())));
        bucket.expect_insert_design_document().times(1).returning(|_| Ok(()));
        bucket.expect_close().returning(|| Ok(()));
        Ok(Box::new(bucket) as Box<dyn BucketHandle>)
    });

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(report.replaced_designs.len(), 1);
}

#[tokio::test]
async fn missing_config_skips_bucket_with_warning() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "orphan", None, &[("d", &[("v", "function () {}")])]);

    let mut cluster = MockCluster::new();
    cluster.expect_list_buckets().returning(|| Ok(vec![]));
    cluster.expect_create_bucket().times(0);
    cluster.expect_open_bucket().times(0);

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::MissingConfiguration);
    assert_eq!(report.diagnostics[0].subject, "orphan");
}

#[tokio::test]
async fn malformed_config_reports_and_continues_with_defaults() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "broken", Some("{ this is not json"), &[]);

    let created: Arc<Mutex<Vec<NewBucket>>> = Arc::default();
    let mut cluster = MockCluster::new();
    cluster.expect_list_buckets().returning(|| Ok(vec![]));
    let created_in = created.clone();
    cluster.expect_create_bucket().returning(move |req| {
        created_in.lock().unwrap().push(req.clone());
        Ok(())
    });

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::ParseError);
    let created = created.lock().unwrap();
    assert_eq!(created[0].name, "broken");
    assert_eq!(created[0].ram_quota_bytes, 100 * BYTES_PER_MEGABYTE);
    assert_eq!(created[0].replica_number, 2);
    assert_eq!(created[0].thread_number, 2);
}

#[tokio::test]
async fn unreadable_field_keeps_configured_name_and_target_bucket() {
    let base = tempdir().unwrap();
    write_bucket(
        base.path(),
        "orders-local",
        Some(r#"{"name": "orders", "thread_number": 9, "bucket_type": "membase"}"#),
        &[("by_customer", &[("all", "function (d) { emit(d.customer); }")])],
    );

    let inserted: Arc<Mutex<Vec<DesignDocument>>> = Arc::default();
    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("orders")]));
    cluster.expect_create_bucket().times(0);
    let inserted_in = inserted.clone();
    cluster
        .expect_open_bucket()
        .withf(|name, _| name == "orders")
        .times(1)
        .returning(move |_, _| Ok(Box::new(recording_bucket(inserted_in.clone())) as Box<dyn BucketHandle>));

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();

    assert!(report.created_buckets.is_empty());
    assert_eq!(
        report.replaced_designs,
        vec![("orders".to_string(), "by_customer".to_string())]
    );
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::ParseError);
    assert!(report.diagnostics[0].message.contains("thread_number"));
    assert_eq!(inserted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn configured_name_overrides_directory_name() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "folder", Some(r#"{"name": "RealName"}"#), &[]);

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("RealName")]));
    cluster.expect_create_bucket().times(0);

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();
    assert!(report.created_buckets.is_empty());
}

#[tokio::test]
async fn failures_are_reported_per_bucket_and_design() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "alpha", Some("{}"), &[("d1", &[("v", "function () {}")])]);
    write_bucket(
        base.path(),
        "beta",
        Some("{}"),
        &[
            ("bad", &[("v", "function () {}")]),
            ("good", &[("v", "function () {}")]),
        ],
    );

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("beta")]));
    cluster
        .expect_create_bucket()
        .withf(|req| req.name == "alpha")
        .returning(|_| Err(ClientError::Rejected { status: 400, body: "ramQuotaMB too small".into() }));
    cluster
        .expect_open_bucket()
        .withf(|name, _| name == "alpha")
        .returning(|name, _| Err(ClientError::NotFound(name.to_string())));
    cluster
        .expect_open_bucket()
        .withf(|name, _| name == "beta")
        .returning(|_, _| {
            let mut bucket = MockBucketHandle::new();
            bucket
                .expect_remove_design_document()
                .returning(|_| Ok(DeleteOutcome::Deleted));
            bucket
                .expect_insert_design_document()
                .withf(|doc| doc.name == "bad")
                .returning(|_| Err(ClientError::Rejected { status: 400, body: "invalid view".into() }));
            bucket
                .expect_insert_design_document()
                .withf(|doc| doc.name == "good")
                .returning(|_| Ok(()));
            bucket.expect_close().returning(|| Ok(()));
            Ok(Box::new(bucket) as Box<dyn BucketHandle>)
        });

    let report = push(&cluster, &options(base.path(), None)).await.unwrap();

    let kinds: Vec<(DiagnosticKind, &str)> = report
        .diagnostics
        .iter()
        .map(|d| (d.kind, d.subject.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (DiagnosticKind::WriteFailure, "alpha"),
            (DiagnosticKind::BucketUnavailable, "alpha"),
            (DiagnosticKind::WriteFailure, "beta/bad"),
        ]
    );
    assert_eq!(
        report.replaced_designs,
        vec![("beta".to_string(), "good".to_string())]
    );
}

#[tokio::test]
async fn bucket_filter_is_applied_to_remote_and_local_sides() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "Orders", Some("{}"), &[]);
    write_bucket(base.path(), "users", Some("{}"), &[]);

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("orders"), remote_bucket("users")]));
    // "Orders" folder matches the filter but is not an exact remote match.
    cluster
        .expect_create_bucket()
        .withf(|req| req.name == "Orders")
        .times(1)
        .returning(|_| Ok(()));

    let report = push(&cluster, &options(base.path(), Some("ORDERS"))).await.unwrap();
    assert_eq!(report.created_buckets, vec!["Orders".to_string()]);
}

#[tokio::test]
async fn unmatched_filter_is_object_not_found() {
    let base = tempdir().unwrap();
    write_bucket(base.path(), "orders", Some("{}"), &[]);

    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Ok(vec![remote_bucket("users")]));
    cluster.expect_create_bucket().times(0);

    let err = push(&cluster, &options(base.path(), Some("orders")))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ObjectNotFound(ref name) if name == "orders"));
}

#[tokio::test]
async fn unreachable_cluster_aborts() {
    let base = tempdir().unwrap();
    let mut cluster = MockCluster::new();
    cluster
        .expect_list_buckets()
        .returning(|| Err(ClientError::Transport("connection refused".into())));

    let err = push(&cluster, &options(base.path(), None)).await.unwrap_err();
    assert!(matches!(err, SyncError::Connection(_)));
}
