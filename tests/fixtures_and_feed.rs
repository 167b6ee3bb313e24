//! Fixture Loading and Change Feed Tests
//!
//! Fixture directories seed an in-memory store the way integration
//! environments do; the change feed then reports every document once, at
//! its latest version.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use rpdb::api::{Cluster, ProvisioningState};
use rpdb::arm::PartitionKey;
use rpdb::cli::{run_command, Cli};
use rpdb::config::Config;
use rpdb::store::{ChangeFeedRequest, ChangeFeedStart, MemoryStore};
use rpdb::DbClient;

use clap::Parser;

const CLUSTER: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/Dev";

fn write(dir: &TempDir, path: &str, doc: &Value) {
    let full = dir.path().join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
}

fn fixture_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "subscriptions/sub.json",
        &json!({
            "id": "|subscriptions|sub",
            "resourceType": "Microsoft.Resources/subscriptions",
            "resourceId": "/subscriptions/sub",
            "partitionKey": "sub",
            "properties": {"state": "Registered"}
        }),
    );
    write(
        &dir,
        "clusters/dev.json",
        &json!({
            "id": "|SUBSCRIPTIONS|SUB|RESOURCEGROUPS|RG|PROVIDERS|MICROSOFT.REDHATOPENSHIFT|HCPOPENSHIFTCLUSTERS|DEV",
            "resourceType": "Microsoft.RedHatOpenShift/hcpOpenShiftClusters",
            "resourceId": CLUSTER,
            "partitionKey": "sub",
            "properties": {
                "resourceId": CLUSTER,
                "provisioningState": "Succeeded",
                "internalState": {"location": "westus3"}
            }
        }),
    );
    write(&dir, "clusters/notes.txt", &json!("ignored"));
    write(&dir, "drafts/no-id.json", &json!({"resourceId": CLUSTER}));
    dir
}

fn loaded() -> (TempDir, DbClient) {
    let dir = fixture_dir();
    let store = MemoryStore::new();
    assert_eq!(store.load_from_directory(dir.path()).unwrap(), 2);
    (dir, DbClient::new(Arc::new(store)))
}

// =============================================================================
// Fixture Loading
// =============================================================================

/// Loaded fixtures are readable through the typed engines.
#[test]
fn test_fixtures_decode_as_typed_resources() {
    let (_dir, db) = loaded();

    let cluster: Cluster = db.clusters("sub", "rg").unwrap().get_by_name("dev").unwrap();
    assert_eq!(cluster.location, "westus3");
    assert_eq!(cluster.provisioning_state, ProvisioningState::Succeeded);
    assert_eq!(cluster.id.as_str(), CLUSTER);

    let sub = db.subscriptions().get_by_name("sub").unwrap();
    assert!(sub.is_registered());
}

/// A malformed fixture fails the load instead of being skipped.
#[test]
fn test_malformed_fixture_fails_load() {
    let dir = fixture_dir();
    fs::write(dir.path().join("clusters/broken.json"), "{not json").unwrap();
    assert!(MemoryStore::new().load_from_directory(dir.path()).is_err());
}

// =============================================================================
// Change Feed
// =============================================================================

/// Each changed document appears once, at its latest version.
#[test]
fn test_change_feed_reports_latest_versions() {
    let (_dir, db) = loaded();
    let start = db.resources_change_feed(&ChangeFeedRequest::from_beginning()).unwrap();
    assert_eq!(start.documents.len(), 2);

    let clusters = db.clusters("sub", "rg").unwrap();
    let mut cluster = clusters.get_by_name("dev").unwrap();
    cluster.location = "eastus".into();
    let mut cluster = clusters.replace(&cluster).unwrap();
    cluster.provisioning_state = ProvisioningState::Updating;
    clusters.replace(&cluster).unwrap();

    let page = db
        .resources_change_feed(&ChangeFeedRequest::resume(start.continuation.clone()))
        .unwrap();
    assert_eq!(page.documents.len(), 1);
    assert_eq!(page.documents[0]["properties"]["provisioningState"], json!("Updating"));

    let empty = db
        .resources_change_feed(&ChangeFeedRequest::resume(page.continuation.clone()))
        .unwrap();
    assert!(empty.documents.is_empty());
    assert_eq!(empty.continuation, page.continuation);
}

/// The feed can be narrowed to one partition and started from now.
#[test]
fn test_change_feed_partition_and_now() {
    let (_dir, db) = loaded();
    let now = ChangeFeedRequest {
        partition: Some(PartitionKey::new("other").unwrap()),
        start: ChangeFeedStart::Now,
        max_items: None,
    };
    let page = db.resources_change_feed(&now).unwrap();
    assert!(page.documents.is_empty());

    let clusters = db.clusters("sub", "rg2").unwrap();
    clusters
        .create(&Cluster::new(clusters.make_resource_id("c2").unwrap(), "eastus"))
        .unwrap();

    let mut after = ChangeFeedRequest::resume(page.continuation);
    after.partition = Some(PartitionKey::new("sub").unwrap());
    let page = db.resources_change_feed(&after).unwrap();
    assert_eq!(page.documents.len(), 1);
    assert_eq!(
        page.documents[0]["resourceId"],
        json!("/subscriptions/sub/resourceGroups/rg2/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/c2")
    );
}

// =============================================================================
// CLI over Fixtures
// =============================================================================

/// The configured fixtures directory feeds the CLI commands.
#[test]
fn test_cli_uses_configured_fixtures() {
    let dir = fixture_dir();
    let config = Config {
        fixtures_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let config_path = dir.path().join("rpdb.conf");
    fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();
    let config_arg = config_path.to_string_lossy().to_string();

    let cli = Cli::try_parse_from([
        "rpdb",
        "--config",
        config_arg.as_str(),
        "list-global",
        "clusters",
    ])
    .unwrap();
    let out = run_command(cli).unwrap();
    assert_eq!(out["items"].as_array().unwrap().len(), 1);

    let cli = Cli::try_parse_from([
        "rpdb",
        "--config",
        config_arg.as_str(),
        "active-operations",
        "sub",
        "--request",
        "create",
    ])
    .unwrap();
    let out = run_command(cli).unwrap();
    assert!(out["items"].as_array().unwrap().is_empty());
}
