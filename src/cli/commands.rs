//! CLI command implementations
//!
//! Each command builds a [`DbClient`] over an in-memory store loaded from
//! the fixtures directory, runs one engine call and returns the JSON
//! payload for the response.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::api::OperationRequest;
use crate::arm::{PartitionKey, ResourceId, StorageKey};
use crate::client::DbClient;
use crate::config::Config;
use crate::crud::{ListOptions, ResourceIter};
use crate::document::{encode, Resource};
use crate::errors::{DbError, DbResult};
use crate::observability::InstrumentedStore;
use crate::operations::ActiveOperationFilter;
use crate::store::{ChangeFeedRequest, ChangeFeedStart, MemoryStore};

use super::args::{Cli, Command, GlobalKind, PageArgs};
use super::errors::{CliError, CliResult};

/// Execute a parsed command line and return the response payload.
pub fn run_command(cli: Cli) -> CliResult<Value> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let fixtures_dir = cli.fixtures.clone().or_else(|| config.fixtures_dir.clone());
    let fixtures = fixtures_dir.as_deref();

    match cli.command {
        Command::StorageKey { resource_id } => storage_key(&resource_id),
        Command::Get { resource_id } => {
            with_client(&config, fixtures, |client| get(client, &resource_id))
        }
        Command::List {
            parent_id,
            recursive,
            page,
        } => with_client(&config, fixtures, |client| {
            list(client, &parent_id, recursive, &page)
        }),
        Command::ActiveOperations {
            subscription_id,
            request,
            external_id,
            nested,
        } => with_client(&config, fixtures, |client| {
            active_operations(
                client,
                &subscription_id,
                request.as_deref(),
                external_id.as_deref(),
                nested,
            )
        }),
        Command::ListGlobal { kind, page } => {
            with_client(&config, fixtures, |client| list_global(client, kind, &page))
        }
        Command::ChangeFeed {
            partition,
            continuation,
            max_items,
        } => with_client(&config, fixtures, |client| {
            change_feed(client, partition.as_deref(), continuation, max_items)
        }),
    }
}

/// Storage and partition keys a resource ID maps to
pub fn storage_key(resource_id: &str) -> CliResult<Value> {
    let id = parse_id(resource_id)?;
    Ok(json!({
        "resourceId": id.as_str(),
        "resourceType": id.resource_type().to_string(),
        "storageKey": StorageKey::from_resource_id(&id).as_str(),
        "partitionKey": PartitionKey::from_resource_id(&id).as_str(),
    }))
}

pub fn get(client: &DbClient, resource_id: &str) -> CliResult<Value> {
    let id = parse_id(resource_id)?;
    let scope = ResourceId::subscription(id.subscription_id()).map_err(DbError::from)?;
    let doc = client.untyped(&scope).get(&id)?;
    Ok(serde_json::to_value(doc)?)
}

pub fn list(
    client: &DbClient,
    parent_id: &str,
    recursive: bool,
    page: &PageArgs,
) -> CliResult<Value> {
    let parent = parse_id(parent_id)?;
    let untyped = client.untyped(&parent);
    let options = list_options(page);
    let iter = if recursive {
        untyped.list_recursive(&options)?
    } else {
        untyped.list(&options)?
    };
    page_json(iter, |doc| Ok(serde_json::to_value(doc)?))
}

pub fn active_operations(
    client: &DbClient,
    subscription_id: &str,
    request: Option<&str>,
    external_id: Option<&str>,
    nested: bool,
) -> CliResult<Value> {
    let filter = ActiveOperationFilter {
        request: request
            .map(|r| r.parse::<OperationRequest>().map_err(CliError::usage))
            .transpose()?,
        external_id: external_id.map(parse_id).transpose()?,
        include_nested: nested,
    };
    let iter = client
        .operations(subscription_id)?
        .list_active_operations(&filter)?;
    page_json(iter, |op| encode(&op))
}

pub fn list_global(client: &DbClient, kind: GlobalKind, page: &PageArgs) -> CliResult<Value> {
    let listers = client.global_listers();
    let options = list_options(page);
    match kind {
        GlobalKind::Subscriptions => page_json(listers.subscriptions().list(&options)?, encode_any),
        GlobalKind::Clusters => page_json(listers.clusters().list(&options)?, encode_any),
        GlobalKind::NodePools => page_json(listers.node_pools().list(&options)?, encode_any),
        GlobalKind::ExternalAuths => {
            page_json(listers.external_auths().list(&options)?, encode_any)
        }
        GlobalKind::Operations => page_json(listers.operations().list(&options)?, encode_any),
        GlobalKind::ActiveOperations => {
            page_json(listers.active_operations().list(&options)?, encode_any)
        }
    }
}

pub fn change_feed(
    client: &DbClient,
    partition: Option<&str>,
    continuation: Option<String>,
    max_items: Option<usize>,
) -> CliResult<Value> {
    let request = ChangeFeedRequest {
        partition: partition
            .map(PartitionKey::new)
            .transpose()
            .map_err(DbError::from)?,
        start: continuation
            .map(ChangeFeedStart::Continuation)
            .unwrap_or(ChangeFeedStart::Beginning),
        max_items,
    };
    let page = client.resources_change_feed(&request)?;
    Ok(json!({
        "documents": page.documents,
        "continuation": page.continuation,
    }))
}

/// Run `command` against the fixtures store, then log its store traffic.
fn with_client<F>(config: &Config, fixtures: Option<&Path>, command: F) -> CliResult<Value>
where
    F: FnOnce(&DbClient) -> CliResult<Value>,
{
    let dir: PathBuf = fixtures
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            CliError::usage("no fixtures directory; pass --fixtures or set fixtures_dir")
        })?;
    let store = MemoryStore::new();
    let loaded = store.load_from_directory(&dir)?;
    let container = config.resources_label();
    info!(dir = %dir.display(), container = %container, documents = loaded, "loaded fixtures");

    let store = Arc::new(InstrumentedStore::new(store).with_container(container));
    let client = DbClient::from_config(config, store.clone(), None)?;
    let result = command(&client);
    debug!(metrics = %store.metrics().to_json(), "store calls");
    result
}

fn parse_id(raw: &str) -> CliResult<ResourceId> {
    Ok(ResourceId::parse(raw).map_err(DbError::from)?)
}

fn list_options(page: &PageArgs) -> ListOptions {
    ListOptions {
        page_size_hint: page.page_size,
        continuation_token: page.continuation.clone(),
    }
}

fn encode_any<R: Resource>(resource: R) -> DbResult<Value> {
    encode(&resource)
}

fn page_json<T>(
    mut iter: ResourceIter<T>,
    to_json: impl Fn(T) -> DbResult<Value>,
) -> CliResult<Value> {
    let items = iter
        .by_ref()
        .map(|item| item.and_then(&to_json))
        .collect::<DbResult<Vec<Value>>>()?;
    Ok(json!({
        "items": items,
        "continuationToken": iter.continuation_token(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    const CLUSTER: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/c1";

    fn fixtures() -> TempDir {
        let dir = TempDir::new().unwrap();
        let cluster = json!({
            "id": "4c1e8f0a-0b7e-4d43-9a51-8f0d5d1f2a11",
            "resourceType": "Microsoft.RedHatOpenShift/hcpOpenShiftClusters",
            "resourceId": CLUSTER,
            "partitionKey": "sub",
            "properties": {"resourceId": CLUSTER, "internalState": {"location": "eastus"}}
        });
        fs::create_dir_all(dir.path().join("clusters")).unwrap();
        fs::write(dir.path().join("clusters/c1.json"), cluster.to_string()).unwrap();
        fs::write(dir.path().join("README.md"), "not a fixture").unwrap();
        dir
    }

    fn run(dir: &TempDir, args: &[&str]) -> CliResult<Value> {
        let fixtures = dir.path().to_string_lossy().to_string();
        let mut argv = vec!["rpdb", "--fixtures", fixtures.as_str()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_storage_key() {
        let out = storage_key(CLUSTER).unwrap();
        assert_eq!(out["partitionKey"], json!("sub"));
        assert_eq!(
            out["storageKey"],
            json!("|subscriptions|sub|resourcegroups|rg|providers|microsoft.redhatopenshift|hcpopenshiftclusters|c1")
        );
    }

    #[test]
    fn test_get_from_fixtures() {
        let dir = fixtures();
        let out = run(&dir, &["get", CLUSTER]).unwrap();
        assert_eq!(out["resourceId"], json!(CLUSTER));
    }

    #[test]
    fn test_list_children() {
        let dir = fixtures();
        let out = run(&dir, &["list", "/subscriptions/sub/resourceGroups/rg"]).unwrap();
        assert_eq!(out["items"].as_array().unwrap().len(), 1);
        assert!(out["continuationToken"].is_null());
    }

    #[test]
    fn test_list_global_clusters() {
        let dir = fixtures();
        let out = run(&dir, &["list-global", "clusters"]).unwrap();
        let items = out["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["properties"]["internalState"]["location"], json!("eastus"));
    }

    #[test]
    fn test_missing_fixtures_is_usage_error() {
        let cli = Cli::try_parse_from(["rpdb", "get", CLUSTER]).unwrap();
        assert!(matches!(run_command(cli), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_change_feed_from_beginning() {
        let dir = fixtures();
        let out = run(&dir, &["change-feed"]).unwrap();
        assert_eq!(out["documents"].as_array().unwrap().len(), 1);
        assert!(out["continuation"].is_string());
    }
}
