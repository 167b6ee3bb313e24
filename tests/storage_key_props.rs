//! Property-based tests for key derivation.
//!
//! Storage and partition keys must not depend on the casing a resource ID
//! arrives in, and must never contain a path separator.

use std::sync::Arc;

use proptest::prelude::*;

use rpdb::api::Cluster;
use rpdb::arm::{PartitionKey, ResourceId, StorageKey};
use rpdb::store::MemoryStore;
use rpdb::DbClient;

/// A resource name segment.
fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9-]{0,15}"
}

/// Flip the case of the characters selected by `mask`.
fn recase(s: &str, mask: u64) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            if (mask >> (i % 64)) & 1 == 1 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

fn cluster_path(sub: &str, rg: &str, cluster: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{}",
        sub, rg, cluster
    )
}

proptest! {
    /// Every casing of an ID maps to the same keys.
    #[test]
    fn prop_keys_ignore_case(
        sub in arb_name(),
        rg in arb_name(),
        cluster in arb_name(),
        mask in any::<u64>(),
    ) {
        let path = cluster_path(&sub, &rg, &cluster);
        let original = ResourceId::parse(&path).unwrap();
        let recased = ResourceId::parse(&recase(&path, mask)).unwrap();

        prop_assert_eq!(
            StorageKey::from_resource_id(&original),
            StorageKey::from_resource_id(&recased)
        );
        prop_assert_eq!(
            PartitionKey::from_resource_id(&original),
            PartitionKey::from_resource_id(&recased)
        );
        prop_assert_eq!(&original, &recased);
    }

    /// Storage keys are lowercase, slash-free and accepted back by parse.
    #[test]
    fn prop_storage_key_shape(sub in arb_name(), rg in arb_name(), cluster in arb_name()) {
        let id = ResourceId::parse(&cluster_path(&sub, &rg, &cluster)).unwrap();
        let key = StorageKey::from_resource_id(&id);

        prop_assert!(!key.as_str().contains('/'));
        prop_assert!(key.as_str().starts_with("|subscriptions|"));
        prop_assert_eq!(key.as_str(), key.as_str().to_ascii_lowercase());
        prop_assert_eq!(StorageKey::parse(key.as_str()).unwrap(), key.clone());
        let partition = PartitionKey::from_resource_id(&id);
        prop_assert_eq!(partition.as_str(), sub.to_ascii_lowercase());
    }

    /// Parsing keeps the caller's casing while nesting stays consistent.
    #[test]
    fn prop_parse_preserves_path(sub in arb_name(), rg in arb_name(), cluster in arb_name()) {
        let path = cluster_path(&sub, &rg, &cluster);
        let id = ResourceId::parse(&path).unwrap();
        let group = ResourceId::resource_group(&sub, &rg).unwrap();

        prop_assert_eq!(id.as_str(), path.as_str());
        prop_assert_eq!(id.name(), cluster.as_str());
        prop_assert_eq!(id.resource_group_name(), Some(rg.as_str()));
        prop_assert!(id.is_descendant_of(&group));
        prop_assert_eq!(id.depth(), group.depth() + 4);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A resource stored under one casing is found under any other.
    #[test]
    fn prop_get_any_casing(cluster in arb_name(), mask in any::<u64>()) {
        let db = DbClient::new(Arc::new(MemoryStore::new()));
        let clusters = db.clusters("sub", "rg").unwrap();
        let created = clusters
            .create(&Cluster::new(clusters.make_resource_id(&cluster).unwrap(), "eastus"))
            .unwrap();

        let lookup = ResourceId::parse(&recase(created.id.as_str(), mask)).unwrap();
        let fetched = clusters.get(&lookup).unwrap();
        prop_assert_eq!(fetched.id.as_str(), created.id.as_str());
    }
}
