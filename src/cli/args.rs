//! CLI argument definitions using clap
//!
//! Commands:
//! - rpdb storage-key <resource-id>
//! - rpdb get <resource-id>
//! - rpdb list <parent-id> [--recursive]
//! - rpdb active-operations <subscription-id>
//! - rpdb list-global <kind>
//! - rpdb change-feed
//!
//! Every command except `storage-key` reads its documents from a fixtures
//! directory into an in-memory store.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rpdb - resource provider document layer tools
#[derive(Parser, Debug)]
#[command(name = "rpdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fixtures directory; overrides the configured one
    #[arg(long, global = true)]
    pub fixtures: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Paging flags shared by listing commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Return a single page of at most this many items
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Resume from a previous page's continuation token
    #[arg(long)]
    pub continuation: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the storage and partition keys for a resource ID
    StorageKey {
        resource_id: String,
    },

    /// Read one document at or below its subscription
    Get {
        resource_id: String,
    },

    /// List documents below a parent resource
    List {
        parent_id: String,

        /// Include every descendant, not only direct children
        #[arg(long)]
        recursive: bool,

        #[command(flatten)]
        page: PageArgs,
    },

    /// List non-terminal operations of a subscription
    ActiveOperations {
        subscription_id: String,

        /// Only operations performing this request (Create, Update, ...)
        #[arg(long)]
        request: Option<String>,

        /// Only operations acting on this resource
        #[arg(long)]
        external_id: Option<String>,

        /// With --external-id, include operations on nested resources
        #[arg(long)]
        nested: bool,
    },

    /// List one resource kind across every partition
    ListGlobal {
        #[arg(value_enum)]
        kind: GlobalKind,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Read the change feed of the resources container
    ChangeFeed {
        /// Restrict to one partition (subscription ID)
        #[arg(long)]
        partition: Option<String>,

        /// Resume from a previous continuation token
        #[arg(long)]
        continuation: Option<String>,

        #[arg(long)]
        max_items: Option<usize>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Subscriptions,
    Clusters,
    NodePools,
    ExternalAuths,
    Operations,
    ActiveOperations,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_paging() {
        let cli = Cli::try_parse_from([
            "rpdb",
            "list",
            "/subscriptions/sub/resourceGroups/rg",
            "--recursive",
            "--page-size",
            "5",
            "--fixtures",
            "/tmp/fx",
        ])
        .unwrap();
        assert_eq!(cli.fixtures, Some(PathBuf::from("/tmp/fx")));
        match cli.command {
            Command::List {
                recursive, page, ..
            } => {
                assert!(recursive);
                assert_eq!(page.page_size, Some(5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_kind() {
        let cli = Cli::try_parse_from(["rpdb", "list-global", "node-pools"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::ListGlobal {
                kind: GlobalKind::NodePools,
                ..
            }
        ));
    }
}
