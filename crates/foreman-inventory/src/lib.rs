//! foreman-inventory: Ansible dynamic inventory backed by Foreman
//!
//! Fetches hosts and host-groups from the Foreman API, groups hosts by
//! host-group and by parameter-driven patterns, and caches the result on disk.
//!
//! # Example
//!
//! ```no_run
//! use foreman_inventory::{CacheStore, Config, ForemanClient, InventoryBuilder, Query};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Config::load_default(None)?.into_settings()?;
//! let client = ForemanClient::new(&settings)?;
//! let store = CacheStore::new(&settings.cache_path, "foreman-inventory");
//!
//! let builder = InventoryBuilder::new(settings, client, store);
//! let inventory = builder.run(&Query::List, false).await?;
//! println!("{inventory}");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod groups;
pub mod types;

pub use builder::{HostGroupResolver, InventoryBuilder, Origin, Query, refresh, to_pretty_json};
pub use cache::CacheStore;
pub use client::{ForemanApi, ForemanClient};
pub use config::{Config, Settings};
pub use error::{InventoryError, Result};
pub use groups::{GroupPattern, hostgroup_label, to_safe};
pub use types::{Host, HostGroup, HostGroupId, Inventory, Snapshot};
