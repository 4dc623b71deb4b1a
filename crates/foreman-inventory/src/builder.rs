//! Inventory building: cache-or-fetch decision, grouping, and query serving

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheStore;
use crate::client::ForemanApi;
use crate::config::Settings;
use crate::error::{InventoryError, Result};
use crate::groups::{GroupPattern, hostgroup_label};
use crate::types::{ALL_GROUP, Host, HostGroup, HostGroupId, Params, Snapshot};

/// What the caller wants printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Full inventory with `_meta.hostvars`
    List,
    /// Raw record of one host
    Host(String),
}

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read from the cache files
    Cache,
    /// Fetched from Foreman during this run
    Fetched,
}

/// Per-run host-group lookups, each id fetched at most once
pub struct HostGroupResolver<'a, A: ForemanApi + ?Sized> {
    api: &'a A,
    groups: HashMap<HostGroupId, HostGroup>,
}

impl<'a, A: ForemanApi + ?Sized> HostGroupResolver<'a, A> {
    /// Create an empty resolver
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            groups: HashMap::new(),
        }
    }

    /// Number of host-groups fetched so far
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.groups.len()
    }

    /// Look up a host-group, fetching it on first use
    ///
    /// # Errors
    /// Returns `MissingHostGroup` if Foreman answers 404, or the transport
    /// error otherwise.
    pub async fn group(&mut self, id: HostGroupId) -> Result<&HostGroup> {
        if !self.groups.contains_key(&id) {
            let group = match self.api.hostgroup(id).await {
                Ok(group) => group,
                Err(InventoryError::Api { status: 404, .. }) => {
                    return Err(InventoryError::MissingHostGroup(id));
                }
                Err(e) => return Err(e),
            };
            debug!(%id, name = ?group.name, "fetched host-group");
            self.groups.insert(id, group);
        }

        self.groups
            .get(&id)
            .ok_or(InventoryError::MissingHostGroup(id))
    }

    /// Effective host-group parameters of a host
    ///
    /// Walks the ancestry root to leaf and ends with the host's own group,
    /// so values set closer to the host win.
    ///
    /// # Errors
    /// Returns an error if any group in the chain cannot be fetched.
    pub async fn resolve_params(&mut self, host: &Host) -> Result<Params> {
        let Some(id) = host.hostgroup_id else {
            return Ok(Params::new());
        };

        let mut chain = self.group(id).await?.ancestors()?;
        chain.push(id);

        let mut params = Params::new();
        for gid in chain {
            for param in &self.group(gid).await?.parameters {
                params.insert(param.name.clone(), param.value.clone());
            }
        }

        Ok(params)
    }
}

/// Fetch every host and group it
///
/// Any transport error or unresolvable host-group aborts the whole refresh.
///
/// # Errors
/// Returns an error if Foreman cannot be queried or returns malformed records.
#[instrument(skip_all, fields(patterns = patterns.len()))]
pub async fn refresh<A: ForemanApi + ?Sized>(api: &A, patterns: &[GroupPattern]) -> Result<Snapshot> {
    let records = api.hosts().await?;
    info!(hosts = records.len(), "fetched hosts from foreman");

    let mut resolver = HostGroupResolver::new(api);
    let mut snapshot = Snapshot::default();
    snapshot.inventory.ensure_group(ALL_GROUP);

    for record in records {
        let host = Host::from_record(record)?;

        if let Some(hostgroup) = &host.hostgroup_name {
            snapshot.inventory.push(hostgroup_label(hostgroup), &host.name);
        }

        let params = resolver.resolve_params(&host).await?;
        for pattern in patterns {
            match pattern.render(&params) {
                Some(group) => {
                    snapshot.inventory.push(group, &host.name);
                }
                None => debug!(host = %host.name, %pattern, "pattern skipped, parameter missing"),
            }
        }

        snapshot.inventory.push(ALL_GROUP, &host.name);
        if snapshot.hosts.insert(host.name.clone(), host.record).is_some() {
            warn!(host = %host.name, "duplicate host name, keeping last record");
        }
    }

    info!(
        hosts = snapshot.hosts.len(),
        groups = snapshot.inventory.len(),
        hostgroups = resolver.fetched(),
        "inventory built"
    );

    Ok(snapshot)
}

/// Builds and serves the inventory for one run
pub struct InventoryBuilder<A: ForemanApi> {
    settings: Settings,
    api: A,
    store: CacheStore,
}

impl<A: ForemanApi> InventoryBuilder<A> {
    /// Create a builder
    pub fn new(settings: Settings, api: A, store: CacheStore) -> Self {
        Self {
            settings,
            api,
            store,
        }
    }

    /// Settings in use
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Cache files in use
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Fetch from Foreman and persist both cache files
    ///
    /// # Errors
    /// Returns an error if fetching fails or the cache cannot be written;
    /// nothing is written when fetching fails.
    pub async fn refresh(&self) -> Result<Snapshot> {
        let snapshot = refresh(&self.api, &self.settings.group_patterns).await?;
        self.store.store(&snapshot)?;
        Ok(snapshot)
    }

    /// Current snapshot, from the cache when it is fresh
    ///
    /// # Errors
    /// Returns an error if refreshing fails or a cache file is corrupt.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, force_refresh: bool) -> Result<(Snapshot, Origin)> {
        let max_age = Duration::from_secs(self.settings.cache_max_age);

        if force_refresh {
            info!("cache refresh forced");
        } else if self.store.is_valid(max_age) {
            debug!("using cached inventory");
            return Ok((self.store.load()?, Origin::Cache));
        } else {
            info!("cache missing or expired");
        }

        Ok((self.refresh().await?, Origin::Fetched))
    }

    /// Answer a query
    ///
    /// # Errors
    /// Returns an error if the inventory cannot be fetched or loaded.
    pub async fn run(&self, query: &Query, force_refresh: bool) -> Result<Value> {
        let (snapshot, origin) = self.snapshot(force_refresh).await?;
        match query {
            Query::List => Ok(snapshot.to_list_output()),
            Query::Host(name) => self.host(snapshot, origin, name).await,
        }
    }

    /// Raw record of one host, refreshing once if it is not cached
    async fn host(&self, snapshot: Snapshot, origin: Origin, name: &str) -> Result<Value> {
        if let Some(record) = snapshot.host(name) {
            return Ok(record.clone());
        }

        if origin == Origin::Fetched {
            debug!(host = name, "host not in freshly fetched inventory");
            return Ok(Value::Object(Map::new()));
        }

        info!(host = name, "host not cached, refreshing");
        let snapshot = self.refresh().await?;
        Ok(snapshot
            .host(name)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

/// Render output the way the inventory is printed: two-space indented JSON
/// with sorted keys
///
/// # Errors
/// Returns an error if serialization fails.
pub fn to_pretty_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    struct CountingApi {
        groups: Vec<Value>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ForemanApi for CountingApi {
        async fn hosts(&self) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn hostgroup(&self, id: HostGroupId) -> Result<HostGroup> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.groups
                .iter()
                .find(|g| g["id"] == json!(id.0))
                .map(|g| serde_json::from_value(g.clone()).unwrap())
                .ok_or(InventoryError::Api {
                    status: 404,
                    url: format!("/api/v2/hostgroups/{id}"),
                    message: "not found".to_string(),
                })
        }
    }

    fn api() -> CountingApi {
        CountingApi {
            groups: vec![
                json!({ "id": 1, "ancestry": null, "parameters": [{ "name": "x", "value": "1" }] }),
                json!({ "id": 2, "ancestry": "1", "parameters": [{ "name": "x", "value": "2" }] }),
                json!({ "id": 3, "ancestry": "1/2", "parameters": [] }),
                json!({ "id": 4, "ancestry": "9", "parameters": [] }),
            ],
            calls: AtomicUsize::new(0),
        }
    }

    fn host(group: Option<u64>) -> Host {
        Host::from_record(json!({ "name": "h", "hostgroup_id": group })).unwrap()
    }

    #[tokio::test]
    async fn test_descendant_overrides_ancestor() {
        let api = api();
        let mut resolver = HostGroupResolver::new(&api);

        let params = resolver.resolve_params(&host(Some(3))).await.unwrap();
        assert_eq!(params, serde_json::from_value(json!({ "x": "2" })).unwrap());
    }

    #[tokio::test]
    async fn test_no_hostgroup_no_params() {
        let api = api();
        let mut resolver = HostGroupResolver::new(&api);

        assert!(resolver.resolve_params(&host(None)).await.unwrap().is_empty());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hostgroups_memoized() {
        let api = api();
        let mut resolver = HostGroupResolver::new(&api);

        resolver.resolve_params(&host(Some(3))).await.unwrap();
        resolver.resolve_params(&host(Some(2))).await.unwrap();
        resolver.resolve_params(&host(Some(3))).await.unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.fetched(), 3);
    }

    #[tokio::test]
    async fn test_missing_ancestor_is_fatal() {
        let api = api();
        let mut resolver = HostGroupResolver::new(&api);

        let err = resolver.resolve_params(&host(Some(4))).await.unwrap_err();
        assert!(matches!(err, InventoryError::MissingHostGroup(HostGroupId(9))));
    }

    #[test]
    fn test_pretty_json_sorted() {
        let out = to_pretty_json(&json!({ "b": 1, "_meta": {}, "a": [] })).unwrap();
        assert_eq!(out, "{\n  \"_meta\": {},\n  \"a\": [],\n  \"b\": 1\n}");
    }
}
