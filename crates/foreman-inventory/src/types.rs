//! Inventory type definitions

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{InventoryError, Result};

/// Group every host belongs to
pub const ALL_GROUP: &str = "all";

/// Reserved key carrying per-host variables in list output
pub const META_KEY: &str = "_meta";

// ============================================================================
// Foreman records
// ============================================================================

/// Foreman host-group identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostGroupId(pub u64);

impl fmt::Display for HostGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host record as returned by `/api/v2/hosts`
///
/// Only the fields the grouping logic needs are lifted out; the full record
/// is kept verbatim in `record` and is what ends up in the detail cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    /// DNS name
    pub name: String,
    /// Host-group the host is assigned to
    pub hostgroup_id: Option<HostGroupId>,
    /// Display name of the host-group
    pub hostgroup_name: Option<String>,
    /// Raw record
    pub record: Value,
}

impl Host {
    /// Build a host from a raw API record
    ///
    /// # Errors
    /// Returns an error if the record is not an object or has no `name`.
    pub fn from_record(record: Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct HostFields {
            name: String,
            #[serde(default)]
            hostgroup_id: Option<HostGroupId>,
            #[serde(default)]
            hostgroup_name: Option<String>,
        }

        let fields: HostFields = serde_json::from_value(record.clone())
            .map_err(|e| InventoryError::InvalidRecord(format!("host: {e}")))?;

        Ok(Self {
            name: fields.name,
            hostgroup_id: fields.hostgroup_id,
            hostgroup_name: fields.hostgroup_name.filter(|n| !n.is_empty()),
            record,
        })
    }
}

/// Single host-group parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter value (usually a string)
    #[serde(default)]
    pub value: Value,
}

/// Host-group record as returned by `/api/v2/hostgroups/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostGroup {
    /// Identifier
    pub id: HostGroupId,
    /// Name
    #[serde(default)]
    pub name: Option<String>,
    /// Slash separated ancestor ids, root first (`"1/4"`)
    #[serde(default)]
    pub ancestry: Option<String>,
    /// Parameters defined directly on this group
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl HostGroup {
    /// Ancestor ids ordered root to parent
    ///
    /// # Errors
    /// Returns an error if the ancestry path contains a non-numeric segment.
    pub fn ancestors(&self) -> Result<Vec<HostGroupId>> {
        let Some(ancestry) = self.ancestry.as_deref() else {
            return Ok(Vec::new());
        };

        ancestry
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse().map(HostGroupId).map_err(|_| {
                    InventoryError::InvalidRecord(format!(
                        "host-group {}: bad ancestry segment {s:?}",
                        self.id
                    ))
                })
            })
            .collect()
    }
}

/// Resolved host-group parameters for one host
pub type Params = BTreeMap<String, Value>;

/// Page of a Foreman collection endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    /// Records on this page
    #[serde(default)]
    pub results: Vec<Value>,
    /// Number of records matching the query
    #[serde(default)]
    pub subtotal: Option<u64>,
    /// Number of records in the collection
    #[serde(default)]
    pub total: Option<u64>,
}

impl Page {
    /// Number of records the whole query will yield, if reported
    #[must_use]
    pub fn expected(&self) -> Option<u64> {
        self.subtotal.or(self.total)
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Grouped inventory: group name to member host names
///
/// Members keep first-seen order and never repeat. Serializes as a plain
/// `{group: [hosts]}` object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>")]
pub struct Inventory {
    groups: BTreeMap<String, Vec<String>>,
    members: HashMap<String, HashSet<String>>,
}

impl From<BTreeMap<String, Vec<String>>> for Inventory {
    fn from(groups: BTreeMap<String, Vec<String>>) -> Self {
        let mut inventory = Self::new();
        for (group, hosts) in groups {
            inventory.ensure_group(group.clone());
            for host in &hosts {
                inventory.push(group.clone(), host);
            }
        }
        inventory
    }
}

impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.groups.serialize(serializer)
    }
}

impl PartialEq for Inventory {
    fn eq(&self, other: &Self) -> bool {
        self.groups == other.groups
    }
}

impl Eq for Inventory {}

impl Inventory {
    /// Create an empty inventory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group with no members unless it already exists
    pub fn ensure_group(&mut self, group: impl Into<String>) {
        let group = group.into();
        if group == META_KEY {
            warn!("group name {META_KEY} is reserved, ignoring");
            return;
        }
        self.members.entry(group.clone()).or_default();
        self.groups.entry(group).or_default();
    }

    /// Add a host to a group, creating the group if needed
    ///
    /// Returns `false` if the host was already a member or the group name is
    /// reserved.
    pub fn push(&mut self, group: impl Into<String>, host: &str) -> bool {
        let group = group.into();
        if group == META_KEY {
            warn!(host, "group name {META_KEY} is reserved, skipping");
            return false;
        }
        if !self.members.entry(group.clone()).or_default().insert(host.to_string()) {
            return false;
        }
        self.groups.entry(group).or_default().push(host.to_string());
        true
    }

    /// Members of a group
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    /// All groups
    #[must_use]
    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// Number of groups
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if no group exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Everything one refresh produces, or one cache load restores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Grouped inventory index
    pub inventory: Inventory,
    /// Raw host records keyed by name
    pub hosts: Map<String, Value>,
}

impl Snapshot {
    /// Full list output with `_meta.hostvars` attached
    #[must_use]
    pub fn to_list_output(&self) -> Value {
        let mut out: Map<String, Value> = self
            .inventory
            .groups()
            .iter()
            .map(|(group, members)| (group.clone(), Value::from(members.clone())))
            .collect();
        out.entry(ALL_GROUP)
            .or_insert_with(|| Value::Array(Vec::new()));

        let hostvars: Map<String, Value> = self
            .hosts
            .iter()
            .map(|(name, record)| {
                let mut vars = Map::new();
                vars.insert("foreman".to_string(), record.clone());
                (name.clone(), Value::Object(vars))
            })
            .collect();

        let mut meta = Map::new();
        meta.insert("hostvars".to_string(), Value::Object(hostvars));
        out.insert(META_KEY.to_string(), Value::Object(meta));

        Value::Object(out)
    }

    /// Raw record of a single host
    #[must_use]
    pub fn host(&self, name: &str) -> Option<&Value> {
        self.hosts.get(name)
    }
}
