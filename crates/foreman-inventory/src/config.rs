//! Configuration loading and types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InventoryError, Result};
use crate::groups::GroupPattern;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "FOREMAN_INVENTORY_CONFIG";

/// Top-level configuration, as read from `foreman.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Foreman API settings
    pub foreman: ForemanConfig,
    /// Ansible grouping settings
    #[serde(default)]
    pub ansible: AnsibleConfig,
    /// Cache settings
    pub cache: CacheConfig,
}

/// Foreman API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ForemanConfig {
    /// Base URL of the Foreman server
    pub url: String,
    /// API user
    pub user: String,
    /// API password
    pub password: String,
    /// Verify the server's TLS certificate
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
    /// Page size used when listing hosts
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl std::fmt::Debug for ForemanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForemanConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl_verify", &self.ssl_verify)
            .field("per_page", &self.per_page)
            .finish()
    }
}

fn default_ssl_verify() -> bool {
    true
}

fn default_per_page() -> u32 {
    250
}

/// Ansible grouping settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnsibleConfig {
    /// Templates such as `"{app}-{tier}"` filled from host-group parameters
    #[serde(default)]
    pub group_patterns: Vec<String>,
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the cache files
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Seconds a cache stays fresh
    pub max_age: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Parse configuration from a TOML string
    ///
    /// # Errors
    /// Returns error if the document is malformed or misses a required key
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| InventoryError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load from an explicit path, the environment, or the default locations
    ///
    /// # Errors
    /// Returns error if no configuration file exists or the one found is invalid
    pub fn load_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(&PathBuf::from(path));
        }

        for path in Self::search_paths() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "using configuration file");
                return Self::load(&path);
            }
        }

        Err(InventoryError::Config(format!(
            "no configuration file found (set {CONFIG_ENV} or create foreman.toml)"
        )))
    }

    /// Default configuration locations, most specific first
    #[must_use]
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("foreman.toml"),
            PathBuf::from("/etc/ansible/foreman.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("foreman-inventory/foreman.toml"));
        }
        paths
    }

    /// Validate and turn into the settings the builder runs with
    ///
    /// # Errors
    /// Returns error if the URL is invalid, the user is empty, or a group
    /// pattern is malformed
    pub fn into_settings(self) -> Result<Settings> {
        let url = Url::parse(&self.foreman.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(InventoryError::Config(format!(
                "foreman.url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.foreman.user.is_empty() {
            return Err(InventoryError::Config("foreman.user is empty".to_string()));
        }
        if self.foreman.per_page == 0 {
            return Err(InventoryError::Config(
                "foreman.per_page must be positive".to_string(),
            ));
        }

        let group_patterns = self
            .ansible
            .group_patterns
            .iter()
            .map(|p| GroupPattern::parse(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Settings {
            url,
            user: self.foreman.user,
            password: self.foreman.password,
            ssl_verify: self.foreman.ssl_verify,
            per_page: self.foreman.per_page,
            group_patterns,
            cache_path: self.cache.path,
            cache_max_age: self.cache.max_age,
        })
    }
}

/// Validated, immutable settings for one run
#[derive(Clone)]
pub struct Settings {
    /// Foreman base URL
    pub url: Url,
    /// API user
    pub user: String,
    /// API password
    pub password: String,
    /// Verify TLS certificates
    pub ssl_verify: bool,
    /// Hosts page size
    pub per_page: u32,
    /// Parsed group patterns
    pub group_patterns: Vec<GroupPattern>,
    /// Cache directory
    pub cache_path: PathBuf,
    /// Cache max-age in seconds
    pub cache_max_age: u64,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("url", &self.url.as_str())
            .field("user", &self.user)
            .field("ssl_verify", &self.ssl_verify)
            .field("per_page", &self.per_page)
            .field("group_patterns", &self.group_patterns)
            .field("cache_path", &self.cache_path)
            .field("cache_max_age", &self.cache_max_age)
            .finish_non_exhaustive()
    }
}
