//! HTTP client for the Foreman API

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Settings;
use crate::error::{InventoryError, Result};
use crate::types::{HostGroup, HostGroupId, Page};

/// Read access to the Foreman records the inventory is built from
#[async_trait]
pub trait ForemanApi: Send + Sync {
    /// All host records, across every page
    async fn hosts(&self) -> Result<Vec<Value>>;

    /// A single host-group
    async fn hostgroup(&self, id: HostGroupId) -> Result<HostGroup>;
}

/// HTTP client for a Foreman server (API v2)
#[derive(Clone)]
pub struct ForemanClient {
    client: Client,
    base_url: Url,
    user: String,
    password: String,
    per_page: u32,
}

impl std::fmt::Debug for ForemanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForemanClient")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}

impl ForemanClient {
    /// Create a client from validated settings
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!settings.ssl_verify)
            .build()?;
        Ok(Self::with_client(settings, client))
    }

    /// Create a client with a custom `reqwest::Client`
    #[must_use]
    pub fn with_client(settings: &Settings, client: Client) -> Self {
        Self {
            client,
            base_url: settings.url.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            per_page: settings.per_page,
        }
    }

    /// Build a full URL below `/api/v2/`
    fn url(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.join(&format!("api/v2/{path}"))
            .map_err(InventoryError::Url)
    }

    /// Perform an authenticated GET and deserialize the response
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(InventoryError::Api {
                status,
                url: url.to_string(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// URL of one page of the hosts collection
    fn hosts_page_url(&self, page: u64) -> Result<Url> {
        let mut url = self.url("hosts")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.per_page.to_string());
        Ok(url)
    }
}

/// Whether paging through the hosts collection should stop
///
/// Stops on an empty page, once `expected` records were collected, or on a
/// short page when Foreman reports no count.
fn is_last_page(expected: Option<u64>, collected: usize, fetched: usize, per_page: u32) -> bool {
    if fetched == 0 {
        return true;
    }
    match expected {
        Some(expected) => collected as u64 >= expected,
        None => fetched < per_page as usize,
    }
}

#[async_trait]
impl ForemanApi for ForemanClient {
    #[instrument(skip(self))]
    async fn hosts(&self) -> Result<Vec<Value>> {
        let mut hosts = Vec::new();
        let mut page = 1;

        loop {
            let batch: Page = self.get(self.hosts_page_url(page)?).await?;
            let expected = batch.expected();
            let fetched = batch.results.len();
            hosts.extend(batch.results);

            debug!(page, fetched, total = hosts.len(), ?expected, "fetched hosts page");

            if is_last_page(expected, hosts.len(), fetched, self.per_page) {
                break;
            }
            page += 1;
        }

        Ok(hosts)
    }

    #[instrument(skip(self))]
    async fn hostgroup(&self, id: HostGroupId) -> Result<HostGroup> {
        let url = self.url(&format!("hostgroups/{id}"))?;
        self.get(url).await
    }
}
