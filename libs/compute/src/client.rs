//! REST client for Compute Engine and Kubernetes Engine.
//!
//! Provides:
//! - Address listing with server-side filters
//! - Access config delete / add on instances
//! - Zonal operation lookups
//! - Cluster location discovery

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::api::{AddressApi, InstanceApi, OperationApi};
use crate::auth::TokenSource;
use crate::error::{ComputeError, Result};
use crate::types::{AccessConfig, AddressList, Cluster, ClusterList, Operation};

pub const DEFAULT_COMPUTE_URL: &str = "https://compute.googleapis.com/compute/v1";
pub const DEFAULT_CONTAINER_URL: &str = "https://container.googleapis.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Compute Engine API client.
pub struct GceClient {
    client: reqwest::Client,
    compute_url: String,
    container_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl GceClient {
    /// Create a client against the given API endpoints.
    pub fn with_endpoints(
        tokens: Arc<dyn TokenSource>,
        compute_url: impl Into<String>,
        container_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            compute_url: compute_url.into().trim_end_matches('/').to_string(),
            container_url: container_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Zones (locations) of the cluster named `cluster_name`.
    ///
    /// The name comparison ignores case.
    pub async fn list_cluster_locations(
        &self,
        project: &str,
        cluster_name: &str,
    ) -> Result<Vec<String>> {
        let url = format!("{}/projects/{}/zones/-/clusters", self.container_url, project);
        debug!(url = %url, "Listing clusters");

        let list: ClusterList = self.get_json(&url, &[]).await?;
        let cluster: Option<Cluster> = list
            .clusters
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(cluster_name));

        match cluster {
            Some(cluster) => {
                debug!(
                    cluster = %cluster.name,
                    status = %cluster.status,
                    master_version = %cluster.current_master_version,
                    locations = ?cluster.locations,
                    "Found cluster"
                );
                Ok(cluster.locations)
            }
            None => Err(ComputeError::ClusterNotFound(cluster_name.to_string())),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.tokens.token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        decode(response, url).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&AccessConfig>,
    ) -> Result<T> {
        let token = self.tokens.token().await?;
        let mut request = self.client.post(url).bearer_auth(token).query(query);
        request = match body {
            Some(body) => request.json(body),
            None => request.body(""),
        };
        let response = request.send().await?;
        decode(response, url).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, url = %url, body = %body, "Provider request failed");
        return Err(ComputeError::Api { status, body });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl AddressApi for GceClient {
    async fn list_addresses(
        &self,
        project: &str,
        region: &str,
        filter: &str,
    ) -> Result<AddressList> {
        let url = format!(
            "{}/projects/{}/regions/{}/addresses",
            self.compute_url, project, region
        );
        debug!(url = %url, filter = %filter, "Listing addresses");

        let mut all = AddressList::default();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("filter", filter)];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: AddressList = self.get_json(&url, &query).await?;
            all.items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = all.items.len(), "Listed addresses");
        Ok(all)
    }
}

#[async_trait]
impl InstanceApi for GceClient {
    async fn delete_access_config(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        config_name: &str,
        network_interface: &str,
    ) -> Result<Operation> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances/{}/deleteAccessConfig",
            self.compute_url, project, zone, instance
        );
        debug!(url = %url, access_config = %config_name, nic = %network_interface, "Deleting access config");

        self.post_json(
            &url,
            &[
                ("accessConfig", config_name),
                ("networkInterface", network_interface),
            ],
            None,
        )
        .await
    }

    async fn add_access_config(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        network_interface: &str,
        config: &AccessConfig,
    ) -> Result<Operation> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances/{}/addAccessConfig",
            self.compute_url, project, zone, instance
        );
        debug!(url = %url, nat_ip = %config.nat_ip, nic = %network_interface, "Adding access config");

        self.post_json(&url, &[("networkInterface", network_interface)], Some(config))
            .await
    }
}

#[async_trait]
impl OperationApi for GceClient {
    async fn get_zone_operation(&self, project: &str, zone: &str, name: &str) -> Result<Operation> {
        let url = format!(
            "{}/projects/{}/zones/{}/operations/{}",
            self.compute_url, project, zone, name
        );
        self.get_json(&url, &[]).await
    }
}
