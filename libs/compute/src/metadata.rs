//! Instance metadata server lookups.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ComputeError, Result};

pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");
const CLUSTER_NAME_PATH: &str = "instance/attributes/cluster-name";
const PROJECT_ID_PATH: &str = "project/project-id";
const TOKEN_PATH: &str = "instance/service-accounts/default/token";

/// Access token issued to the instance's default service account.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountToken {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

/// Metadata server client.
#[derive(Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Name of the cluster this node belongs to.
    pub async fn cluster_name(&self) -> Result<String> {
        self.get_text(CLUSTER_NAME_PATH).await
    }

    /// Project the instance runs in.
    pub async fn project_id(&self) -> Result<String> {
        self.get_text(PROJECT_ID_PATH).await
    }

    /// Fresh access token for the default service account.
    pub async fn access_token(&self) -> Result<ServiceAccountToken> {
        let body = self.get_text(TOKEN_PATH).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Querying metadata server");

        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ComputeError::Metadata {
                path: path.to_string(),
                status,
            });
        }

        Ok(response.text().await?.trim().to_string())
    }
}
