//! Bearer tokens for provider requests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::metadata::MetadataClient;

/// Refresh this long before the metadata server says the token expires.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

/// Source of OAuth bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token, typically injected through the environment.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Service account tokens from the metadata server, cached until near expiry.
pub struct MetadataTokenSource {
    metadata: MetadataClient,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(metadata: MetadataClient) -> Self {
        Self {
            metadata,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.metadata.access_token().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_SLACK);
        debug!(expires_in = fresh.expires_in, "Fetched service account token");

        let value = fresh.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(value)
    }
}
