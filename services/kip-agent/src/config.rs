//! Configuration for the kip agent.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use kip_compute::{DEFAULT_COMPUTE_URL, DEFAULT_CONTAINER_URL, DEFAULT_METADATA_URL};

use crate::waiter::WaiterConfig;

/// Label selector for the reserved address pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFilter {
    pub label_key: String,
    pub label_value: String,
}

impl AddressFilter {
    pub fn new(label_key: impl Into<String>, label_value: impl Into<String>) -> Self {
        Self {
            label_key: label_key.into(),
            label_value: label_value.into(),
        }
    }

    /// Provider filter expression selecting unattached addresses with the label.
    pub fn expression(&self) -> String {
        format!("(status=RESERVED) AND ({})", self)
    }
}

impl fmt::Display for AddressFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "labels.{}={}", self.label_key, self.label_value)
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Label key reserved addresses must carry.
    pub label_key: String,

    /// Required value of that label.
    pub label_value: String,

    /// Project to use when a request omits one; resolved from the metadata
    /// server when unset.
    pub project_id: Option<String>,

    /// Cluster whose zones this agent serves; resolved from the metadata
    /// server when unset.
    pub cluster_name: Option<String>,

    /// Compute Engine API base URL.
    pub compute_url: String,

    /// Kubernetes Engine API base URL.
    pub container_url: String,

    /// Metadata server base URL.
    pub metadata_url: String,

    /// Static bearer token. Service account tokens from the metadata server
    /// are used when unset.
    pub access_token: Option<String>,

    /// Interval between operation status polls.
    pub poll_interval: Duration,

    /// Upper bound on a single operation wait. `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,

    /// Buffered requests between intake and the worker.
    pub queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let label_key = std::env::var("KIP_LABEL_KEY")
            .context("Missing label key. Set KIP_LABEL_KEY.")?;
        let label_value = std::env::var("KIP_LABEL_VALUE")
            .context("Missing label value. Set KIP_LABEL_VALUE.")?;

        let project_id = non_empty_var("KIP_PROJECT_ID");
        let cluster_name = non_empty_var("KIP_CLUSTER_NAME");

        let compute_url =
            std::env::var("KIP_COMPUTE_URL").unwrap_or_else(|_| DEFAULT_COMPUTE_URL.to_string());
        let container_url = std::env::var("KIP_CONTAINER_URL")
            .unwrap_or_else(|_| DEFAULT_CONTAINER_URL.to_string());
        let metadata_url =
            std::env::var("KIP_METADATA_URL").unwrap_or_else(|_| DEFAULT_METADATA_URL.to_string());

        let access_token = non_empty_var("KIP_ACCESS_TOKEN");

        let poll_interval_ms: u64 = std::env::var("KIP_POLL_INTERVAL_MS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("KIP_POLL_INTERVAL_MS must be an integer (milliseconds).")?
            .unwrap_or(2000);
        let poll_interval = Duration::from_millis(poll_interval_ms.max(10));

        let operation_timeout_secs: u64 = std::env::var("KIP_OPERATION_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("KIP_OPERATION_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(600);
        let operation_timeout =
            (operation_timeout_secs > 0).then(|| Duration::from_secs(operation_timeout_secs));

        let queue_capacity: usize = std::env::var("KIP_QUEUE_CAPACITY")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("KIP_QUEUE_CAPACITY must be an integer.")?
            .unwrap_or(64)
            .max(1);

        let log_level = std::env::var("KIP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            label_key,
            label_value,
            project_id,
            cluster_name,
            compute_url,
            container_url,
            metadata_url,
            access_token,
            poll_interval,
            operation_timeout,
            queue_capacity,
            log_level,
        })
    }

    pub fn filter(&self) -> AddressFilter {
        AddressFilter::new(&self.label_key, &self.label_value)
    }

    pub fn waiter_config(&self) -> WaiterConfig {
        WaiterConfig {
            poll_interval: self.poll_interval,
            max_wait: self.operation_timeout,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_expression() {
        let filter = AddressFilter::new("kip", "reserved");
        assert_eq!(filter.to_string(), "labels.kip=reserved");
        assert_eq!(
            filter.expression(),
            "(status=RESERVED) AND (labels.kip=reserved)"
        );
    }

    #[test]
    fn test_waiter_config_from_config() {
        let config = Config {
            label_key: "kip".to_string(),
            label_value: "reserved".to_string(),
            project_id: None,
            cluster_name: None,
            compute_url: DEFAULT_COMPUTE_URL.to_string(),
            container_url: DEFAULT_CONTAINER_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            access_token: None,
            poll_interval: Duration::from_secs(2),
            operation_timeout: Some(Duration::from_secs(600)),
            queue_capacity: 64,
            log_level: "info".to_string(),
        };

        let waiter = config.waiter_config();
        assert_eq!(waiter.poll_interval, Duration::from_secs(2));
        assert_eq!(waiter.max_wait, Some(Duration::from_secs(600)));
        assert_eq!(config.filter(), AddressFilter::new("kip", "reserved"));
    }
}
