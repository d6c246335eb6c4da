//! Provider capabilities consumed by the agent.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccessConfig, AddressList, Operation};

/// Regional address listing.
#[async_trait]
pub trait AddressApi: Send + Sync {
    /// List addresses in `region` matching the provider filter expression.
    async fn list_addresses(&self, project: &str, region: &str, filter: &str)
        -> Result<AddressList>;
}

/// Access config mutations on an instance's network interface.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Remove the access config named `config_name` from `network_interface`.
    async fn delete_access_config(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        config_name: &str,
        network_interface: &str,
    ) -> Result<Operation>;

    /// Attach `config` to `network_interface`.
    async fn add_access_config(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        network_interface: &str,
        config: &AccessConfig,
    ) -> Result<Operation>;
}

/// Zonal operation status.
#[async_trait]
pub trait OperationApi: Send + Sync {
    async fn get_zone_operation(&self, project: &str, zone: &str, name: &str)
        -> Result<Operation>;
}

/// Everything an IP replacement needs.
pub trait ComputeApi: AddressApi + InstanceApi + OperationApi {}

impl<T> ComputeApi for T where T: AddressApi + InstanceApi + OperationApi {}
