//! Swapping an instance's external IP for a reserved address.
//!
//! Sequence for one instance:
//! 1. derive the region from the zone and find a free reserved address
//! 2. delete the `external-nat` access config on `nic0` and wait for it
//! 3. add a one-to-one NAT config bound to the address and wait for it
//!
//! The add is never submitted before the delete is confirmed done: the
//! provider rejects concurrent access config mutations on one interface.
//! Nothing is retried here; a failure after step 2 started leaves the
//! instance without external access, which [`ReplaceError::leaves_instance_detached`]
//! reports.

use std::sync::Arc;

use kip_compute::{AccessConfig, ComputeApi, InstanceApi};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::AddressFilter;
use crate::error::{ReplaceError, Stage};
use crate::finder::AddressFinder;
use crate::waiter::{OperationWaiter, WaiterConfig};

/// Network interface whose access config is replaced.
pub const NETWORK_INTERFACE: &str = "nic0";

/// Name of the ephemeral access config to remove.
pub const EPHEMERAL_ACCESS_CONFIG: &str = "external-nat";

/// Name given to the replacement access config.
pub const RESERVED_ACCESS_CONFIG: &str = "External NAT";

/// Region of `zone`: the zone with its last two characters removed.
///
/// `us-central1-a` becomes `us-central1`. Returns `None` when the zone is
/// shorter than two characters.
pub fn region_from_zone(zone: &str) -> Option<&str> {
    let (cut, _) = zone.char_indices().rev().nth(1)?;
    Some(&zone[..cut])
}

/// Replaces external IPs, one instance at a time.
#[derive(Clone)]
pub struct IpReplacer {
    finder: AddressFinder,
    instances: Arc<dyn InstanceApi>,
    waiter: OperationWaiter,
}

impl IpReplacer {
    pub fn new(finder: AddressFinder, instances: Arc<dyn InstanceApi>, waiter: OperationWaiter) -> Self {
        Self {
            finder,
            instances,
            waiter,
        }
    }

    /// Build a replacer whose collaborators all talk to `api`.
    pub fn from_api<A>(api: Arc<A>, config: WaiterConfig, shutdown: watch::Receiver<bool>) -> Self
    where
        A: ComputeApi + 'static,
    {
        let finder = AddressFinder::new(api.clone());
        let waiter = OperationWaiter::new(api.clone(), config, shutdown);
        Self::new(finder, api, waiter)
    }

    /// Replace the external IP of `instance`, returning the attached address.
    pub async fn replace(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        filter: &AddressFilter,
    ) -> Result<String, ReplaceError> {
        let region =
            region_from_zone(zone).ok_or_else(|| ReplaceError::InvalidZone(zone.to_string()))?;

        let address = self.finder.find_address(project, region, filter).await?;

        let op = self
            .instances
            .delete_access_config(
                project,
                zone,
                instance,
                EPHEMERAL_ACCESS_CONFIG,
                NETWORK_INTERFACE,
            )
            .await
            .map_err(|source| {
                error!(instance = %instance, error = %source, "DeleteAccessConfig failed");
                ReplaceError::Submit {
                    stage: Stage::DeleteAccessConfig,
                    instance: instance.to_string(),
                    source,
                }
            })?;

        self.waiter
            .wait(project, zone, &op)
            .await
            .map_err(|source| ReplaceError::Wait {
                stage: Stage::AwaitDelete,
                instance: instance.to_string(),
                source,
            })?;

        let config = AccessConfig::one_to_one_nat(RESERVED_ACCESS_CONFIG, address.as_str());
        let op = self
            .instances
            .add_access_config(project, zone, instance, NETWORK_INTERFACE, &config)
            .await
            .map_err(|source| {
                error!(instance = %instance, error = %source, "AddAccessConfig failed");
                ReplaceError::Submit {
                    stage: Stage::AddAccessConfig,
                    instance: instance.to_string(),
                    source,
                }
            })?;

        self.waiter
            .wait(project, zone, &op)
            .await
            .map_err(|source| ReplaceError::Wait {
                stage: Stage::AwaitAdd,
                instance: instance.to_string(),
                source,
            })?;

        info!(instance = %instance, address = %address, "Replaced IP");
        Ok(address)
    }
}
