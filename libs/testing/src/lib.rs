//! # kip-testing
//!
//! [`FakeCompute`] is an in-memory stand-in for the Compute Engine API. It
//! keeps an address pool and per-instance access configs, hands out
//! operations that finish after a configurable number of polls, and records
//! every call in order so tests can assert on sequencing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use kip_compute::{
    AccessConfig, Address, AddressApi, AddressList, ComputeError, InstanceApi, Operation,
    OperationApi, OperationError, OperationErrorItem, OperationStatus, Result,
};
use reqwest::StatusCode;

pub const DELETE_ACCESS_CONFIG: &str = "deleteAccessConfig";
pub const ADD_ACCESS_CONFIG: &str = "addAccessConfig";

/// A provider call as observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListAddresses {
        project: String,
        region: String,
        filter: String,
    },
    DeleteAccessConfig {
        project: String,
        zone: String,
        instance: String,
        config_name: String,
        network_interface: String,
    },
    AddAccessConfig {
        project: String,
        zone: String,
        instance: String,
        network_interface: String,
        config: AccessConfig,
    },
    GetOperation {
        project: String,
        zone: String,
        name: String,
    },
}

impl Call {
    /// Instance the call targets, if it is an instance mutation.
    pub fn instance(&self) -> Option<&str> {
        match self {
            Call::DeleteAccessConfig { instance, .. } | Call::AddAccessConfig { instance, .. } => {
                Some(instance)
            }
            _ => None,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, Call::AddAccessConfig { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Call::DeleteAccessConfig { .. })
    }
}

struct PendingOperation {
    operation_type: &'static str,
    instance: String,
    polls_left: u32,
}

#[derive(Default)]
struct State {
    /// Address pool by region, in listing order.
    pool: BTreeMap<String, Vec<Address>>,
    access_configs: HashMap<String, Option<AccessConfig>>,
    operations: HashMap<String, PendingOperation>,
    calls: Vec<Call>,
    next_operation: u64,
    polls_until_done: u32,
    fail_list: bool,
    fail_submit: HashSet<&'static str>,
    fail_poll: HashSet<&'static str>,
    fail_operation: HashSet<&'static str>,
}

/// In-memory Compute Engine.
#[derive(Default)]
pub struct FakeCompute {
    state: Mutex<State>,
}

fn provider_error(what: &str) -> ComputeError {
    ComputeError::Api {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: format!("injected failure: {}", what),
    }
}

impl FakeCompute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address to `region`'s pool.
    pub fn with_address(
        self,
        region: &str,
        address: &str,
        status: &str,
        labels: &[(&str, &str)],
    ) -> Self {
        let entry = Address {
            name: format!("addr-{}", address.replace('.', "-")),
            address: address.to_string(),
            status: status.to_string(),
            region: Some(region.to_string()),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.lock().pool.entry(region.to_string()).or_default().push(entry);
        self
    }

    /// Register an instance carrying an ephemeral external address.
    pub fn with_instance(self, instance: &str, ephemeral_ip: &str) -> Self {
        self.lock().access_configs.insert(
            instance.to_string(),
            Some(AccessConfig::one_to_one_nat("external-nat", ephemeral_ip)),
        );
        self
    }

    /// Number of status polls an operation answers RUNNING before DONE.
    pub fn with_polls_until_done(self, polls: u32) -> Self {
        self.lock().polls_until_done = polls;
        self
    }

    /// Make address listing fail.
    pub fn failing_list(self) -> Self {
        self.lock().fail_list = true;
        self
    }

    /// Make submission of `operation_type` fail.
    pub fn failing_submit(self, operation_type: &'static str) -> Self {
        self.lock().fail_submit.insert(operation_type);
        self
    }

    /// Make status polls of `operation_type` operations fail.
    pub fn failing_poll(self, operation_type: &'static str) -> Self {
        self.lock().fail_poll.insert(operation_type);
        self
    }

    /// Make `operation_type` operations finish DONE with an error attached.
    pub fn failing_operation(self, operation_type: &'static str) -> Self {
        self.lock().fail_operation.insert(operation_type);
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Current access config of `instance`; `None` when detached or unknown.
    pub fn access_config(&self, instance: &str) -> Option<AccessConfig> {
        self.lock().access_configs.get(instance).cloned().flatten()
    }

    /// Current status of `address` in any region's pool.
    pub fn address_status(&self, address: &str) -> Option<String> {
        self.lock()
            .pool
            .values()
            .flatten()
            .find(|a| a.address == address)
            .map(|a| a.status.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn start_operation(&mut self, operation_type: &'static str, instance: &str) -> Operation {
        self.next_operation += 1;
        let name = format!("operation-{}", self.next_operation);
        self.operations.insert(
            name.clone(),
            PendingOperation {
                operation_type,
                instance: instance.to_string(),
                polls_left: self.polls_until_done,
            },
        );

        let mut op = Operation::new(name, OperationStatus::Pending);
        op.operation_type = Some(operation_type.to_string());
        op
    }
}

#[async_trait]
impl AddressApi for FakeCompute {
    async fn list_addresses(
        &self,
        project: &str,
        region: &str,
        filter: &str,
    ) -> Result<AddressList> {
        let mut state = self.lock();
        state.calls.push(Call::ListAddresses {
            project: project.to_string(),
            region: region.to_string(),
            filter: filter.to_string(),
        });

        if state.fail_list {
            return Err(provider_error("addresses.list"));
        }

        Ok(AddressList {
            items: state.pool.get(region).cloned().unwrap_or_default(),
            next_page_token: None,
        })
    }
}

#[async_trait]
impl InstanceApi for FakeCompute {
    async fn delete_access_config(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        config_name: &str,
        network_interface: &str,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteAccessConfig {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: instance.to_string(),
            config_name: config_name.to_string(),
            network_interface: network_interface.to_string(),
        });

        if state.fail_submit.contains(DELETE_ACCESS_CONFIG) {
            return Err(provider_error(DELETE_ACCESS_CONFIG));
        }

        state.access_configs.insert(instance.to_string(), None);
        Ok(state.start_operation(DELETE_ACCESS_CONFIG, instance))
    }

    async fn add_access_config(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
        network_interface: &str,
        config: &AccessConfig,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(Call::AddAccessConfig {
            project: project.to_string(),
            zone: zone.to_string(),
            instance: instance.to_string(),
            network_interface: network_interface.to_string(),
            config: config.clone(),
        });

        if state.fail_submit.contains(ADD_ACCESS_CONFIG) {
            return Err(provider_error(ADD_ACCESS_CONFIG));
        }

        Ok(state.start_operation(ADD_ACCESS_CONFIG, instance))
    }
}

#[async_trait]
impl OperationApi for FakeCompute {
    async fn get_zone_operation(&self, project: &str, zone: &str, name: &str) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(Call::GetOperation {
            project: project.to_string(),
            zone: zone.to_string(),
            name: name.to_string(),
        });

        let Some(operation_type) = state.operations.get(name).map(|p| p.operation_type) else {
            return Err(ComputeError::Api {
                status: StatusCode::NOT_FOUND,
                body: format!("operation {} not found", name),
            });
        };

        if state.fail_poll.contains(operation_type) {
            return Err(provider_error("zoneOperations.get"));
        }

        let pending = match state.operations.get_mut(name) {
            Some(pending) => pending,
            None => return Err(provider_error("zoneOperations.get")),
        };
        let mut op = Operation::new(name, OperationStatus::Running);
        op.operation_type = Some(operation_type.to_string());
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return Ok(op);
        }

        op.status = OperationStatus::Done;
        let instance = pending.instance.clone();

        if state.fail_operation.contains(operation_type) {
            op.error = Some(OperationError {
                errors: vec![OperationErrorItem {
                    code: "INJECTED".to_string(),
                    message: format!("{} failed", operation_type),
                }],
            });
            return Ok(op);
        }

        if operation_type == ADD_ACCESS_CONFIG {
            let added = state
                .calls
                .iter()
                .rev()
                .find_map(|c| match c {
                    Call::AddAccessConfig {
                        instance: i,
                        config,
                        ..
                    } if *i == instance => Some(config.clone()),
                    _ => None,
                });
            if let Some(config) = added {
                if let Some(address) = state
                    .pool
                    .values_mut()
                    .flatten()
                    .find(|a| a.address == config.nat_ip)
                {
                    address.status = "IN_USE".to_string();
                }
                state.access_configs.insert(instance, Some(config));
            }
        }

        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operation_completes_after_configured_polls() {
        let fake = FakeCompute::new()
            .with_instance("node-1", "34.0.0.9")
            .with_polls_until_done(2);

        let op = fake
            .delete_access_config("p", "z-a", "node-1", "external-nat", "nic0")
            .await
            .unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert!(fake.access_config("node-1").is_none());

        let statuses: Vec<OperationStatus> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(fake.get_zone_operation("p", "z-a", &op.name).await.unwrap().status);
            }
            out
        };
        assert_eq!(
            statuses,
            vec![
                OperationStatus::Running,
                OperationStatus::Running,
                OperationStatus::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_completed_add_marks_address_in_use() {
        let fake = FakeCompute::new()
            .with_address("r1", "35.0.0.1", "RESERVED", &[("kip", "reserved")])
            .with_instance("node-1", "34.0.0.9");

        let config = AccessConfig::one_to_one_nat("External NAT", "35.0.0.1");
        let op = fake
            .add_access_config("p", "r1-a", "node-1", "nic0", &config)
            .await
            .unwrap();
        fake.get_zone_operation("p", "r1-a", &op.name).await.unwrap();

        assert_eq!(fake.access_config("node-1"), Some(config));
        assert_eq!(fake.address_status("35.0.0.1").as_deref(), Some("IN_USE"));
    }
}
