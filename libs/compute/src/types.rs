//! Wire types for the Compute Engine and Kubernetes Engine REST APIs.
//!
//! Only the fields the agent reads or writes are modelled; everything else in
//! a response is ignored on decode.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Address status for a static address that is not attached to anything.
pub const ADDRESS_STATUS_RESERVED: &str = "RESERVED";

/// A regional static address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub name: String,

    /// Textual IP address.
    pub address: String,

    /// `RESERVING`, `RESERVED` or `IN_USE`.
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Address {
    pub fn is_reserved(&self) -> bool {
        self.status.eq_ignore_ascii_case(ADDRESS_STATUS_RESERVED)
    }

    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).is_some_and(|v| v == value)
    }
}

/// Response of `addresses.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressList {
    /// Omitted by the API when nothing matched.
    #[serde(default)]
    pub items: Vec<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Kind of NAT an access config performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessConfigType {
    #[serde(rename = "ONE_TO_ONE_NAT")]
    OneToOneNat,
}

impl fmt::Display for AccessConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessConfigType::OneToOneNat => write!(f, "ONE_TO_ONE_NAT"),
        }
    }
}

/// External access configuration of a network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub kind: String,
    pub name: String,
    #[serde(rename = "type")]
    pub config_type: AccessConfigType,
    #[serde(rename = "natIP")]
    pub nat_ip: String,
}

impl AccessConfig {
    /// One-to-one NAT config bound to `nat_ip`.
    pub fn one_to_one_nat(name: impl Into<String>, nat_ip: impl Into<String>) -> Self {
        Self {
            kind: "compute#accessConfig".to_string(),
            name: name.into(),
            config_type: AccessConfigType::OneToOneNat,
            nat_ip: nat_ip.into(),
        }
    }
}

/// Status of a long-running operation.
///
/// Parsed case-insensitively. Unknown values are kept verbatim so that a new
/// provider state never fails a decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    Other(String),
}

impl OperationStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, OperationStatus::Done)
    }
}

impl From<String> for OperationStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pending" => OperationStatus::Pending,
            "running" => OperationStatus::Running,
            "done" => OperationStatus::Done,
            _ => OperationStatus::Other(value),
        }
    }
}

impl From<OperationStatus> for String {
    fn from(value: OperationStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Running => write!(f, "RUNNING"),
            OperationStatus::Done => write!(f, "DONE"),
            OperationStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Errors attached to a finished operation whose mutation failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// A zonal operation handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl Operation {
    pub fn new(name: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            name: name.into(),
            status,
            zone: None,
            operation_type: None,
            error: None,
        }
    }
}

/// A Kubernetes Engine cluster, as far as zone discovery cares.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_master_version: String,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ClusterList {
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}
