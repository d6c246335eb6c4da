//! Error types for IP replacement.

use std::fmt;
use std::time::Duration;

use kip_compute::{ComputeError, OperationError};
use thiserror::Error;

/// Address lookup failures.
#[derive(Debug, Error)]
pub enum FindError {
    /// Nothing in the pool is both reserved and labelled.
    #[error("no free address found in {region} matching {filter}")]
    NotFound { region: String, filter: String },

    /// The listing call itself failed.
    #[error("failed to list addresses in {region}: {source}")]
    Provider {
        region: String,
        #[source]
        source: ComputeError,
    },
}

/// Operation wait failures. None of these mean the operation succeeded.
#[derive(Debug, Error)]
pub enum WaitError {
    /// Fetching the operation status failed; the outcome is unknown.
    #[error("failed to fetch status of {operation}: {source}")]
    Provider {
        operation: String,
        #[source]
        source: ComputeError,
    },

    /// The operation finished but the mutation failed.
    #[error("operation {operation} failed: {error}")]
    OperationFailed {
        operation: String,
        error: OperationError,
    },

    /// The operation was still running when the deadline passed.
    #[error("operation {operation} not done after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    /// Shutdown was requested while waiting.
    #[error("wait for {operation} cancelled")]
    Cancelled { operation: String },
}

/// Step of the replacement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    FindAddress,
    DeleteAccessConfig,
    AwaitDelete,
    AddAccessConfig,
    AwaitAdd,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FindAddress => write!(f, "find_address"),
            Stage::DeleteAccessConfig => write!(f, "delete_access_config"),
            Stage::AwaitDelete => write!(f, "await_delete"),
            Stage::AddAccessConfig => write!(f, "add_access_config"),
            Stage::AwaitAdd => write!(f, "await_add"),
        }
    }
}

/// IP replacement failures.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// The zone is too short to derive a region from.
    #[error("invalid zone {0:?}")]
    InvalidZone(String),

    #[error(transparent)]
    Find(#[from] FindError),

    /// A mutation request was rejected.
    #[error("{stage} failed for {instance}: {source}")]
    Submit {
        stage: Stage,
        instance: String,
        #[source]
        source: ComputeError,
    },

    /// A submitted mutation did not complete successfully.
    #[error("{stage} failed for {instance}: {source}")]
    Wait {
        stage: Stage,
        instance: String,
        #[source]
        source: WaitError,
    },
}

impl ReplaceError {
    /// Step at which the sequence stopped.
    pub fn stage(&self) -> Stage {
        match self {
            ReplaceError::InvalidZone(_) | ReplaceError::Find(_) => Stage::FindAddress,
            ReplaceError::Submit { stage, .. } | ReplaceError::Wait { stage, .. } => *stage,
        }
    }

    /// Returns true if the pool had no usable address.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReplaceError::Find(FindError::NotFound { .. }))
    }

    /// Returns true if the old access config may already be gone, leaving
    /// the instance without an external address.
    pub fn leaves_instance_detached(&self) -> bool {
        self.stage() >= Stage::AwaitDelete
    }

    /// Stable reason code for logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ReplaceError::InvalidZone(_) => "invalid_zone",
            ReplaceError::Find(FindError::NotFound { .. }) => "no_free_address",
            ReplaceError::Find(FindError::Provider { .. }) => "address_list_failed",
            ReplaceError::Submit { stage, .. } | ReplaceError::Wait { stage, .. } => match stage {
                Stage::FindAddress => "address_list_failed",
                Stage::DeleteAccessConfig => "delete_access_config_failed",
                Stage::AwaitDelete => "delete_access_config_incomplete",
                Stage::AddAccessConfig => "add_access_config_failed",
                Stage::AwaitAdd => "add_access_config_incomplete",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_failure(stage: Stage) -> ReplaceError {
        ReplaceError::Wait {
            stage,
            instance: "node-1".to_string(),
            source: WaitError::Cancelled {
                operation: "operation-1".to_string(),
            },
        }
    }

    #[test]
    fn test_detached_stages() {
        let not_found = ReplaceError::Find(FindError::NotFound {
            region: "us-central1".to_string(),
            filter: "labels.kip=reserved".to_string(),
        });
        assert!(not_found.is_not_found());
        assert!(!not_found.leaves_instance_detached());
        assert_eq!(not_found.reason_code(), "no_free_address");

        assert!(wait_failure(Stage::AwaitDelete).leaves_instance_detached());
        assert!(wait_failure(Stage::AwaitAdd).leaves_instance_detached());
        assert_eq!(
            wait_failure(Stage::AwaitAdd).reason_code(),
            "add_access_config_incomplete"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = wait_failure(Stage::AwaitDelete);
        assert_eq!(
            err.to_string(),
            "await_delete failed for node-1: wait for operation-1 cancelled"
        );
    }
}
