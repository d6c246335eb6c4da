//! Replacement requests.

use serde::{Deserialize, Serialize};

/// An instance whose ephemeral external IP should be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRequest {
    /// Empty means "use the agent's default project".
    #[serde(default)]
    pub project_id: String,
    pub zone: String,
    pub instance_name: String,
}

impl ReplacementRequest {
    pub fn new(
        project_id: impl Into<String>,
        zone: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            zone: zone.into(),
            instance_name: instance_name.into(),
        }
    }
}
