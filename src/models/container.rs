// Container models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Container lifecycle state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from the backend state string (e.g. "running", "exited").
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub oom_killed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl ContainerStatus {
    pub fn state_kind(&self) -> ContainerState {
        ContainerState::parse(&self.state)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMount {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default)]
    pub status: ContainerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    /// Published ports as rendered by the backend (e.g. "8080->80/tcp").
    #[serde(default)]
    pub ports: String,
    /// Network name -> backend-specific settings.
    #[serde(default)]
    pub networks: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub mounts: Vec<ContainerMount>,
    /// `KEY=value` pairs.
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ContainerSnapshot {
    pub fn is_running(&self) -> bool {
        self.status.running
    }

    pub fn network_names(&self) -> Vec<&str> {
        self.networks.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFilter {
    Running,
    Exited,
    Created,
}

impl ContainerFilter {
    pub fn matches(self, container: &ContainerSnapshot) -> bool {
        match self {
            ContainerFilter::Running => container.status.running,
            ContainerFilter::Exited => container.status.state_kind() == ContainerState::Exited,
            ContainerFilter::Created => container.status.state_kind() == ContainerState::Created,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStatusCounts {
    pub running: usize,
    pub exited: usize,
    pub created: usize,
}

/// Container collection. The count is always the list length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ContainerListWire", into = "ContainerListWire")]
pub struct ContainerList {
    containers: Vec<ContainerSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct ContainerListWire {
    #[serde(default)]
    containers: Vec<ContainerSnapshot>,
    #[serde(default)]
    count: usize,
}

impl From<ContainerListWire> for ContainerList {
    fn from(wire: ContainerListWire) -> Self {
        if wire.count != wire.containers.len() {
            tracing::debug!(
                reported = wire.count,
                actual = wire.containers.len(),
                "container list count mismatch; using list length"
            );
        }
        Self {
            containers: wire.containers,
        }
    }
}

impl From<ContainerList> for ContainerListWire {
    fn from(list: ContainerList) -> Self {
        Self {
            count: list.containers.len(),
            containers: list.containers,
        }
    }
}

impl ContainerList {
    pub fn new(containers: Vec<ContainerSnapshot>) -> Self {
        Self { containers }
    }

    pub fn containers(&self) -> &[ContainerSnapshot] {
        &self.containers
    }

    pub fn count(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ContainerSnapshot> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn status_counts(&self) -> ContainerStatusCounts {
        ContainerStatusCounts {
            running: self.count_matching(ContainerFilter::Running),
            exited: self.count_matching(ContainerFilter::Exited),
            created: self.count_matching(ContainerFilter::Created),
        }
    }

    fn count_matching(&self, filter: ContainerFilter) -> usize {
        self.containers.iter().filter(|c| filter.matches(c)).count()
    }

    /// Case-insensitive search over name and image, then status filter.
    pub fn filtered(
        &self,
        query: &str,
        filter: Option<ContainerFilter>,
    ) -> Vec<&ContainerSnapshot> {
        let query = query.to_lowercase();
        self.containers
            .iter()
            .filter(|c| {
                query.is_empty()
                    || c.name.to_lowercase().contains(&query)
                    || c.image.to_lowercase().contains(&query)
            })
            .filter(|c| filter.is_none_or(|f| f.matches(c)))
            .collect()
    }
}
