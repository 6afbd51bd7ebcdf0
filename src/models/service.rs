// systemd service models

use serde::{Deserialize, Serialize};

/// One systemd unit as reported by the service list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// e.g. "loaded", "not-found"
    #[serde(default)]
    pub load_state: String,
    /// e.g. "active", "inactive", "failed"
    #[serde(default)]
    pub active_state: String,
    /// e.g. "running", "dead", "exited"
    #[serde(default)]
    pub sub_state: String,
    /// Percent. `-1` means the backend is still measuring; `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
    /// Seconds since activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
}

impl ServiceSnapshot {
    pub fn is_running(&self) -> bool {
        is_service_running(self)
    }
}

/// A service counts as running only when active with a running main process.
pub fn is_service_running(service: &ServiceSnapshot) -> bool {
    service.active_state == "active" && service.sub_state == "running"
}

/// Detail view of one service: the snapshot plus unit/cgroup accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetails {
    pub service: ServiceSnapshot,
    #[serde(default)]
    pub drop_in: Vec<String>,
    /// RFC 3339 activation time.
    #[serde(default)]
    pub since: String,
    #[serde(default)]
    pub invocation: String,
    #[serde(default)]
    pub triggered_by: Vec<String>,
    #[serde(default)]
    pub docs: Vec<String>,
    #[serde(default, rename = "mainPID")]
    pub main_pid: u32,
    #[serde(default)]
    pub main_process: String,
    #[serde(default)]
    pub ip_ingress_bytes: u64,
    #[serde(default)]
    pub ip_egress_bytes: u64,
    #[serde(default)]
    pub io_read_bytes: u64,
    #[serde(default)]
    pub io_write_bytes: u64,
    #[serde(default)]
    pub tasks: u32,
    #[serde(default)]
    pub tasks_limit: u32,
    #[serde(default)]
    pub memory_peak: u64,
    #[serde(default, rename = "cpuTimeNSec")]
    pub cpu_time_nsec: u64,
    #[serde(default)]
    pub c_group: String,
    #[serde(default)]
    pub fragment_path: String,
    #[serde(default)]
    pub processes: Vec<String>,
}

impl ServiceDetails {
    pub fn is_running(&self) -> bool {
        self.service.is_running()
    }
}

/// Status filter offered on the service list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceFilter {
    /// active + running
    #[serde(rename = "active:running")]
    ActiveRunning,
    /// any activeState == "active"
    Active,
    Inactive,
    Failed,
}

impl ServiceFilter {
    pub fn matches(self, service: &ServiceSnapshot) -> bool {
        match self {
            ServiceFilter::ActiveRunning => service.is_running(),
            ServiceFilter::Active => service.active_state == "active",
            ServiceFilter::Inactive => service.active_state == "inactive",
            ServiceFilter::Failed => service.active_state == "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatusCounts {
    pub running: usize,
    /// Active but not running (e.g. oneshot units that exited).
    pub active: usize,
    pub inactive: usize,
    pub failed: usize,
}

/// Service collection. The count is always the list length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ServiceListWire", into = "ServiceListWire")]
pub struct ServiceList {
    services: Vec<ServiceSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct ServiceListWire {
    #[serde(default)]
    services: Vec<ServiceSnapshot>,
    #[serde(default)]
    count: usize,
}

impl From<ServiceListWire> for ServiceList {
    fn from(wire: ServiceListWire) -> Self {
        if wire.count != wire.services.len() {
            tracing::debug!(
                reported = wire.count,
                actual = wire.services.len(),
                "service list count mismatch; using list length"
            );
        }
        Self {
            services: wire.services,
        }
    }
}

impl From<ServiceList> for ServiceListWire {
    fn from(list: ServiceList) -> Self {
        Self {
            count: list.services.len(),
            services: list.services,
        }
    }
}

impl ServiceList {
    pub fn new(services: Vec<ServiceSnapshot>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[ServiceSnapshot] {
        &self.services
    }

    pub fn count(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceSnapshot> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn status_counts(&self) -> ServiceStatusCounts {
        let mut counts = ServiceStatusCounts::default();
        for s in &self.services {
            match s.active_state.as_str() {
                "active" if s.sub_state == "running" => counts.running += 1,
                "active" => counts.active += 1,
                "inactive" => counts.inactive += 1,
                "failed" => counts.failed += 1,
                _ => {}
            }
        }
        counts
    }

    /// Case-insensitive search over name and description, then status filter.
    pub fn filtered(&self, query: &str, filter: Option<ServiceFilter>) -> Vec<&ServiceSnapshot> {
        let query = query.to_lowercase();
        self.services
            .iter()
            .filter(|s| {
                query.is_empty()
                    || s.name.to_lowercase().contains(&query)
                    || s.description.to_lowercase().contains(&query)
            })
            .filter(|s| filter.is_none_or(|f| f.matches(s)))
            .collect()
    }
}
