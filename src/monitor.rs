// Pipelines the binary runs: list overviews and per-entity detail screens

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::logs::{LogReader, LogTailer};
use crate::metrics_history::{MetricsHistory, MetricsSampler, MetricsSource};
use crate::models::format::{format_bytes, format_duration};
use crate::models::{
    ContainerList, ContainerSnapshot, EntityId, EntityKind, EntitySnapshot, ServiceDetails,
    ServiceList,
};
use crate::poller::{ApiSource, SnapshotSource, Subscription};

/// Logs a line whenever a subscription publishes a new revision or a new error.
fn spawn_reporter<S, F>(subscription: &Subscription<S>, mut describe: F) -> JoinHandle<()>
where
    S: SnapshotSource,
    F: FnMut(&S::Snapshot) -> String + Send + 'static,
{
    let mut rx = subscription.watch();
    let resource = subscription.describe();
    tokio::spawn(async move {
        let mut seen = 0u64;
        let mut last_error = None;
        loop {
            let (line, error) = {
                let state = rx.borrow_and_update();
                let line = match &state.data {
                    Some(data) if state.revision > seen => {
                        seen = state.revision;
                        Some(describe(&**data))
                    }
                    _ => None,
                };
                (line, state.error.clone())
            };
            if let Some(line) = line {
                info!(resource = %resource, revision = seen, "{}", line);
            }
            if error != last_error {
                if let Some(e) = &error {
                    warn!(resource = %resource, error = %e, "showing stale data");
                }
                last_error = error;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Logs records as they land in a tailer's buffer, starting over whenever
/// the stream restarts.
fn spawn_log_reporter(mut reader: LogReader, target: EntityId) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_error = None;
        loop {
            for record in reader.unseen() {
                info!(entity = %target, "{}", record.to_line());
            }
            let status = reader.status();
            if status.error != last_error {
                if let Some(e) = &status.error {
                    warn!(entity = %target, error = %e, "log stream error");
                }
                last_error = status.error;
            }
            reader.changed().await;
        }
    })
}

fn usage_line(snapshot: &impl MetricsSource) -> String {
    if !snapshot.is_running() {
        return "not running".to_string();
    }
    let cpu = snapshot
        .cpu_usage()
        .filter(|v| *v >= 0.0)
        .map_or_else(|| "N/A".to_string(), |v| format!("{:.1}%", v));
    let memory = snapshot
        .memory_usage()
        .map_or_else(|| "N/A".to_string(), |v| format_bytes(v, 2));
    format!("running, cpu {}, memory {}", cpu, memory)
}

fn service_line(details: &ServiceDetails) -> String {
    let line = usage_line(details);
    match details.service.uptime {
        Some(seconds) if details.is_running() => {
            format!("{}, up {}", line, format_duration(seconds))
        }
        _ => line,
    }
}

/// Service and container list subscriptions.
pub struct Overview {
    pub services: Subscription<ApiSource<ServiceList>>,
    pub containers: Subscription<ApiSource<ContainerList>>,
    reporters: Vec<JoinHandle<()>>,
}

impl Overview {
    pub fn open(client: &ApiClient, config: &AppConfig) -> Self {
        let services = Subscription::spawn(
            ApiSource::services(client.clone()),
            config.polling.service_list(),
        );
        let containers = Subscription::spawn(
            ApiSource::containers(client.clone()),
            config.polling.container_list(),
        );
        let reporters = vec![
            spawn_reporter(&services, |list: &ServiceList| {
                let c = list.status_counts();
                format!(
                    "{} services: {} running, {} active, {} inactive, {} failed",
                    list.count(),
                    c.running,
                    c.active,
                    c.inactive,
                    c.failed
                )
            }),
            spawn_reporter(&containers, |list: &ContainerList| {
                let c = list.status_counts();
                format!(
                    "{} containers: {} running, {} exited, {} created",
                    list.count(),
                    c.running,
                    c.exited,
                    c.created
                )
            }),
        ];
        Self {
            services,
            containers,
            reporters,
        }
    }
}

impl Drop for Overview {
    fn drop(&mut self) {
        for task in &self.reporters {
            task.abort();
        }
    }
}

pub enum DetailSubscription {
    Service(Subscription<ApiSource<ServiceDetails>>),
    Container(Subscription<ApiSource<ContainerSnapshot>>),
}

impl DetailSubscription {
    /// Latest snapshot in its common form.
    pub fn latest(&self) -> Option<EntitySnapshot> {
        match self {
            DetailSubscription::Service(s) => {
                s.data().map(|d| EntitySnapshot::Service(d.service.clone()))
            }
            DetailSubscription::Container(s) => {
                s.data().map(|c| EntitySnapshot::Container((*c).clone()))
            }
        }
    }
}

/// Everything a detail view of one entity keeps alive: detail polling,
/// metrics history and the log stream. Dropping it tears all of them down.
pub struct EntityScreen {
    target: EntityId,
    detail: DetailSubscription,
    metrics: MetricsSampler,
    logs: LogTailer<ApiClient>,
    reporters: Vec<JoinHandle<()>>,
}

impl EntityScreen {
    pub fn open(client: &ApiClient, config: &AppConfig, target: EntityId) -> Self {
        let capacity = config.metrics.max_data_points;
        let mut reporters = Vec::with_capacity(2);
        let (detail, metrics) = match target.kind {
            EntityKind::Service => {
                let sub = Subscription::spawn(
                    ApiSource::service(client.clone(), target.id.clone()),
                    config.polling.service_detail(),
                );
                reporters.push(spawn_reporter(&sub, service_line));
                let metrics = MetricsSampler::follow(&sub, capacity);
                (DetailSubscription::Service(sub), metrics)
            }
            EntityKind::Container => {
                let sub = Subscription::spawn(
                    ApiSource::container(client.clone(), target.id.clone()),
                    config.polling.container_detail(),
                );
                reporters.push(spawn_reporter(&sub, |c: &ContainerSnapshot| usage_line(c)));
                let metrics = MetricsSampler::follow(&sub, capacity);
                (DetailSubscription::Container(sub), metrics)
            }
        };
        let logs = LogTailer::spawn(
            Arc::new(client.clone()),
            target.clone(),
            config.logs.default_lines,
        );
        reporters.push(spawn_log_reporter(logs.reader(), target.clone()));
        info!(entity = %target, "watching");
        Self {
            target,
            detail,
            metrics,
            logs,
            reporters,
        }
    }

    pub fn target(&self) -> &EntityId {
        &self.target
    }

    pub fn detail(&self) -> &DetailSubscription {
        &self.detail
    }

    pub fn metrics(&self) -> MetricsHistory {
        self.metrics.history()
    }

    pub fn logs(&self) -> &LogTailer<ApiClient> {
        &self.logs
    }
}

impl Drop for EntityScreen {
    fn drop(&mut self) {
        for task in &self.reporters {
            task.abort();
        }
        let running = self.detail.latest().map(|s| s.is_running());
        info!(
            entity = %self.target,
            running = ?running,
            samples = self.metrics.history().cpu_history().len(),
            log_records = self.logs.records().len(),
            "stopped watching"
        );
    }
}
