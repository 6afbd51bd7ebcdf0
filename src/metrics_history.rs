// Rolling CPU/memory history sampled from successive polls

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

use crate::models::{ContainerSnapshot, EntitySnapshot, ServiceDetails, ServiceSnapshot};
use crate::poller::{SnapshotSource, Subscription};

pub const DEFAULT_MAX_DATA_POINTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    /// Unix milliseconds at sampling time.
    pub timestamp: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuPoint {
    pub index: usize,
    pub cpu: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryPoint {
    pub index: usize,
    pub memory: f64,
}

/// Anything that reports live resource usage.
pub trait MetricsSource {
    fn is_running(&self) -> bool;
    fn cpu_usage(&self) -> Option<f64>;
    fn memory_usage(&self) -> Option<u64>;
}

impl MetricsSource for ServiceSnapshot {
    fn is_running(&self) -> bool {
        ServiceSnapshot::is_running(self)
    }
    fn cpu_usage(&self) -> Option<f64> {
        self.cpu_usage
    }
    fn memory_usage(&self) -> Option<u64> {
        self.memory_usage
    }
}

impl MetricsSource for ServiceDetails {
    fn is_running(&self) -> bool {
        self.service.is_running()
    }
    fn cpu_usage(&self) -> Option<f64> {
        self.service.cpu_usage
    }
    fn memory_usage(&self) -> Option<u64> {
        self.service.memory_usage
    }
}

impl MetricsSource for ContainerSnapshot {
    fn is_running(&self) -> bool {
        ContainerSnapshot::is_running(self)
    }
    fn cpu_usage(&self) -> Option<f64> {
        self.cpu_usage
    }
    fn memory_usage(&self) -> Option<u64> {
        self.memory_usage
    }
}

impl MetricsSource for EntitySnapshot {
    fn is_running(&self) -> bool {
        EntitySnapshot::is_running(self)
    }
    fn cpu_usage(&self) -> Option<f64> {
        EntitySnapshot::cpu_usage(self)
    }
    fn memory_usage(&self) -> Option<u64> {
        EntitySnapshot::memory_usage(self)
    }
}

/// Two bounded FIFO series. Oldest samples are evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    cpu: VecDeque<MetricSample>,
    memory: VecDeque<MetricSample>,
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DATA_POINTS)
    }
}

fn push_capped(series: &mut VecDeque<MetricSample>, capacity: usize, sample: MetricSample) {
    series.push_back(sample);
    while series.len() > capacity {
        series.pop_front();
    }
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            cpu: VecDeque::with_capacity(capacity),
            memory: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn on_snapshot(&mut self, snapshot: &impl MetricsSource) {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        self.on_snapshot_at(snapshot, now);
    }

    /// Samples only running entities; absent or negative CPU readings are skipped.
    pub fn on_snapshot_at(&mut self, snapshot: &impl MetricsSource, timestamp: u64) {
        if !snapshot.is_running() {
            return;
        }
        if let Some(cpu) = snapshot.cpu_usage().filter(|v| *v >= 0.0) {
            push_capped(&mut self.cpu, self.capacity, MetricSample { timestamp, value: cpu });
        }
        if let Some(memory) = snapshot.memory_usage() {
            push_capped(
                &mut self.memory,
                self.capacity,
                MetricSample {
                    timestamp,
                    value: memory as f64,
                },
            );
        }
    }

    pub fn cpu_history(&self) -> Vec<MetricSample> {
        self.cpu.iter().copied().collect()
    }

    pub fn memory_history(&self) -> Vec<MetricSample> {
        self.memory.iter().copied().collect()
    }

    pub fn cpu_chart(&self) -> Vec<CpuPoint> {
        self.cpu
            .iter()
            .enumerate()
            .map(|(index, s)| CpuPoint { index, cpu: s.value })
            .collect()
    }

    pub fn memory_chart(&self) -> Vec<MemoryPoint> {
        self.memory
            .iter()
            .enumerate()
            .map(|(index, s)| MemoryPoint {
                index,
                memory: s.value,
            })
            .collect()
    }

    /// A chart needs at least two points in either series.
    pub fn has_enough_data(&self) -> bool {
        self.cpu.len() > 1 || self.memory.len() > 1
    }
}

/// Feeds a `MetricsHistory` from a polling subscription, once per successful fetch.
pub struct MetricsSampler {
    history: Arc<Mutex<MetricsHistory>>,
    task: JoinHandle<()>,
}

impl MetricsSampler {
    pub fn follow<S>(subscription: &Subscription<S>, capacity: usize) -> Self
    where
        S: SnapshotSource,
        S::Snapshot: MetricsSource,
    {
        let history = Arc::new(Mutex::new(MetricsHistory::new(capacity)));
        let mut rx = subscription.watch();
        let shared = Arc::clone(&history);
        let resource = subscription.describe();
        let task = tokio::spawn(async move {
            let mut seen = 0u64;
            loop {
                let fresh = {
                    let state = rx.borrow_and_update();
                    if state.revision > seen {
                        seen = state.revision;
                        state.data.clone()
                    } else {
                        None
                    }
                };
                if let Some(snapshot) = fresh {
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .on_snapshot(&*snapshot);
                    tracing::trace!(resource = %resource, revision = seen, "metrics sampled");
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        Self { history, task }
    }

    /// Copy of the current history.
    pub fn history(&self) -> MetricsHistory {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for MetricsSampler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
