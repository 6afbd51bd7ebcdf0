// Shared test helpers: scripted sources standing in for the backend

#![allow(dead_code)]

use futures_util::StreamExt;
use futures_util::stream;
use sirberus::actions::{ActionExecutor, ActionKind};
use sirberus::api::ApiError;
use sirberus::api::sse::{EventStream, SseEvent};
use sirberus::logs::{ExecSource, LogSource};
use sirberus::models::*;
use sirberus::poller::SnapshotSource;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;

pub fn service(name: &str, active: &str, sub: &str) -> ServiceSnapshot {
    ServiceSnapshot {
        name: name.to_string(),
        description: format!("{} daemon", name),
        load_state: "loaded".to_string(),
        active_state: active.to_string(),
        sub_state: sub.to_string(),
        cpu_usage: Some(42.5),
        memory_usage: Some(1024),
        uptime: Some(60),
    }
}

pub fn network_error() -> ApiError {
    ApiError::Network("connection refused".to_string())
}

/// Polls `cond` until it holds; panics after ~2s of (possibly virtual) time.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Replays queued results in order, then repeats the last one.
pub struct ScriptedSource<T> {
    script: Mutex<VecDeque<Result<T, ApiError>>>,
    last: Mutex<Option<Result<T, ApiError>>>,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl<T: Clone> ScriptedSource<T> {
    pub fn new(script: Vec<Result<T, ApiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn next(&self) -> Result<T, ApiError> {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(r) = next {
            *last = Some(r);
        }
        last.clone()
            .unwrap_or_else(|| Err(ApiError::Network("empty script".to_string())))
    }
}

impl<T: Clone + Send + Sync + 'static> SnapshotSource for ScriptedSource<T> {
    type Snapshot = T;

    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&self) -> Result<T, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next()
    }
}

type EventSender = mpsc::UnboundedSender<Result<SseEvent, ApiError>>;

fn receiver_stream(rx: mpsc::UnboundedReceiver<Result<SseEvent, ApiError>>) -> EventStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

/// Each `open` creates a fresh channel; tests push events through its sender.
#[derive(Default)]
pub struct ChannelLogSource {
    pub opens: Mutex<Vec<(EntityId, u32)>>,
    senders: Mutex<Vec<EventSender>>,
    fail_with: Mutex<Option<ApiError>>,
}

impl ChannelLogSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_opens_with(&self, error: ApiError) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn last_lines(&self) -> Option<u32> {
        self.opens.lock().unwrap().last().map(|(_, lines)| *lines)
    }

    /// Sender for the `n`th opened connection (0-based).
    pub fn sender(&self, n: usize) -> EventSender {
        self.senders.lock().unwrap()[n].clone()
    }

    pub async fn wait_for_open(&self, n: usize) -> EventSender {
        eventually(|| self.senders.lock().unwrap().len() > n).await;
        self.sender(n)
    }
}

impl LogSource for ChannelLogSource {
    async fn open(&self, target: &EntityId, lines: u32) -> Result<EventStream, ApiError> {
        self.opens.lock().unwrap().push((target.clone(), lines));
        if let Some(e) = self.fail_with.lock().unwrap().clone() {
            return Err(e);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        Ok(receiver_stream(rx))
    }
}

#[derive(Default)]
pub struct ChannelExecSource {
    pub commands: Mutex<Vec<(String, String)>>,
    senders: Mutex<Vec<EventSender>>,
}

impl ChannelExecSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn wait_for_run(&self, n: usize) -> EventSender {
        eventually(|| self.senders.lock().unwrap().len() > n).await;
        self.senders.lock().unwrap()[n].clone()
    }
}

impl ExecSource for ChannelExecSource {
    async fn run(&self, container_id: &str, command: &str) -> Result<EventStream, ApiError> {
        self.commands
            .lock()
            .unwrap()
            .push((container_id.to_string(), command.to_string()));
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        Ok(receiver_stream(rx))
    }
}

/// Records every call; fails for ids listed in `failing`.
#[derive(Default)]
pub struct MockExecutor {
    pub failing: Vec<String>,
    pub calls: Mutex<Vec<(ActionKind, EntityId)>>,
}

impl MockExecutor {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ActionExecutor for MockExecutor {
    async fn perform(&self, action: ActionKind, target: &EntityId) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push((action, target.clone()));
        if self.failing.contains(&target.id) {
            return Err(ApiError::Status {
                status: 500,
                body: format!("failed to {} {}", action, target.id),
            });
        }
        Ok(())
    }
}
