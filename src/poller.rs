// Polling subscriptions: interval refresh, coalesced manual refresh, retry.
// Each subscription owns its background task; state is published on a watch channel.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::time::{Duration, Instant, interval_at, sleep};
use tracing::Instrument;

use crate::api::{ApiClient, ApiError, ResourceKey};
use crate::models::{ContainerList, ContainerSnapshot, ServiceDetails, ServiceList};

/// Fetches one full snapshot of a remote resource.
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;

    fn describe(&self) -> String;

    fn fetch(&self) -> impl Future<Output = Result<Self::Snapshot, ApiError>> + Send;
}

/// `SnapshotSource` backed by the REST client.
pub struct ApiSource<T> {
    client: ApiClient,
    key: ResourceKey,
    _snapshot: PhantomData<fn() -> T>,
}

impl<T> ApiSource<T> {
    fn new(client: ApiClient, key: ResourceKey) -> Self {
        Self {
            client,
            key,
            _snapshot: PhantomData,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl ApiSource<ServiceList> {
    pub fn services(client: ApiClient) -> Self {
        Self::new(client, ResourceKey::Services)
    }
}

impl ApiSource<ServiceDetails> {
    pub fn service(client: ApiClient, name: impl Into<String>) -> Self {
        Self::new(client, ResourceKey::Service(name.into()))
    }
}

impl ApiSource<ContainerList> {
    pub fn containers(client: ApiClient) -> Self {
        Self::new(client, ResourceKey::Containers)
    }
}

impl ApiSource<ContainerSnapshot> {
    pub fn container(client: ApiClient, id: impl Into<String>) -> Self {
        Self::new(client, ResourceKey::Container(id.into()))
    }
}

impl<T> SnapshotSource for ApiSource<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Snapshot = T;

    fn describe(&self) -> String {
        self.key.to_string()
    }

    async fn fetch(&self) -> Result<T, ApiError> {
        self.client.fetch_resource(&self.key).await
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Background refresh on/off. Manual `refresh()` works either way.
    pub enabled: bool,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl PollerConfig {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }

    pub fn manual() -> Self {
        Self {
            enabled: false,
            ..Self::every(Duration::from_secs(10))
        }
    }
}

/// Latest synchronized view of a resource.
#[derive(Debug)]
pub struct PollState<T> {
    /// Last successful snapshot; kept when later fetches fail.
    pub data: Option<Arc<T>>,
    /// True until the first fetch (success or failure) completes.
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<ApiError>,
    /// Bumped on every successful fetch.
    pub revision: u64,
}

impl<T> Clone for PollState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_loading: self.is_loading,
            is_refreshing: self.is_refreshing,
            error: self.error.clone(),
            revision: self.revision,
        }
    }
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: true,
            is_refreshing: false,
            error: None,
            revision: 0,
        }
    }
}

type InFlight = Shared<BoxFuture<'static, Result<(), ApiError>>>;

struct Poller<S: SnapshotSource> {
    source: S,
    config: PollerConfig,
    state: watch::Sender<PollState<S::Snapshot>>,
    in_flight: Mutex<Option<InFlight>>,
    requests: AtomicU64,
}

impl<S: SnapshotSource> Poller<S> {
    /// Joins the in-flight fetch if there is one, otherwise starts a new one.
    fn refresh(self: &Arc<Self>) -> InFlight {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.as_ref() {
            tracing::trace!(resource = %self.source.describe(), "refresh joined in-flight fetch");
            return pending.clone();
        }
        let this = Arc::clone(self);
        let fetch = async move {
            this.state.send_modify(|s| s.is_refreshing = true);
            let result = this.fetch_with_retry().await;
            this.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            this.publish(result)
        }
        .boxed()
        .shared();
        *slot = Some(fetch.clone());
        fetch
    }

    async fn fetch_with_retry(&self) -> Result<S::Snapshot, ApiError> {
        let mut attempt: u32 = 0;
        loop {
            self.requests.fetch_add(1, Ordering::Relaxed);
            match self.source.fetch().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if attempt < self.config.retries => {
                    attempt += 1;
                    tracing::debug!(
                        resource = %self.source.describe(),
                        attempt,
                        error = %e,
                        "fetch failed, retrying"
                    );
                    sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn publish(&self, result: Result<S::Snapshot, ApiError>) -> Result<(), ApiError> {
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.state.send_modify(|s| {
                    s.data = Some(snapshot);
                    s.error = None;
                    s.is_loading = false;
                    s.is_refreshing = false;
                    s.revision += 1;
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    resource = %self.source.describe(),
                    error = %e,
                    operation = "poll",
                    "fetch failed after retries; keeping last snapshot"
                );
                self.state.send_modify(|s| {
                    s.error = Some(e.clone());
                    s.is_loading = false;
                    s.is_refreshing = false;
                });
                Err(e)
            }
        }
    }

    async fn run(self: Arc<Self>) {
        let _ = self.refresh().await;
        if !self.config.enabled {
            return;
        }
        let mut tick = interval_at(Instant::now() + self.config.interval, self.config.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            // Outcome is already published; the next tick runs regardless.
            let _ = self.refresh().await;
        }
    }
}

/// Handle to one polling subscription. Dropping it stops background refresh.
pub struct Subscription<S: SnapshotSource> {
    poller: Arc<Poller<S>>,
    task: tokio::task::JoinHandle<()>,
}

impl<S: SnapshotSource> Subscription<S> {
    /// Starts the initial fetch and, when enabled, the refresh interval.
    pub fn spawn(source: S, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(PollState::default());
        let poller = Arc::new(Poller {
            source,
            config,
            state,
            in_flight: Mutex::new(None),
            requests: AtomicU64::new(0),
        });
        let span = tracing::span!(
            tracing::Level::DEBUG,
            "poller",
            resource = %poller.source.describe(),
            interval_ms = poller.config.interval.as_millis() as u64
        );
        let task = tokio::spawn(Arc::clone(&poller).run().instrument(span));
        Self { poller, task }
    }

    pub fn state(&self) -> PollState<S::Snapshot> {
        self.poller.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<S::Snapshot>> {
        self.poller.state.borrow().data.clone()
    }

    pub fn watch(&self) -> watch::Receiver<PollState<S::Snapshot>> {
        self.poller.state.subscribe()
    }

    /// Immediate out-of-band fetch, coalesced with any fetch already running.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.poller.refresh().await
    }

    /// Network requests issued so far, retries included.
    pub fn request_count(&self) -> u64 {
        self.poller.requests.load(Ordering::Relaxed)
    }

    pub fn describe(&self) -> String {
        self.poller.source.describe()
    }
}

impl<S: SnapshotSource> Drop for Subscription<S> {
    fn drop(&mut self) {
        self.task.abort();
        // The in-flight fetch holds the poller; release it so the state
        // channel closes and watchers see the end.
        self.poller
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
