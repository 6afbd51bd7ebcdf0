// Generation-checked append buffer fed by one event stream at a time

use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::StreamStatus;
use crate::api::ApiError;
use crate::api::sse::{EventStream, SseEvent};

/// What to do with one inbound event.
pub(crate) enum Step<T> {
    Push(T),
    Fail(String),
    End,
    Skip,
}

struct FeedState<T> {
    items: Vec<T>,
    is_streaming: bool,
    error: Option<String>,
    /// Bumped on every start and stop; writers carrying an older value are ignored.
    generation: u64,
    /// Bumped whenever the buffer is emptied.
    epoch: u64,
}

pub(crate) struct Feed<T> {
    state: Mutex<FeedState<T>>,
    updates: watch::Sender<u64>,
}

impl<T: Clone> Feed<T> {
    pub(crate) fn new() -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            state: Mutex::new(FeedState {
                items: Vec::new(),
                is_streaming: false,
                error: None,
                generation: 0,
                epoch: 0,
            }),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.updates.send_modify(|rev| *rev += 1);
    }

    /// Clears the buffer and marks a new stream live; returns its generation.
    pub(crate) fn begin(&self) -> u64 {
        let generation = {
            let mut s = self.lock();
            s.generation += 1;
            s.epoch += 1;
            s.items.clear();
            s.is_streaming = true;
            s.error = None;
            s.generation
        };
        self.notify();
        generation
    }

    /// Supersedes the live stream without touching the buffer.
    pub(crate) fn halt(&self) {
        {
            let mut s = self.lock();
            s.generation += 1;
            s.is_streaming = false;
        }
        self.notify();
    }

    pub(crate) fn clear(&self) {
        {
            let mut s = self.lock();
            s.epoch += 1;
            s.items.clear();
        }
        self.notify();
    }

    /// Returns false when `generation` has been superseded.
    pub(crate) fn append(&self, generation: u64, item: T) -> bool {
        {
            let mut s = self.lock();
            if s.generation != generation {
                return false;
            }
            s.items.push(item);
        }
        self.notify();
        true
    }

    pub(crate) fn fail(&self, generation: u64, message: String) {
        {
            let mut s = self.lock();
            if s.generation != generation {
                return;
            }
            s.is_streaming = false;
            s.error = Some(message);
        }
        self.notify();
    }

    pub(crate) fn finish(&self, generation: u64) {
        {
            let mut s = self.lock();
            if s.generation != generation {
                return;
            }
            s.is_streaming = false;
        }
        self.notify();
    }

    pub(crate) fn has_started(&self) -> bool {
        self.lock().generation > 0
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub(crate) fn items_since(&self, offset: usize) -> Vec<T> {
        let s = self.lock();
        s.items.get(offset..).map(<[T]>::to_vec).unwrap_or_default()
    }

    /// Items past `offset` when `epoch` is current, otherwise every item.
    /// Returns the current epoch alongside.
    pub(crate) fn items_after(&self, epoch: u64, offset: usize) -> (u64, Vec<T>) {
        let s = self.lock();
        let start = if s.epoch == epoch { offset } else { 0 };
        let items = s.items.get(start..).map(<[T]>::to_vec).unwrap_or_default();
        (s.epoch, items)
    }

    pub(crate) fn filter_items(&self, mut keep: impl FnMut(&T) -> bool) -> Vec<T> {
        self.lock().items.iter().filter(|i| keep(i)).cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn status(&self) -> StreamStatus {
        let s = self.lock();
        StreamStatus {
            is_streaming: s.is_streaming,
            error: s.error.clone(),
        }
    }

    pub(crate) fn updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }
}

/// Drains `opened` into `feed` until the stream ends, fails, or is superseded.
pub(crate) async fn pump<T, F>(
    feed: Arc<Feed<T>>,
    generation: u64,
    opened: Result<EventStream, ApiError>,
    mut classify: F,
) where
    T: Clone,
    F: FnMut(SseEvent) -> Step<T>,
{
    let mut stream = match opened {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, operation = "open_stream", "stream connection failed");
            feed.fail(generation, e.to_string());
            return;
        }
    };
    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, operation = "read_stream", "stream read failed");
                feed.fail(generation, e.to_string());
                return;
            }
        };
        match classify(event) {
            Step::Push(item) => {
                if !feed.append(generation, item) {
                    tracing::debug!(generation, "stream superseded; dropping late event");
                    return;
                }
            }
            Step::Fail(message) => {
                tracing::warn!(error = %message, "server reported stream error");
                feed.fail(generation, message);
                return;
            }
            Step::End => break,
            Step::Skip => {}
        }
    }
    tracing::debug!(generation, "stream ended");
    feed.finish(generation);
}
