// Tails an entity's log stream into an ordered in-memory buffer

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::feed::{self, Feed, Step};
use super::{StreamStatus, TailerError, TailerPhase};
use crate::api::sse::{EventStream, SseEvent};
use crate::api::{ApiClient, ApiError};
use crate::models::{EntityId, EntityKind, LogFormat, LogRecord, render_export};

/// Opens one log stream for an entity.
pub trait LogSource: Send + Sync + 'static {
    fn open(
        &self,
        target: &EntityId,
        lines: u32,
    ) -> impl Future<Output = Result<EventStream, ApiError>> + Send;
}

impl LogSource for ApiClient {
    async fn open(&self, target: &EntityId, lines: u32) -> Result<EventStream, ApiError> {
        self.stream_logs(target, lines).await
    }
}

const CONNECT_FAILED: &str = "Failed to connect to log stream";

fn classify(format: LogFormat, event: SseEvent) -> Step<LogRecord> {
    match event.event.as_str() {
        "log" | "output" | "message" => Step::Push(format.parse(&event.data)),
        "error" => {
            if event.data.is_empty() {
                Step::Fail(CONNECT_FAILED.to_string())
            } else {
                Step::Fail(event.data)
            }
        }
        "close" | "done" => Step::End,
        _ => Step::Skip,
    }
}

/// A rendered log download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogExport {
    pub file_name: String,
    pub contents: String,
}

impl LogExport {
    fn file_name_for(target: &EntityId) -> String {
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
        let id = target.id.replace(['/', '\\'], "_");
        match target.kind {
            EntityKind::Service => format!("{}-logs-{}.txt", id, stamp),
            EntityKind::Container => format!("container-{}-logs-{}.txt", id, stamp),
        }
    }

    /// Writes the export into `dir` and returns the full path.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, TailerError> {
        let path = dir.as_ref().join(&self.file_name);
        std::fs::write(&path, &self.contents).map_err(|source| TailerError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "logs saved");
        Ok(path)
    }
}

/// Read-only view of a tailer's buffer that can be moved into other tasks.
#[derive(Clone)]
pub struct LogReader {
    feed: Arc<Feed<LogRecord>>,
    updates: watch::Receiver<u64>,
    epoch: u64,
    seen: usize,
}

impl LogReader {
    pub fn records(&self) -> Vec<LogRecord> {
        self.feed.items()
    }

    /// Records appended after the first `offset`.
    pub fn since(&self, offset: usize) -> Vec<LogRecord> {
        self.feed.items_since(offset)
    }

    /// Records this reader has not returned yet. After the buffer is cleared
    /// or a new stream begins, picks up from the first record again.
    pub fn unseen(&mut self) -> Vec<LogRecord> {
        let (epoch, fresh) = self.feed.items_after(self.epoch, self.seen);
        if epoch != self.epoch {
            self.epoch = epoch;
            self.seen = 0;
        }
        self.seen += fresh.len();
        fresh
    }

    pub fn len(&self) -> usize {
        self.feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> StreamStatus {
        self.feed.status()
    }

    /// Waits for the next buffer or status change.
    pub async fn changed(&mut self) {
        // The sender lives in the shared feed, so it outlives this reader.
        let _ = self.updates.changed().await;
    }
}

/// Owns at most one live log connection for a single entity.
pub struct LogTailer<S: LogSource> {
    source: Arc<S>,
    target: EntityId,
    lines: u32,
    feed: Arc<Feed<LogRecord>>,
    task: Option<JoinHandle<()>>,
}

impl<S: LogSource> LogTailer<S> {
    pub fn new(source: Arc<S>, target: EntityId, lines: u32) -> Self {
        Self {
            source,
            target,
            lines,
            feed: Arc::new(Feed::new()),
            task: None,
        }
    }

    /// Constructs and starts streaming immediately.
    pub fn spawn(source: Arc<S>, target: EntityId, lines: u32) -> Self {
        let mut tailer = Self::new(source, target, lines);
        tailer.start();
        tailer
    }

    fn close_connection(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Closes any open connection, clears the buffer and reconnects.
    pub fn start(&mut self) {
        self.close_connection();
        let generation = self.feed.begin();
        let source = Arc::clone(&self.source);
        let feed = Arc::clone(&self.feed);
        let target = self.target.clone();
        let lines = self.lines;
        let format = LogFormat::for_kind(target.kind);
        let span = tracing::info_span!("log_tail", entity = %target, lines, generation);
        tracing::info!(entity = %target, lines, "starting log stream");
        self.task = Some(tokio::spawn(
            async move {
                let opened = source.open(&target, lines).await;
                feed::pump(feed, generation, opened, |event| classify(format, event)).await;
            }
            .instrument(span),
        ));
    }

    /// Closes the connection and keeps the buffer.
    pub fn stop(&mut self) {
        self.close_connection();
        self.feed.halt();
        tracing::info!(entity = %self.target, "log stream stopped");
    }

    pub fn clear_and_restart(&mut self) {
        self.feed.clear();
        self.start();
    }

    /// Restarts with the new line count when streaming; otherwise only records
    /// it and clears the buffer. The current count is a no-op.
    pub fn set_lines(&mut self, lines: u32) {
        if lines == self.lines {
            return;
        }
        self.lines = lines;
        if self.feed.status().is_streaming {
            self.start();
        } else {
            self.feed.clear();
        }
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn target(&self) -> &EntityId {
        &self.target
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.feed.items()
    }

    /// Case-insensitive substring match on the message; empty text keeps all.
    pub fn filtered(&self, text: &str) -> Vec<LogRecord> {
        let needle = text.to_lowercase();
        self.feed
            .filter_items(|record| record.message_contains(&needle))
    }

    pub fn status(&self) -> StreamStatus {
        self.feed.status()
    }

    pub fn phase(&self) -> TailerPhase {
        if !self.feed.has_started() {
            TailerPhase::Idle
        } else if self.feed.status().is_streaming {
            TailerPhase::Streaming
        } else {
            TailerPhase::Stopped
        }
    }

    /// Ticks on every buffer or status change.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.feed.updates()
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            feed: Arc::clone(&self.feed),
            updates: self.feed.updates(),
            epoch: 0,
            seen: 0,
        }
    }

    /// Renders the buffer for saving. Fails when there is nothing to save.
    pub fn download(&self) -> Result<LogExport, TailerError> {
        let records = self.feed.items();
        if records.is_empty() {
            tracing::warn!(entity = %self.target, "no logs to download");
            return Err(TailerError::NothingToDownload);
        }
        Ok(LogExport {
            file_name: LogExport::file_name_for(&self.target),
            contents: render_export(&records),
        })
    }
}

impl<S: LogSource> Drop for LogTailer<S> {
    fn drop(&mut self) {
        self.close_connection();
        self.feed.halt();
    }
}
