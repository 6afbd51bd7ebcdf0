// One-shot command execution inside a container, output streamed back

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::StreamStatus;
use super::feed::{self, Feed, Step};
use crate::api::sse::{EventStream, SseEvent};
use crate::api::{ApiClient, ApiError};

/// Submits a command and opens its output stream.
pub trait ExecSource: Send + Sync + 'static {
    fn run(
        &self,
        container_id: &str,
        command: &str,
    ) -> impl Future<Output = Result<EventStream, ApiError>> + Send;
}

impl ExecSource for ApiClient {
    async fn run(&self, container_id: &str, command: &str) -> Result<EventStream, ApiError> {
        self.start_exec(container_id, command).await?;
        self.exec_output(container_id).await
    }
}

fn classify(event: SseEvent) -> Step<String> {
    match event.event.as_str() {
        "output" | "message" => Step::Push(event.data),
        "error" if event.data.is_empty() => Step::Fail("Failed to execute command".to_string()),
        "error" => Step::Fail(event.data),
        "done" | "close" => Step::End,
        _ => Step::Skip,
    }
}

pub struct ExecSession<S: ExecSource> {
    source: Arc<S>,
    container_id: String,
    output: Arc<Feed<String>>,
    task: Option<JoinHandle<()>>,
}

impl<S: ExecSource> ExecSession<S> {
    pub fn new(source: Arc<S>, container_id: impl Into<String>) -> Self {
        Self {
            source,
            container_id: container_id.into(),
            output: Arc::new(Feed::new()),
            task: None,
        }
    }

    /// Runs `command`, replacing any previous run and its output.
    pub fn execute(&mut self, command: &str) {
        self.cancel();
        let generation = self.output.begin();
        let command = command.trim().to_string();
        if self.container_id.is_empty() || command.is_empty() {
            self.output.fail(
                generation,
                "Container ID and command are required".to_string(),
            );
            return;
        }
        let source = Arc::clone(&self.source);
        let output = Arc::clone(&self.output);
        let container_id = self.container_id.clone();
        let span = tracing::info_span!("exec", container = %container_id, generation);
        tracing::info!(container = %container_id, command = %command, "executing command");
        self.task = Some(tokio::spawn(
            async move {
                let opened = source.run(&container_id, &command).await;
                feed::pump(output, generation, opened, classify).await;
            }
            .instrument(span),
        ));
    }

    /// Closes the output stream; collected output is kept.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.output.halt();
        }
    }

    pub fn output(&self) -> Vec<String> {
        self.output.items()
    }

    pub fn status(&self) -> StreamStatus {
        self.output.status()
    }

    pub fn updates(&self) -> watch::Receiver<u64> {
        self.output.updates()
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }
}

impl<S: ExecSource> Drop for ExecSession<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}
