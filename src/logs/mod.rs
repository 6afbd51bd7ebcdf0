// Live log tailing and container exec output

mod exec;
mod feed;
mod tailer;

pub use exec::{ExecSession, ExecSource};
pub use tailer::{LogExport, LogReader, LogSource, LogTailer};

use std::path::PathBuf;
use thiserror::Error;

/// Connection status of a streaming buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStatus {
    pub is_streaming: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerPhase {
    /// Never started.
    Idle,
    Streaming,
    /// Stopped by the caller, the server, or an error.
    Stopped,
}

#[derive(Error, Debug)]
pub enum TailerError {
    #[error("no logs to download")]
    NothingToDownload,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
