// Log records parsed from raw stream payloads

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use super::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub message: String,
}

/// Payload layout of a log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `"<timestamp>: <message>"` (journal output).
    Service,
    /// `"<timestamp> <message>"` (container runtime output).
    Container,
}

impl LogFormat {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Service => LogFormat::Service,
            EntityKind::Container => LogFormat::Container,
        }
    }

    fn delimiter(self) -> &'static str {
        match self {
            LogFormat::Service => ": ",
            LogFormat::Container => " ",
        }
    }

    /// Splits at the first delimiter. Payloads without one (or starting with
    /// it) keep the whole text as message, stamped with the receipt time.
    pub fn parse(self, payload: &str) -> LogRecord {
        self.parse_or(payload, received_now)
    }

    pub fn parse_or(self, payload: &str, received_at: impl FnOnce() -> String) -> LogRecord {
        let delimiter = self.delimiter();
        match payload.find(delimiter) {
            Some(idx) if idx > 0 => LogRecord {
                timestamp: payload[..idx].to_string(),
                message: payload[idx + delimiter.len()..].to_string(),
            },
            _ => LogRecord {
                timestamp: received_at(),
                message: payload.to_string(),
            },
        }
    }
}

fn received_now() -> String {
    chrono::Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

impl LogRecord {
    pub fn new(timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
        }
    }

    /// Export line: `"<timestamp>: <message>"`.
    pub fn to_line(&self) -> String {
        format!("{}: {}", self.timestamp, self.message)
    }

    /// `needle` must already be lowercase.
    pub fn message_contains(&self, needle: &str) -> bool {
        needle.is_empty() || self.message.to_lowercase().contains(needle)
    }
}

/// Joins records into the export text, one `"<timestamp>: <message>"` per line.
pub fn render_export(records: &[LogRecord]) -> String {
    records
        .iter()
        .map(LogRecord::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads export text back into records, one per line. A message that
/// itself contains a newline (a multi-line `data:` event) comes back as
/// several records, the later ones stamped with the time of parsing.
pub fn parse_export(contents: &str) -> Vec<LogRecord> {
    if contents.is_empty() {
        return Vec::new();
    }
    contents
        .split('\n')
        .map(|line| LogFormat::Service.parse(line))
        .collect()
}
