// Server-Sent Events decoding over a streaming response body

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;

use super::ApiError;

/// One dispatched event. `event` defaults to "message" when the server
/// sends no `event:` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// Stream of decoded events; dropping it closes the connection.
pub type EventStream = BoxStream<'static, Result<SseEvent, ApiError>>;

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// events anywhere; complete events come out in arrival order.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                out.push(event);
            }
        }
        out
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // retry and unknown fields carry nothing we act on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

/// Adapts a byte stream into decoded events. A trailing event without its
/// terminating blank line is discarded at end of stream.
pub fn decode_stream<S, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let body = Box::pin(body);
    stream::unfold(
        (body, SseDecoder::new(), VecDeque::new(), false),
        |(mut body, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(event) = ready.pop_front() {
                    return Some((Ok(event), (body, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.feed(&chunk)),
                    Some(Err(e)) => {
                        done = true;
                        return Some((
                            Err(ApiError::Network(e.to_string())),
                            (body, decoder, ready, done),
                        ));
                    }
                    None => done = true,
                }
            }
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_events() {
        let mut d = SseDecoder::new();
        let events = d.feed(b"event: log\ndata: 2024-01-01T00:00:00Z: hello\n\n");
        assert_eq!(
            events,
            vec![SseEvent::new("log", "2024-01-01T00:00:00Z: hello")]
        );
    }

    #[test]
    fn handles_split_chunks_and_crlf() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"event: out").is_empty());
        assert!(d.feed(b"put\r\ndata: a b").is_empty());
        let events = d.feed(b"c\r\n\r\n");
        assert_eq!(events, vec![SseEvent::new("output", "a bc")]);
    }

    #[test]
    fn joins_multiline_data_and_skips_comments() {
        let mut d = SseDecoder::new();
        let events = d.feed(b": keepalive\ndata: one\ndata: two\n\n");
        assert_eq!(events, vec![SseEvent::new("message", "one\ntwo")]);
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"event: close\n\n").is_empty());
        let events = d.feed(b"event: close\ndata:\n\n");
        assert_eq!(events, vec![SseEvent::new("close", "")]);
    }

    #[tokio::test]
    async fn decode_stream_drops_unterminated_tail() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"event: log\ndata: first\n\n")),
            Ok(Bytes::from_static(b"event: log\ndata: partial")),
        ];
        let events: Vec<_> = decode_stream(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().data, "first");
    }
}
