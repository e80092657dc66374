//! `FeedbackTransport` trait and the server-sent-events implementation.
//!
//! The analysis service exposes its feedback channel as a long-lived
//! `text/event-stream` response.  Frames named `exercise_feedback` (or plain
//! `message` frames) carry a JSON body of the form `{ "text": "..." }`.
//! A 2xx response with an open event-stream body is treated as the handshake
//! acknowledgment; the `session` query parameter doubles as the
//! session-start notification, which the service is free to ignore.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use thiserror::Error;

use crate::channel::event::FeedbackEvent;
use crate::session::SessionId;

// ---------------------------------------------------------------------------
// ChannelError
// ---------------------------------------------------------------------------

/// Errors that can occur on the feedback channel.
///
/// All variants are non-fatal for the session as a whole: a failed channel
/// only disables real-time feedback, the batch flow continues.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The handshake did not complete within the configured timeout.
    #[error("feedback channel connect timed out")]
    ConnectTimeout,

    /// The service refused the connection (non-2xx handshake response).
    #[error("feedback channel handshake failed: {0}")]
    Handshake(String),

    /// The underlying connection failed mid-stream or could not be opened.
    #[error("feedback channel transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// FeedbackTransport trait
// ---------------------------------------------------------------------------

/// Stream of decoded feedback events for one connection.
pub type EventStream = BoxStream<'static, Result<FeedbackEvent, ChannelError>>;

/// Object-safe, thread-safe interface over the feedback wire protocol.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn FeedbackTransport>` and shared with the reconnecting pump task.
///
/// # Contract
///
/// - `open` resolves only once the service has acknowledged the connection;
///   the caller applies the bounded connect timeout.
/// - The returned stream ends (`None`) on orderly close and yields `Err`
///   on transport failure; both are treated as unexpected disconnects.
#[async_trait]
pub trait FeedbackTransport: Send + Sync {
    /// Open a persistent connection for `session` against `base_url`.
    async fn open(&self, base_url: &str, session: &SessionId)
        -> Result<EventStream, ChannelError>;
}

// Compile-time assertion: Box<dyn FeedbackTransport> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn FeedbackTransport>) {}
};

// ---------------------------------------------------------------------------
// SSE frame decoding
// ---------------------------------------------------------------------------

/// Event name the service uses for exercise corrections.
pub const FEEDBACK_EVENT_NAME: &str = "exercise_feedback";

#[derive(Debug, Deserialize)]
struct WireFeedback {
    text: String,
}

/// Incremental server-sent-events decoder.
///
/// Byte chunks go in (in whatever sizes the transport delivers them),
/// complete [`FeedbackEvent`]s come out.  Comment lines (`:` prefix) and
/// unknown fields (`id`, `retry`) are ignored; frames with an unexpected
/// event name or an undecodable body are logged and skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event_name: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes; returns every event completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FeedbackEvent> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                // Blank line terminates a frame.
                if let Some(event) = self.dispatch() {
                    out.push(event);
                }
            } else {
                self.field(line);
            }
        }
        out
    }

    /// Accumulate one `name: value` field line into the current frame.
    fn field(&mut self, line: &str) {
        if line.starts_with(':') {
            return; // comment / keep-alive
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match name {
            "event" => self.event_name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {} // id, retry
        }
    }

    /// Close out the current frame, producing an event when it decodes.
    fn dispatch(&mut self) -> Option<FeedbackEvent> {
        let name = self.event_name.take();
        let data = std::mem::take(&mut self.data);

        if data.is_empty() {
            return None;
        }

        if let Some(name) = name.as_deref() {
            if name != FEEDBACK_EVENT_NAME && name != "message" {
                log::debug!("channel: ignoring frame with event name {name:?}");
                return None;
            }
        }

        let payload = data.join("\n");
        match serde_json::from_str::<WireFeedback>(&payload) {
            Ok(wire) => Some(FeedbackEvent::now(wire.text)),
            Err(e) => {
                log::warn!("channel: undecodable feedback frame ({e}); skipping");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SseTransport
// ---------------------------------------------------------------------------

/// Production transport: one `GET {base}/api/feedback` event-stream request
/// per connection.
///
/// The client deliberately carries no request timeout — the stream is
/// expected to stay open for the whole session.  The bounded *connect*
/// timeout is applied by [`ChannelManager`](crate::channel::ChannelManager).
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SseTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackTransport for SseTransport {
    async fn open(
        &self,
        base_url: &str,
        session: &SessionId,
    ) -> Result<EventStream, ChannelError> {
        let url = format!("{base_url}/api/feedback");

        let response = self
            .client
            .get(&url)
            .query(&[("session", session.to_string())])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Handshake(format!("HTTP {status}")));
        }

        log::debug!("channel: event stream open for session {session}");

        let mut decoder = SseDecoder::new();
        let events = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<FeedbackEvent, ChannelError>> = match chunk {
                Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(ChannelError::Transport(e.to_string()))],
            };
            stream::iter(items)
        });

        Ok(events.boxed())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
