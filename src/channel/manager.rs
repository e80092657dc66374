//! Channel manager — owns the persistent feedback connection.
//!
//! [`ChannelManager`] is a process-lifetime singleton, reused across
//! sessions.  `connect` performs the bounded-timeout handshake and spawns a
//! pump task that forwards decoded events to the coordinator over an mpsc
//! channel, tagged with the session id captured at connect time.
//!
//! # Reconnection policy
//!
//! On an unexpected disconnect (stream error or orderly end) while the
//! session is still current, exactly one automatic reconnect attempt is
//! made.  If that attempt fails — or the stream drops a second time — the
//! channel transitions to [`ConnectionState::Failed`] and stays there until
//! the next `connect`.  Real-time feedback becomes unavailable; the batch
//! upload flow is unaffected.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::event::{ConnectionState, TaggedEvent};
use crate::channel::sse::{ChannelError, EventStream, FeedbackTransport};
use crate::session::SessionId;

// ---------------------------------------------------------------------------
// ChannelManager
// ---------------------------------------------------------------------------

struct ManagerInner {
    transport: Arc<dyn FeedbackTransport>,
    events_tx: mpsc::Sender<TaggedEvent>,
    connect_timeout: Duration,
    state: Mutex<ConnectionState>,
    /// Session the current connection belongs to; `None` once disconnected.
    current_session: Mutex<Option<SessionId>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerInner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }
}

/// Handle to the feedback channel.  Cheap to clone (`Arc` clone); all clones
/// share one connection.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<ManagerInner>,
}

impl ChannelManager {
    /// Create a manager that forwards tagged events into `events_tx`.
    ///
    /// The receiving half belongs to the coordinator, which applies its own
    /// session-id check on top of the manager's.
    pub fn new(
        transport: Arc<dyn FeedbackTransport>,
        connect_timeout: Duration,
        events_tx: mpsc::Sender<TaggedEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                events_tx,
                connect_timeout,
                state: Mutex::new(ConnectionState::Disconnected),
                current_session: Mutex::new(None),
                pump: Mutex::new(None),
            }),
        }
    }

    /// Current channel state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().unwrap()
    }

    /// Establish the persistent connection for `session`.
    ///
    /// Resolves once the service acknowledges the handshake, or fails with
    /// [`ChannelError::ConnectTimeout`] after the configured bound.  Any
    /// previous connection is torn down first, so the manager is safely
    /// reusable across sessions.
    pub async fn connect(
        &self,
        base_url: &str,
        session: SessionId,
    ) -> Result<(), ChannelError> {
        self.disconnect();
        self.inner.set_state(ConnectionState::Connecting);
        // Recorded before the handshake: a disconnect() racing the handshake
        // clears it, and the late-resolving connection is dropped below
        // instead of installed for the dead session.
        *self.inner.current_session.lock().unwrap() = Some(session);

        let stream = match open_with_timeout(&self.inner, base_url, &session).await {
            Ok(stream) => stream,
            Err(e) => {
                let mut current = self.inner.current_session.lock().unwrap();
                if *current == Some(session) {
                    *current = None;
                    self.inner.set_state(ConnectionState::Failed);
                    log::warn!("channel: connect failed for session {session}: {e}");
                }
                return Err(e);
            }
        };

        {
            let current = self.inner.current_session.lock().unwrap();
            if *current != Some(session) {
                // Torn down while the handshake was in flight; dropping the
                // stream closes the connection.
                log::debug!("channel: discarding handshake for torn-down session {session}");
                return Ok(());
            }

            let pump = tokio::spawn(pump_events(
                Arc::clone(&self.inner),
                base_url.to_string(),
                session,
                stream,
            ));
            *self.inner.pump.lock().unwrap() = Some(pump);
        }

        self.inner.set_state(ConnectionState::Connected);
        log::info!("channel: connected to {base_url} for session {session}");

        Ok(())
    }

    /// Tear down the connection.  Idempotent and safe to call from any
    /// state; after it returns, no further events for the old session are
    /// delivered.
    pub fn disconnect(&self) {
        if let Some(pump) = self.inner.pump.lock().unwrap().take() {
            pump.abort();
        }
        *self.inner.current_session.lock().unwrap() = None;
        self.inner.set_state(ConnectionState::Disconnected);
    }
}

/// Handshake with the bounded connect timeout applied.
async fn open_with_timeout(
    inner: &ManagerInner,
    base_url: &str,
    session: &SessionId,
) -> Result<EventStream, ChannelError> {
    match tokio::time::timeout(inner.connect_timeout, inner.transport.open(base_url, session))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(ChannelError::ConnectTimeout),
    }
}

// ---------------------------------------------------------------------------
// Pump task
// ---------------------------------------------------------------------------

/// Forward decoded events to the coordinator until the stream dies.
///
/// Events are delivered strictly in arrival order.  Every event is checked
/// against the manager's current session before forwarding; a mismatch means
/// the connection is stale and the pump exits.
async fn pump_events(
    inner: Arc<ManagerInner>,
    base_url: String,
    session: SessionId,
    mut stream: EventStream,
) {
    let mut reconnected = false;

    loop {
        match stream.next().await {
            Some(Ok(event)) => {
                let stale = *inner.current_session.lock().unwrap() != Some(session);
                if stale {
                    log::debug!("channel: discarding event for stale session {session}");
                    break;
                }
                if inner
                    .events_tx
                    .send(TaggedEvent { session, event })
                    .await
                    .is_err()
                {
                    // Coordinator gone; nothing left to deliver to.
                    break;
                }
            }

            // Stream error or orderly end: both are unexpected disconnects
            // from the session's point of view.
            disconnect => {
                if let Some(Err(e)) = disconnect {
                    log::warn!("channel: stream error: {e}");
                } else {
                    log::info!("channel: stream closed by service");
                }

                let still_current = *inner.current_session.lock().unwrap() == Some(session);
                if !still_current {
                    break;
                }

                if reconnected {
                    inner.set_state(ConnectionState::Failed);
                    log::warn!(
                        "channel: connection lost again after reconnect; \
                         real-time feedback unavailable"
                    );
                    break;
                }

                reconnected = true;
                match open_with_timeout(&inner, &base_url, &session).await {
                    Ok(new_stream) => {
                        stream = new_stream;
                        inner.set_state(ConnectionState::Connected);
                        log::info!("channel: reconnected for session {session}");
                    }
                    Err(e) => {
                        inner.set_state(ConnectionState::Failed);
                        log::warn!(
                            "channel: reconnect failed ({e}); real-time feedback unavailable"
                        );
                        break;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
