//! Session coordinator.
//!
//! # Overview
//!
//! Owns the session lifecycle end to end and is the single writer of session
//! state.  One `run` loop multiplexes three inputs:
//!
//! ```text
//!   SessionCommand ──┐
//!   TaggedEvent ─────┼─▶ run() ─▶ SharedView + SessionEvent stream
//!   upload verdict ──┘
//! ```
//!
//! A `Start` walks the attempt through permission check, media acquisition,
//! channel connect and video submission.  The channel connect is best-effort
//! and runs concurrently with the upload: if it fails, the session degrades
//! to batch-only with a warning instead of aborting.  Cancel/Reset tear
//! everything down (disconnect, halt speech, drop the in-flight submission)
//! before the `Idle` state is reported.
//!
//! Every in-flight side effect is tagged with the session id.  Results and
//! feedback arriving for a session that is no longer current are logged and
//! discarded, never applied.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{ChannelManager, TaggedEvent};
use crate::media::{CaptureGate, MediaSource};
use crate::session::error::SessionError;
use crate::session::state::{Session, SessionId, SessionState, SessionView, SharedView};
use crate::speech::SpeechQueue;
use crate::upload::{AnalysisResult, UploadError, VideoSubmitter};

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Commands accepted by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Begin a new analysis attempt.  Ignored (with a warning) while one is
    /// already underway or sitting in a terminal state awaiting reset.
    Start,
    /// Abort the current attempt and return to `Idle`.
    Cancel,
    /// Clear a terminal state and return to `Idle`.  Equivalent to `Cancel`
    /// when an attempt is still in flight.
    Reset,
}

/// Notifications pushed to the presentation layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A live feedback line, already queued for speech.
    Feedback { text: String },
    /// Non-fatal degradation, e.g. batch-only mode after a failed connect.
    Warning(String),
    Completed(AnalysisResult),
    Failed(SessionError),
}

type Verdict = (SessionId, Result<AnalysisResult, UploadError>);

// ---------------------------------------------------------------------------
// SessionCoordinator
// ---------------------------------------------------------------------------

/// Drives the session state machine.  Constructed once at startup, consumed
/// by [`SessionCoordinator::run`].
pub struct SessionCoordinator {
    view: SharedView,
    gate: Arc<dyn CaptureGate>,
    source: Arc<dyn MediaSource>,
    submitter: Arc<dyn VideoSubmitter>,
    channel: ChannelManager,
    speech: Arc<SpeechQueue>,
    base_url: String,
    events_tx: mpsc::Sender<SessionEvent>,

    // Taken by run().
    channel_events: Option<mpsc::Receiver<TaggedEvent>>,
    verdict_rx: Option<mpsc::Receiver<Verdict>>,

    verdict_tx: mpsc::Sender<Verdict>,
    session: Option<Session>,
    pending: Option<(SessionId, JoinHandle<()>)>,
}

impl SessionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        view: SharedView,
        gate: Arc<dyn CaptureGate>,
        source: Arc<dyn MediaSource>,
        submitter: Arc<dyn VideoSubmitter>,
        channel: ChannelManager,
        channel_events: mpsc::Receiver<TaggedEvent>,
        speech: Arc<SpeechQueue>,
        base_url: String,
        events_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (verdict_tx, verdict_rx) = mpsc::channel(4);
        Self {
            view,
            gate,
            source,
            submitter,
            channel,
            speech,
            base_url,
            events_tx,
            channel_events: Some(channel_events),
            verdict_rx: Some(verdict_rx),
            verdict_tx,
            session: None,
            pending: None,
        }
    }

    /// Main loop.  Runs until the command channel closes and no submission
    /// is in flight.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let Some(mut channel_events) = self.channel_events.take() else {
            return;
        };
        let Some(mut verdict_rx) = self.verdict_rx.take() else {
            return;
        };
        let mut commands_open = true;

        log::info!("session: coordinator running");

        while commands_open || self.pending.is_some() {
            // Biased polling keeps the ordering contract: commands preempt,
            // and feedback already queued is handled before a verdict that
            // resolved after it.
            tokio::select! {
                biased;

                cmd = commands.recv(), if commands_open => match cmd {
                    Some(SessionCommand::Start) => self.handle_start().await,
                    Some(SessionCommand::Cancel | SessionCommand::Reset) => {
                        self.teardown().await;
                    }
                    None => commands_open = false,
                },
                Some(tagged) = channel_events.recv() => {
                    self.handle_feedback(tagged).await;
                }
                Some((id, verdict)) = verdict_rx.recv() => {
                    self.handle_verdict(id, verdict).await;
                }
            }
        }

        log::info!("session: command channel closed, coordinator shutting down");
    }

    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    async fn handle_start(&mut self) {
        if self.session.is_some() || self.pending.is_some() {
            log::warn!("session: start ignored — {}", SessionError::Busy);
            return;
        }

        let session = Session::new();
        let id = session.id;
        log::info!("session {id}: starting");
        self.session = Some(session);
        *self.view.lock().unwrap() = SessionView::default();

        self.set_state(SessionState::PermissionPending).await;
        if !self.gate.request_access().await {
            self.fail(SessionError::PermissionDenied).await;
            return;
        }

        self.set_state(SessionState::Capturing).await;
        let media = match self.source.acquire().await {
            Ok(Some(request)) => request,
            Ok(None) => {
                log::info!("session {id}: selection cancelled by user");
                self.session = None;
                self.view.lock().unwrap().state = SessionState::Idle;
                let _ = self
                    .events_tx
                    .send(SessionEvent::StateChanged(SessionState::Idle))
                    .await;
                return;
            }
            Err(e) => {
                self.fail(e.into()).await;
                return;
            }
        };

        self.set_state(SessionState::Uploading).await;

        // Channel connect must never delay the upload: fire it concurrently
        // and degrade to batch-only on failure.
        {
            let channel = self.channel.clone();
            let base_url = self.base_url.clone();
            let events_tx = self.events_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = channel.connect(&base_url, id).await {
                    let warning = SessionError::ConnectFailed(e.to_string());
                    log::warn!("session {id}: {warning}; continuing batch-only");
                    let _ = events_tx.send(SessionEvent::Warning(warning.to_string())).await;
                }
            });
        }

        let submitter = Arc::clone(&self.submitter);
        let verdict_tx = self.verdict_tx.clone();
        let submit = tokio::spawn(async move {
            let verdict = submitter.submit(&media).await;
            let _ = verdict_tx.send((id, verdict)).await;
        });
        self.pending = Some((id, submit));

        // Single-phase service: no separate received-acknowledgement, so the
        // session moves to Analyzing as soon as the submission is dispatched.
        self.set_state(SessionState::Analyzing).await;
    }

    // -----------------------------------------------------------------------
    // Verdict
    // -----------------------------------------------------------------------

    async fn handle_verdict(&mut self, id: SessionId, verdict: Result<AnalysisResult, UploadError>) {
        if self.pending.as_ref().map(|(pid, _)| *pid) == Some(id) {
            self.pending = None;
        }
        let Some(session) = self.session.as_ref() else {
            log::debug!("session: dropping verdict for torn-down session {id}");
            return;
        };
        if session.id != id {
            log::debug!("session {}: dropping stale verdict for {id}", session.id);
            return;
        }

        match verdict {
            Ok(result) => {
                log::info!("session {id}: analysis complete");
                if let Some(summary) = result.summary_text.as_deref() {
                    if !summary.is_empty() {
                        self.speech.enqueue(summary);
                    }
                }
                self.view.lock().unwrap().result = Some(result.clone());
                self.set_state(SessionState::Completed).await;
                let _ = self.events_tx.send(SessionEvent::Completed(result)).await;
            }
            Err(UploadError::Busy) => {
                // Contract violation, not a session failure: the running
                // submission is unaffected.
                log::warn!("session {id}: {}", SessionError::Busy);
            }
            Err(e) => self.fail(e.into()).await,
        }
    }

    // -----------------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------------

    async fn handle_feedback(&mut self, tagged: TaggedEvent) {
        let Some(session) = self.session.as_ref() else {
            log::debug!("session: dropping feedback for torn-down session {}", tagged.session);
            return;
        };
        if tagged.session != session.id {
            log::debug!("session {}: dropping stale feedback for {}", session.id, tagged.session);
            return;
        }
        if !session.state.accepts_feedback() {
            log::debug!(
                "session {}: dropping feedback in state {}",
                session.id,
                session.state.label()
            );
            return;
        }

        let text = tagged.event.text;
        log::debug!("session {}: feedback: {text}", session.id);
        self.speech.enqueue(text.clone());
        self.view.lock().unwrap().latest_feedback = Some(text.clone());
        let _ = self.events_tx.send(SessionEvent::Feedback { text }).await;
    }

    // -----------------------------------------------------------------------
    // State changes, failure, teardown
    // -----------------------------------------------------------------------

    async fn set_state(&mut self, state: SessionState) {
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
        self.view.lock().unwrap().state = state;
        log::debug!("session: state -> {}", state.label());
        let _ = self.events_tx.send(SessionEvent::StateChanged(state)).await;
    }

    async fn fail(&mut self, error: SessionError) {
        log::error!("session: {error}");
        // Queued feedback is moot once the attempt has failed; an utterance
        // already playing finishes naturally.
        self.speech.clear();
        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(error.clone());
        }
        {
            let mut view = self.view.lock().unwrap();
            view.last_error = Some(error.to_string());
            view.error_kind = Some(error.kind());
        }
        self.set_state(SessionState::Error).await;
        let _ = self.events_tx.send(SessionEvent::Failed(error)).await;
    }

    /// Tear everything down and return to `Idle`.  All side effects are
    /// issued before the state change is reported.
    async fn teardown(&mut self) {
        let had_session = self.session.take().is_some();
        if let Some((id, submit)) = self.pending.take() {
            log::info!("session {id}: aborting in-flight submission");
            submit.abort();
        }
        self.channel.disconnect();
        self.speech.flush_and_stop();

        let was_idle = {
            let mut view = self.view.lock().unwrap();
            let was_idle = view.state == SessionState::Idle;
            *view = SessionView::default();
            was_idle
        };
        if had_session || !was_idle {
            log::info!("session: torn down");
            let _ = self
                .events_tx
                .send(SessionEvent::StateChanged(SessionState::Idle))
                .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use tokio::time::sleep;

    use crate::channel::{ChannelError, EventStream, FeedbackEvent, FeedbackTransport};
    use crate::media::MediaError;
    use crate::session::error::ErrorKind;
    use crate::session::state::new_shared_view;
    use crate::speech::{SpeechEngine, SpeechError};
    use crate::upload::{AnalysisMessage, UploadRequest};

    // -- doubles -----------------------------------------------------------

    struct StaticGate(bool);

    #[async_trait]
    impl CaptureGate for StaticGate {
        async fn request_access(&self) -> bool {
            self.0
        }
    }

    struct StubSource(Result<Option<UploadRequest>, MediaError>);

    #[async_trait]
    impl MediaSource for StubSource {
        async fn acquire(&self) -> Result<Option<UploadRequest>, MediaError> {
            self.0.clone()
        }
    }

    struct StubSubmitter {
        verdict: Result<AnalysisResult, UploadError>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VideoSubmitter for StubSubmitter {
        async fn submit(&self, _request: &UploadRequest) -> Result<AnalysisResult, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            self.verdict.clone()
        }
    }

    struct RecordingSpeech {
        spoken: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SpeechEngine for RecordingSpeech {
        async fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    enum Channel {
        /// Connects; events arrive from the harness feed.
        Live,
        /// `open` never completes, so connect times out.
        Hang,
    }

    struct TestTransport {
        behavior: Channel,
        feed: Mutex<Option<mpsc::Receiver<FeedbackEvent>>>,
        opens: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FeedbackTransport for TestTransport {
        async fn open(
            &self,
            _base_url: &str,
            _session: &SessionId,
        ) -> Result<EventStream, ChannelError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Channel::Live => {
                    let rx = self
                        .feed
                        .lock()
                        .unwrap()
                        .take()
                        .ok_or_else(|| ChannelError::Transport("feed consumed".into()))?;
                    Ok(stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|event| (Ok(event), rx))
                    })
                    .boxed())
                }
                Channel::Hang => futures::future::pending().await,
            }
        }
    }

    // -- harness -----------------------------------------------------------

    struct Harness {
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::Receiver<SessionEvent>,
        view: SharedView,
        spoken: Arc<Mutex<Vec<String>>>,
        submit_calls: Arc<AtomicUsize>,
        opens: Arc<AtomicUsize>,
        /// Feeds the Live transport (tagged by the channel manager).
        feed_tx: mpsc::Sender<FeedbackEvent>,
        /// Injects directly into the coordinator, bypassing the manager.
        tag_tx: mpsc::Sender<TaggedEvent>,
        runner: tokio::task::JoinHandle<()>,
    }

    fn spawn_harness(
        granted: bool,
        source: Result<Option<UploadRequest>, MediaError>,
        verdict: Result<AnalysisResult, UploadError>,
        delay: Duration,
        behavior: Channel,
    ) -> Harness {
        let view = new_shared_view();
        let (tag_tx, tag_rx) = mpsc::channel(32);
        let (feed_tx, feed_rx) = mpsc::channel(32);
        let opens = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(TestTransport {
            behavior,
            feed: Mutex::new(Some(feed_rx)),
            opens: Arc::clone(&opens),
        });
        let channel = ChannelManager::new(transport, Duration::from_millis(100), tag_tx.clone());

        let spoken = Arc::new(Mutex::new(Vec::new()));
        let speech = Arc::new(SpeechQueue::new(Arc::new(RecordingSpeech {
            spoken: Arc::clone(&spoken),
        })));

        let submit_calls = Arc::new(AtomicUsize::new(0));
        let submitter = Arc::new(StubSubmitter {
            verdict,
            delay,
            calls: Arc::clone(&submit_calls),
        });

        let (events_tx, events) = mpsc::channel(64);
        let (commands, commands_rx) = mpsc::channel(8);
        let coordinator = SessionCoordinator::new(
            view.clone(),
            Arc::new(StaticGate(granted)),
            Arc::new(StubSource(source)),
            submitter,
            channel,
            tag_rx,
            speech,
            "http://localhost:0".into(),
            events_tx,
        );
        let runner = tokio::spawn(coordinator.run(commands_rx));

        Harness {
            commands,
            events,
            view,
            spoken,
            submit_calls,
            opens,
            feed_tx,
            tag_tx,
            runner,
        }
    }

    fn some_request() -> UploadRequest {
        UploadRequest::from_path("/videos/squats.mp4")
    }

    fn good_result() -> AnalysisResult {
        AnalysisResult {
            summary_text: Some("Good form".into()),
            messages: vec![AnalysisMessage {
                role: "assistant".into(),
                content: "Keep your elbows tucked in".into(),
            }],
        }
    }

    /// Receives events until `pred` matches one; returns everything seen.
    async fn drive_until(
        events: &mut mpsc::Receiver<SessionEvent>,
        mut pred: impl FnMut(&SessionEvent) -> bool,
    ) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
                .await
                .expect("timed out waiting for a session event")
                .expect("event channel closed");
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..300 {
            if cond() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 3s");
    }

    fn states_of(seen: &[SessionEvent]) -> Vec<SessionState> {
        seen.iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    // -- scenarios ---------------------------------------------------------

    #[tokio::test]
    async fn permission_denial_stops_before_any_side_effect() {
        let mut h = spawn_harness(
            false,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::ZERO,
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Failed(_))).await;
        match seen.last() {
            Some(SessionEvent::Failed(err)) => {
                assert_eq!(err.kind(), ErrorKind::PermissionDenied)
            }
            other => panic!("expected Failed, got {other:?}"),
        }

        assert_eq!(h.view.lock().unwrap().state, SessionState::Error);
        assert_eq!(
            h.view.lock().unwrap().error_kind,
            Some(ErrorKind::PermissionDenied)
        );
        assert_eq!(h.opens.load(Ordering::SeqCst), 0);
        assert_eq!(h.submit_calls.load(Ordering::SeqCst), 0);

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_selection_returns_to_idle_without_side_effects() {
        let mut h = spawn_harness(
            true,
            Ok(None),
            Ok(good_result()),
            Duration::ZERO,
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| {
            matches!(e, SessionEvent::StateChanged(SessionState::Idle))
        })
        .await;

        assert!(states_of(&seen).contains(&SessionState::Capturing));
        assert!(!seen.iter().any(|e| matches!(e, SessionEvent::Failed(_))));
        assert_eq!(h.view.lock().unwrap().state, SessionState::Idle);
        assert_eq!(h.opens.load(Ordering::SeqCst), 0);
        assert_eq!(h.submit_calls.load(Ordering::SeqCst), 0);

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn happy_path_completes_and_speaks_the_summary() {
        let mut h = spawn_harness(
            true,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::from_millis(50),
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Completed(_))).await;

        let states = states_of(&seen);
        let pos = |s| states.iter().position(|x| *x == s).unwrap();
        assert!(pos(SessionState::Uploading) < pos(SessionState::Analyzing));
        assert!(pos(SessionState::Analyzing) < pos(SessionState::Completed));

        match seen.last() {
            Some(SessionEvent::Completed(result)) => {
                assert_eq!(result.summary_text.as_deref(), Some("Good form"));
                assert_eq!(result.messages[0].content, "Keep your elbows tucked in");
            }
            other => panic!("expected Completed, got {other:?}"),
        }

        let view = h.view.lock().unwrap().clone();
        assert_eq!(view.state, SessionState::Completed);
        assert!(view.result.is_some());

        let spoken = Arc::clone(&h.spoken);
        wait_until(move || *spoken.lock().unwrap() == vec!["Good form".to_string()]).await;

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_upload_surfaces_the_status() {
        let mut h = spawn_harness(
            true,
            Ok(Some(some_request())),
            Err(UploadError::Rejected {
                status: 503,
                cause: "worker pool exhausted".into(),
            }),
            Duration::from_millis(20),
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Failed(_))).await;
        match seen.last() {
            Some(SessionEvent::Failed(SessionError::UploadFailed { status, cause })) => {
                assert_eq!(*status, Some(503));
                assert!(cause.contains("worker pool exhausted"));
            }
            other => panic!("expected UploadFailed, got {other:?}"),
        }

        assert_eq!(h.view.lock().unwrap().state, SessionState::Error);
        assert_eq!(
            h.view.lock().unwrap().error_kind,
            Some(ErrorKind::UploadFailed)
        );
        assert!(h.spoken.lock().unwrap().is_empty());

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn failed_connect_degrades_to_batch_only() {
        let mut h = spawn_harness(
            true,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::from_millis(250),
            Channel::Hang,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Completed(_))).await;

        assert!(seen.iter().any(|e| matches!(e, SessionEvent::Warning(_))));
        assert!(!seen.iter().any(|e| matches!(e, SessionEvent::Feedback { .. })));
        assert_eq!(h.view.lock().unwrap().state, SessionState::Completed);

        let spoken = Arc::clone(&h.spoken);
        wait_until(move || *spoken.lock().unwrap() == vec!["Good form".to_string()]).await;

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn live_feedback_is_spoken_and_surfaced_in_order() {
        let mut h = spawn_harness(
            true,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::from_millis(400),
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        drive_until(&mut h.events, |e| {
            matches!(e, SessionEvent::StateChanged(SessionState::Analyzing))
        })
        .await;

        h.feed_tx
            .send(FeedbackEvent::now("Straighten your back"))
            .await
            .unwrap();
        h.feed_tx
            .send(FeedbackEvent::now("Lower more slowly"))
            .await
            .unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Completed(_))).await;
        let feedback: Vec<&str> = seen
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Feedback { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(feedback, ["Straighten your back", "Lower more slowly"]);
        assert_eq!(
            h.view.lock().unwrap().latest_feedback.as_deref(),
            Some("Lower more slowly")
        );

        let spoken = Arc::clone(&h.spoken);
        wait_until(move || {
            *spoken.lock().unwrap()
                == vec![
                    "Straighten your back".to_string(),
                    "Lower more slowly".to_string(),
                    "Good form".to_string(),
                ]
        })
        .await;

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn second_start_is_ignored_while_an_attempt_runs() {
        let mut h = spawn_harness(
            true,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::from_millis(200),
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Completed(_))).await;
        let completions = seen
            .iter()
            .filter(|e| matches!(e, SessionEvent::Completed(_)))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(h.submit_calls.load(Ordering::SeqCst), 1);

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_tears_down_and_late_events_change_nothing() {
        let mut h = spawn_harness(
            true,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::from_millis(500),
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();
        drive_until(&mut h.events, |e| {
            matches!(e, SessionEvent::StateChanged(SessionState::Analyzing))
        })
        .await;

        h.commands.send(SessionCommand::Cancel).await.unwrap();
        drive_until(&mut h.events, |e| {
            matches!(e, SessionEvent::StateChanged(SessionState::Idle))
        })
        .await;

        // Late events for the dead session: one through the (now disconnected)
        // transport feed, one injected straight past the manager.
        let _ = h.feed_tx.send(FeedbackEvent::now("too late")).await;
        h.tag_tx
            .send(TaggedEvent {
                session: SessionId::new(),
                event: FeedbackEvent::now("wrong session"),
            })
            .await
            .unwrap();
        sleep(Duration::from_millis(150)).await;

        assert!(h.spoken.lock().unwrap().is_empty());
        let view = h.view.lock().unwrap().clone();
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.latest_feedback.is_none());

        drop(h.commands);
        h.runner.await.unwrap();

        // Nothing was completed or surfaced after teardown.
        let mut late = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            late.push(event);
        }
        assert!(!late.iter().any(|e| {
            matches!(e, SessionEvent::Completed(_) | SessionEvent::Feedback { .. })
        }));
    }

    #[tokio::test]
    async fn reset_clears_a_terminal_error() {
        let mut h = spawn_harness(
            false,
            Ok(Some(some_request())),
            Ok(good_result()),
            Duration::ZERO,
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();
        drive_until(&mut h.events, |e| matches!(e, SessionEvent::Failed(_))).await;

        h.commands.send(SessionCommand::Reset).await.unwrap();
        drive_until(&mut h.events, |e| {
            matches!(e, SessionEvent::StateChanged(SessionState::Idle))
        })
        .await;

        let view = h.view.lock().unwrap().clone();
        assert_eq!(view.state, SessionState::Idle);
        assert!(view.last_error.is_none());
        assert!(view.error_kind.is_none());

        drop(h.commands);
        h.runner.await.unwrap();
    }

    #[tokio::test]
    async fn media_failure_is_an_upload_error() {
        let mut h = spawn_harness(
            true,
            Err(MediaError::Unavailable("camera in use".into())),
            Ok(good_result()),
            Duration::ZERO,
            Channel::Live,
        );
        h.commands.send(SessionCommand::Start).await.unwrap();

        let seen = drive_until(&mut h.events, |e| matches!(e, SessionEvent::Failed(_))).await;
        match seen.last() {
            Some(SessionEvent::Failed(err)) => assert_eq!(err.kind(), ErrorKind::UploadFailed),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(h.submit_calls.load(Ordering::SeqCst), 0);

        drop(h.commands);
        h.runner.await.unwrap();
    }
}
