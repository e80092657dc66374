//! Real-time feedback channel.
//!
//! This module provides:
//! * [`FeedbackEvent`] / [`TaggedEvent`] — inbound feedback payloads.
//! * [`ConnectionState`] — channel lifecycle state.
//! * [`FeedbackTransport`] — async trait over the wire protocol.
//! * [`SseTransport`] — production transport speaking `text/event-stream`.
//! * [`ChannelManager`] — owns the connection, tags events with the session
//!   id active at connect time, and performs the single automatic reconnect.
//! * [`ChannelError`] — error variants for channel operations.
//!
//! # Event flow
//!
//! ```text
//! service ──SSE frames──▶ SseTransport ──FeedbackEvent──▶ pump task
//!                                                          │ session tag check
//!                                                          ▼
//!                                        mpsc ──TaggedEvent──▶ coordinator
//! ```

pub mod event;
pub mod manager;
pub mod sse;

pub use event::{ConnectionState, FeedbackEvent, TaggedEvent};
pub use manager::ChannelManager;
pub use sse::{ChannelError, EventStream, FeedbackTransport, SseTransport};
