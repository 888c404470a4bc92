//! Caller-facing events emitted by a scale session.
//! Everything a UI needs flows through one bounded channel.

use crate::error::ErrorKind;
use crate::types::Reading;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TrySendError},
};
use log::warn;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Connected { device_name: Option<String> },
    Data { reading: Reading },
    /// Every telemetry buffer, decodable or not.
    Raw { bytes: Vec<u8> },
    Disconnected,
    Error { kind: ErrorKind, message: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::Data { .. } => "data",
            SessionEvent::Raw { .. } => "raw",
            SessionEvent::Disconnected => "disconnected",
            SessionEvent::Error { .. } => "error",
        }
    }

    /// Connection and error events, which a full channel never drops.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, SessionEvent::Data { .. } | SessionEvent::Raw { .. })
    }
}

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub type SessionEventChannel = Channel<CriticalSectionRawMutex, SessionEvent, EVENT_CHANNEL_CAPACITY>;

/// Non-blocking sender half used by the session.
///
/// Telemetry is handled synchronously, so events are offered with
/// `try_send`. When the caller stops draining, new telemetry is dropped
/// while lifecycle events evict the oldest queued telemetry instead.
#[derive(Clone)]
pub struct EventPublisher {
    channel: Arc<SessionEventChannel>,
}

impl EventPublisher {
    pub fn new(channel: Arc<SessionEventChannel>) -> Self {
        Self { channel }
    }

    pub fn publish(&self, event: SessionEvent) {
        let event = match self.channel.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => event,
        };

        if !event.is_lifecycle() {
            warn!("Event channel full - dropping {} event", event.name());
            return;
        }

        self.evict_oldest();
        if let Err(TrySendError::Full(event)) = self.channel.try_send(event) {
            warn!("Event channel full - dropping {} event", event.name());
        }
    }

    // Frees one slot, preferring the oldest telemetry event
    fn evict_oldest(&self) {
        let mut queued = drain(&self.channel);
        if queued.is_empty() {
            return;
        }
        let victim = queued.iter().position(|e| !e.is_lifecycle()).unwrap_or(0);
        let evicted = queued.remove(victim);
        warn!("Event channel full - evicting queued {} event", evicted.name());

        for event in queued {
            let _ = self.channel.try_send(event);
        }
    }

    pub fn connected(&self, device_name: Option<String>) {
        self.publish(SessionEvent::Connected { device_name });
    }

    pub fn data(&self, reading: Reading) {
        self.publish(SessionEvent::Data { reading });
    }

    pub fn raw(&self, bytes: Vec<u8>) {
        self.publish(SessionEvent::Raw { bytes });
    }

    pub fn disconnected(&self) {
        self.publish(SessionEvent::Disconnected);
    }

    pub fn error(&self, kind: ErrorKind, message: String) {
        self.publish(SessionEvent::Error { kind, message });
    }
}

/// Drains whatever is currently queued without waiting.
pub fn drain(channel: &SessionEventChannel) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = channel.try_receive() {
        events.push(event);
    }
    events
}
