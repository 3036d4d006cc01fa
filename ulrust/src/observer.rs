//! Session event sink
//!
//! Sessions report what they do to a [`SessionObserver`] supplied by the
//! caller. [`TracingObserver`] forwards everything to `tracing`.

use ulrust_core::{CommandCode, KeyExchangeKind, ResponseCode, SessionState};

/// Something that happened during a request batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// Wake-up receiver contacted
    WakeUp { receiver: String },

    ConnectAttempt { attempt: u32, max: u32 },

    KeyNegotiated { kind: KeyExchangeKind },

    CommandSent { command: CommandCode },

    ResponseReceived { code: ResponseCode },

    /// A notification could not be used and was dropped
    FrameDiscarded { reason: String },
}

/// Receives session events
///
/// Called inline from the session task and from notification callbacks, so
/// implementations must not block.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, address: &str, event: &SessionEvent) {
        let _ = (address, event);
    }
}

/// Observer that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Observer that logs events with `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, address: &str, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged { from, to } => {
                tracing::debug!(address, %from, %to, "Session state changed");
            }
            SessionEvent::WakeUp { receiver } => {
                tracing::info!(address, %receiver, "Waking lock");
            }
            SessionEvent::ConnectAttempt { attempt, max } => {
                tracing::debug!(address, attempt, max, "Connect attempt");
            }
            SessionEvent::KeyNegotiated { kind } => {
                tracing::debug!(address, %kind, "Session key negotiated");
            }
            SessionEvent::CommandSent { command } => {
                tracing::debug!(address, %command, "Command sent");
            }
            SessionEvent::ResponseReceived { code } => {
                tracing::debug!(address, %code, "Response received");
            }
            SessionEvent::FrameDiscarded { reason } => {
                tracing::warn!(address, %reason, "Frame discarded");
            }
        }
    }
}
