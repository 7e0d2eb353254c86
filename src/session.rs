//! Per-call session record.
//!
//! One [`CallSession`] exists per bridged call. It is created when the
//! telephony connection is accepted, mutated by the lifecycle controller and
//! the relay loops, and destroyed at teardown. Nothing about it persists
//! beyond the call.
//!
//! The record is shared between the two relay loops behind a `tokio` RwLock:
//! `stream_sid` is written exactly once by the inbound loop (on the
//! telephony `start` event) and read by the outbound loop when it addresses
//! audio back to the call leg.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Lifecycle phase of a bridged call.
///
/// Phases advance monotonically; no phase is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CallPhase {
    /// Telephony connection accepted, model connection being opened
    #[default]
    Connecting,
    /// Session configuration sent, waiting for acknowledgment
    Configuring,
    /// Both connections live, audio relaying
    Active,
    /// Teardown in progress
    Closing,
    /// Terminal; no further events accepted
    Closed,
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallPhase::Connecting => write!(f, "connecting"),
            CallPhase::Configuring => write!(f, "configuring"),
            CallPhase::Active => write!(f, "active"),
            CallPhase::Closing => write!(f, "closing"),
            CallPhase::Closed => write!(f, "closed"),
        }
    }
}

/// Mutable state for one bridged call.
#[derive(Debug, Default)]
pub struct CallSession {
    /// Correlation id for logs, generated at accept time
    pub call_id: String,
    /// Telephony stream identifier, set once by the inbound relay loop
    pub stream_sid: Option<String>,
    /// Caller phone number, carried in the stream's custom parameters
    pub caller_phone: Option<String>,
    phase: CallPhase,
}

/// Session record shared between the controller and the relay loops.
pub type SharedSession = Arc<RwLock<CallSession>>;

impl CallSession {
    /// Create a fresh session record in the `Connecting` phase.
    pub fn new() -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    /// Create the shared form used by the bridge tasks.
    pub fn shared() -> SharedSession {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    /// Advance to a later phase.
    ///
    /// Returns `false` without mutating when `next` would not move forward;
    /// the phase order is strictly monotonic and teardown may race with the
    /// relay loops, so a stale transition is ignored rather than applied.
    pub fn advance(&mut self, next: CallPhase) -> bool {
        if next > self.phase {
            tracing::debug!(call_id = %self.call_id, from = %self.phase, to = %next, "phase transition");
            self.phase = next;
            true
        } else {
            false
        }
    }

    /// Record the telephony stream identity from the `start` event.
    pub fn begin_stream(&mut self, stream_sid: String, caller_phone: Option<String>) {
        if self.stream_sid.is_some() {
            tracing::warn!(call_id = %self.call_id, "duplicate stream start ignored");
            return;
        }
        tracing::info!(
            call_id = %self.call_id,
            stream_sid = %stream_sid,
            caller = caller_phone.as_deref().unwrap_or("unknown"),
            "media stream started"
        );
        self.stream_sid = Some(stream_sid);
        self.caller_phone = caller_phone;
    }
}
