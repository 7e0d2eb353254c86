//! Call bridging between the telephony leg and the model session.
//!
//! The lifecycle controller owns the call from accept to teardown. Two relay
//! loops move audio, the function dispatcher executes tool calls, and a
//! single close path tears both legs down no matter which side ends first.

pub mod controller;
pub mod dispatch;
pub mod relay;

pub use controller::{BridgeIo, run_call};
pub use dispatch::FunctionDispatcher;

/// Why a bridged call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Telephony `stop` event, the normal hangup path
    TransportStopped,
    /// Telephony socket dropped without a `stop`
    TransportDisconnected,
    /// Model socket dropped
    ModelDisconnected,
    /// Model reported a fatal error
    ModelError(String),
    /// Bridge-wide shutdown requested
    Cancelled,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::TransportStopped => write!(f, "caller hung up"),
            CloseReason::TransportDisconnected => write!(f, "telephony stream dropped"),
            CloseReason::ModelDisconnected => write!(f, "model session dropped"),
            CloseReason::ModelError(msg) => write!(f, "model error: {msg}"),
            CloseReason::Cancelled => write!(f, "shutdown requested"),
        }
    }
}
