//! Error types for the voice session bridge.
//!
//! The taxonomy separates fatal pre-audio failures (connect and handshake
//! errors, which abort setup before any audio is relayed) from in-call
//! conditions (transport or model drop-outs, which trigger a graceful
//! teardown rather than an error report).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a bridged call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The model endpoint could not be reached. Fatal, pre-audio.
    #[error("model connect failed: {0}")]
    ConnectFailure(String),

    /// The model rejected the session configuration. Fatal, pre-audio.
    #[error("model rejected session configuration: {0}")]
    HandshakeRejected(String),

    /// The model never acknowledged the session configuration.
    #[error("no session acknowledgment within {0:?}")]
    HandshakeTimeout(Duration),

    /// Telephony transport failure (send on a closed connection).
    #[error("transport error: {0}")]
    Transport(String),

    /// Model session failure (send on a closed connection).
    #[error("model session error: {0}")]
    Model(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Whether the error occurred before any audio could have been relayed.
    pub fn is_pre_audio(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectFailure(_)
                | BridgeError::HandshakeRejected(_)
                | BridgeError::HandshakeTimeout(_)
                | BridgeError::Config(_)
        )
    }
}
