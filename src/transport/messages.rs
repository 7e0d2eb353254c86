//! Twilio Media Streams wire protocol types.
//!
//! The protocol is JSON over a duplex WebSocket, tagged by an `event` field.
//!
//! Inbound (Twilio -> bridge):
//! - `connected` - handshake notice, precedes `start`
//! - `start` - stream identity and custom parameters
//! - `media` - one base64 G.711 u-law frame
//! - `mark` - playback checkpoint acknowledgment
//! - `stop` - call ended
//!
//! Outbound (bridge -> Twilio):
//! - `media` - one base64 G.711 u-law frame addressed to a stream
//! - `clear` - discard buffered, unplayed audio (barge-in)
//!
//! Audio payloads are relayed opaquely; the bridge never decodes them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound events
// =============================================================================

/// Events received from the telephony stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportEvent {
    /// WebSocket-level handshake notice
    Connected,

    /// Stream identity; arrives once, before any media we may act on
    Start {
        /// Stream metadata
        start: StreamStart,
    },

    /// One inbound audio frame
    Media {
        /// Frame payload
        media: MediaFrame,
    },

    /// Playback checkpoint acknowledgment (unused by the bridge)
    Mark,

    /// Caller hung up or Twilio ended the stream
    Stop,
}

/// Metadata carried by the `start` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStart {
    /// Identifier for this media stream
    #[serde(rename = "streamSid")]
    pub stream_sid: String,

    /// Parameters set by the TwiML `<Stream>` element
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

impl StreamStart {
    /// Caller phone number, if the TwiML embedded one.
    pub fn caller_phone(&self) -> Option<&str> {
        self.custom_parameters
            .get("callerPhone")
            .map(String::as_str)
    }
}

/// One audio frame from either direction of the stream.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MediaFrame {
    /// Base64-encoded G.711 u-law audio
    pub payload: String,
}

// =============================================================================
// Outbound commands
// =============================================================================

/// Commands sent back to the telephony stream.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportCommand {
    /// One outbound audio frame
    Media {
        /// Stream to play the frame on
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Frame payload
        media: MediaFrame,
    },

    /// Discard any buffered, unplayed audio on the stream
    Clear {
        /// Stream to clear
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl TransportCommand {
    /// Build an outbound media frame.
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        TransportCommand::Media {
            stream_sid: stream_sid.into(),
            media: MediaFrame {
                payload: payload.into(),
            },
        }
    }

    /// Build a barge-in clear command.
    pub fn clear(stream_sid: impl Into<String>) -> Self {
        TransportCommand::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_event_deserialization() {
        let json = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "accountSid": "AC0000",
                "callSid": "CA0000",
                "streamSid": "MZ123",
                "tracks": ["inbound"],
                "customParameters": {"callerPhone": "+15551234567"}
            },
            "streamSid": "MZ123"
        }"#;
        let event: TransportEvent = serde_json::from_str(json).unwrap();
        match event {
            TransportEvent::Start { start } => {
                assert_eq!(start.stream_sid, "MZ123");
                assert_eq!(start.caller_phone(), Some("+15551234567"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_media_event_deserialization() {
        let json = r#"{
            "event": "media",
            "sequenceNumber": "7",
            "media": {"track": "inbound", "chunk": "5", "timestamp": "120", "payload": "QUJD"}
        }"#;
        let event: TransportEvent = serde_json::from_str(json).unwrap();
        match event {
            TransportEvent::Media { media } => assert_eq!(media.payload, "QUJD"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_stop_event_tolerates_extra_fields() {
        let json = r#"{"event": "stop", "sequenceNumber": "9", "stop": {"callSid": "CA0000"}}"#;
        let event: TransportEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, TransportEvent::Stop));
    }

    #[test]
    fn test_start_without_custom_parameters() {
        let json = r#"{"event": "start", "start": {"streamSid": "MZ1"}}"#;
        let event: TransportEvent = serde_json::from_str(json).unwrap();
        match event {
            TransportEvent::Start { start } => assert_eq!(start.caller_phone(), None),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_an_error() {
        let result: Result<TransportEvent, _> =
            serde_json::from_str(r#"{"event": "dtmf", "dtmf": {"digit": "1"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_media_command_wire_format() {
        let cmd = TransportCommand::media("SID1", "QUJD");
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(
            json,
            r#"{"event":"media","streamSid":"SID1","media":{"payload":"QUJD"}}"#
        );
    }

    #[test]
    fn test_clear_command_wire_format() {
        let cmd = TransportCommand::clear("SID1");
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"event":"clear","streamSid":"SID1"}"#);
    }
}
