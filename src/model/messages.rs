//! OpenAI Realtime API wire protocol types.
//!
//! Both directions are JSON tagged by a `type` field. Only the events the
//! bridge acts on are modeled; everything else the server sends collapses
//! into [`ServerEvent::Unknown`] and is ignored, so protocol additions do
//! not break a deployed bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Client -> server
// =============================================================================

/// Events the bridge sends to the model.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure voice, instructions, audio formats, turn detection and tools
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append one base64 audio frame to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Ask the model to produce a response (used for the opening greeting and
    /// after a function result)
    #[serde(rename = "response.create")]
    ResponseCreate,

    /// Insert a conversation item, e.g. a function call result
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
}

/// Session configuration sent in `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub voice: String,
    pub instructions: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
    pub turn_detection: TurnDetection,
    pub tools: Vec<Value>,
    pub tool_choice: String,
}

/// Input transcription settings.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionConfig {
    pub model: String,
}

/// Server-side voice activity detection settings.
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Conversation items the bridge inserts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    /// Result of an executed function call, correlated by `call_id`
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

// =============================================================================
// Server -> client
// =============================================================================

/// Events the bridge receives from the model.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Fatal or recoverable error report
    #[serde(rename = "error")]
    Error { error: ErrorDetail },

    /// Session established, configuration not yet applied
    #[serde(rename = "session.created")]
    SessionCreated,

    /// Configuration acknowledged; the handshake completion signal
    #[serde(rename = "session.updated")]
    SessionUpdated,

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated,

    /// Response generation finished
    #[serde(rename = "response.done")]
    ResponseDone,

    /// One chunk of response audio, base64-encoded
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    /// Response audio complete
    #[serde(rename = "response.audio.done")]
    AudioDone,

    /// Transcript of the audio the model just spoke
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone { transcript: String },

    /// Caller started speaking; triggers barge-in
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Transcript of what the caller said
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted { transcript: String },

    /// A tool invocation with complete arguments
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        name: String,
        arguments: String,
    },

    /// Any event type the bridge does not act on
    #[serde(other)]
    Unknown,
}

/// Payload of a server `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_update_serialization() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: vec!["text".to_string(), "audio".to_string()],
                voice: "alloy".to_string(),
                instructions: "Greet the caller.".to_string(),
                input_audio_format: "g711_ulaw".to_string(),
                output_audio_format: "g711_ulaw".to_string(),
                input_audio_transcription: Some(TranscriptionConfig {
                    model: "whisper-1".to_string(),
                }),
                turn_detection: TurnDetection {
                    kind: "server_vad".to_string(),
                    threshold: 0.5,
                    prefix_padding_ms: 300,
                    silence_duration_ms: 500,
                },
                tools: vec![],
                tool_choice: "auto".to_string(),
            },
        };
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["output_audio_format"], "g711_ulaw");
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
    }

    #[test]
    fn test_audio_append_serialization() {
        let event = ClientEvent::InputAudioBufferAppend {
            audio: "QUJD".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"input_audio_buffer.append","audio":"QUJD"}"#);
    }

    #[test]
    fn test_response_create_serialization() {
        let json = serde_json::to_string(&ClientEvent::ResponseCreate).unwrap();
        assert_eq!(json, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn test_function_call_output_serialization() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: "call_1".to_string(),
                output: r#"{"success":true}"#.to_string(),
            },
        };
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "call_1");
    }

    #[test]
    fn test_audio_delta_deserialization() {
        let json = r#"{"type": "response.audio.delta", "event_id": "ev_1",
                       "response_id": "resp_1", "item_id": "item_1",
                       "output_index": 0, "content_index": 0, "delta": "QUJD"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::AudioDelta { delta } => assert_eq!(delta, "QUJD"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_speech_started_deserialization() {
        let json = r#"{"type": "input_audio_buffer.speech_started",
                       "event_id": "ev_2", "audio_start_ms": 120, "item_id": "item_2"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::SpeechStarted));
    }

    #[test]
    fn test_function_call_arguments_done_deserialization() {
        let json = r#"{"type": "response.function_call_arguments.done",
                       "event_id": "ev_3", "response_id": "resp_1", "item_id": "item_3",
                       "output_index": 0, "call_id": "call_9", "name": "submit_waitlist",
                       "arguments": "{\"fullName\":\"Ada\"}"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                assert_eq!(call_id, "call_9");
                assert_eq!(name, "submit_waitlist");
                assert!(arguments.contains("fullName"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_error_deserialization() {
        let json = r#"{"type": "error", "event_id": "ev_4",
                       "error": {"type": "invalid_request_error", "code": "bad_schema",
                                 "message": "unknown parameter"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.kind, "invalid_request_error");
                assert_eq!(error.code.as_deref(), Some("bad_schema"));
                assert_eq!(error.message, "unknown parameter");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unmodeled_event_maps_to_unknown() {
        let json = r#"{"type": "rate_limits.updated", "event_id": "ev_5", "rate_limits": []}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }
}
