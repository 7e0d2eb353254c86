//! Connection and handshake for the realtime model session.

use futures_util::{SinkExt, StreamExt};
use http::Request;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{
    ClientEvent, ServerEvent, SessionConfig, TranscriptionConfig, TurnDetection,
};
use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};
use crate::waitlist;

/// Outbound event channel depth. Audio frames dominate the traffic.
const CLIENT_BUFFER: usize = 256;

/// Inbound event channel depth.
const SERVER_BUFFER: usize = 256;

// =============================================================================
// Handle
// =============================================================================

/// Handle for sending events to the model session.
///
/// Cloneable; all clones feed the same writer task.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    tx: mpsc::Sender<ClientEvent>,
    shutdown: CancellationToken,
}

impl ModelHandle {
    /// Assemble a handle from its channel halves.
    pub fn new(tx: mpsc::Sender<ClientEvent>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    /// Send one event to the model.
    pub async fn send(&self, event: ClientEvent) -> BridgeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::Model("model session closed".to_string()));
        }
        self.tx
            .send(event)
            .await
            .map_err(|_| BridgeError::Model("model writer gone".to_string()))
    }

    /// Stop the session tasks. Safe to call more than once.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Open the realtime WebSocket and spawn its reader and writer tasks.
///
/// Returns a handle for outbound events and a receiver of parsed inbound
/// events. The receiver yields `None` when the upstream socket closes; that
/// is the model-disconnect signal for the lifecycle controller.
pub async fn connect(
    config: &BridgeConfig,
) -> BridgeResult<(ModelHandle, mpsc::Receiver<ServerEvent>)> {
    let api_key = config
        .openai_api_key
        .as_deref()
        .ok_or_else(|| BridgeError::Config("OPENAI_API_KEY not configured".to_string()))?;

    let url = format!("{}?model={}", config.realtime_url, config.realtime_model);
    let host = url::Url::parse(&url)
        .map_err(|e| BridgeError::ConnectFailure(format!("invalid realtime URL: {e}")))?
        .host_str()
        .ok_or_else(|| BridgeError::ConnectFailure("realtime URL has no host".to_string()))?
        .to_string();

    let request = Request::builder()
        .uri(&url)
        .header("Host", host)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("OpenAI-Beta", "realtime=v1")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tokio_tungstenite::tungstenite::handshake::client::generate_key(),
        )
        .body(())
        .map_err(|e| BridgeError::ConnectFailure(format!("bad upgrade request: {e}")))?;

    let (stream, response) = connect_async(request)
        .await
        .map_err(|e| BridgeError::ConnectFailure(format!("realtime connect failed: {e}")))?;
    debug!(status = %response.status(), "realtime session connected");

    let (mut ws_sink, mut ws_stream) = stream.split();
    let (client_tx, mut client_rx) = mpsc::channel::<ClientEvent>(CLIENT_BUFFER);
    let (server_tx, server_rx) = mpsc::channel::<ServerEvent>(SERVER_BUFFER);
    let shutdown = CancellationToken::new();

    let handle = ModelHandle::new(client_tx, shutdown.clone());

    // Writer: client events -> upstream socket
    let writer_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = writer_shutdown.cancelled() => break,
                event = client_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize model event");
                    continue;
                }
            };
            if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                debug!(error = %e, "model socket write failed, stopping writer");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Reader: upstream socket -> server events
    let reader_shutdown = shutdown;
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = reader_shutdown.cancelled() => break,
                msg = ws_stream.next() => msg,
            };
            match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if server_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "unparseable model event skipped");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("model socket closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "model socket read error");
                    break;
                }
            }
        }
        // Dropping server_tx surfaces the disconnect to the controller
    });

    Ok((handle, server_rx))
}

// =============================================================================
// Handshake
// =============================================================================

/// Build the session configuration from bridge settings.
///
/// Both audio formats are G.711 u-law so frames relay byte-for-byte between
/// the telephony leg and the model.
pub fn build_session_config(config: &BridgeConfig) -> SessionConfig {
    SessionConfig {
        modalities: vec!["text".to_string(), "audio".to_string()],
        voice: config.voice.clone(),
        instructions: config.instructions.clone(),
        input_audio_format: "g711_ulaw".to_string(),
        output_audio_format: "g711_ulaw".to_string(),
        input_audio_transcription: Some(TranscriptionConfig {
            model: config.transcription_model.clone(),
        }),
        turn_detection: TurnDetection {
            kind: "server_vad".to_string(),
            threshold: config.vad_threshold,
            prefix_padding_ms: config.vad_prefix_padding_ms,
            silence_duration_ms: config.vad_silence_duration_ms,
        },
        tools: vec![waitlist::tool_schema()],
        tool_choice: "auto".to_string(),
    }
}

/// Run the configuration handshake: send `session.update`, then wait for the
/// acknowledgment within the configured bound.
///
/// Events other than the acknowledgment and errors are ignored while
/// waiting; `session.created` in particular routinely arrives first.
pub async fn configure(
    handle: &ModelHandle,
    events: &mut mpsc::Receiver<ServerEvent>,
    session: SessionConfig,
    timeout: std::time::Duration,
) -> BridgeResult<()> {
    handle.send(ClientEvent::SessionUpdate { session }).await?;

    let wait = async {
        loop {
            match events.recv().await {
                Some(ServerEvent::SessionUpdated) => {
                    info!("model session configured");
                    return Ok(());
                }
                Some(ServerEvent::Error { error }) => {
                    return Err(BridgeError::HandshakeRejected(format!(
                        "{}: {}",
                        error.kind, error.message
                    )));
                }
                Some(other) => {
                    debug!(event = ?other, "event before configuration acknowledgment");
                }
                None => {
                    return Err(BridgeError::Model(
                        "model disconnected during handshake".to_string(),
                    ));
                }
            }
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| BridgeError::HandshakeTimeout(timeout))?
}
