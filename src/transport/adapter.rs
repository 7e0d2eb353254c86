//! WebSocket adapter over a Twilio media stream.
//!
//! [`split`] turns an accepted socket into a channel pair: a receiver of
//! parsed [`TransportEvent`]s and a [`TransportSender`] for outbound
//! commands. Two tasks run per call, a reader that parses inbound frames and
//! a writer that serializes outbound commands.
//!
//! The writer keeps two lanes. Media frames queue on a wide buffer; `clear`
//! commands travel on a short dedicated lane the writer drains with priority,
//! so a barge-in clear is never stuck behind queued audio.

use std::fmt::Display;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::messages::{TransportCommand, TransportEvent};
use crate::errors::{BridgeError, BridgeResult};

/// Inbound event channel depth. At 20ms per telephony frame this is several
/// seconds of headroom.
const EVENT_BUFFER: usize = 256;

/// Outbound media channel depth.
const MEDIA_BUFFER: usize = 256;

/// Clear lane depth. Barge-in is rare and the lane is drained first.
const CLEAR_BUFFER: usize = 8;

// =============================================================================
// Sender half
// =============================================================================

/// Handle for sending commands to the telephony stream.
///
/// Cloneable; all clones feed the same writer task. Closing is idempotent
/// and causes every subsequent send to fail with a transport error.
#[derive(Debug, Clone)]
pub struct TransportSender {
    media_tx: mpsc::Sender<TransportCommand>,
    clear_tx: mpsc::Sender<TransportCommand>,
    shutdown: CancellationToken,
}

impl TransportSender {
    /// Assemble a sender from its channel lanes.
    pub fn new(
        media_tx: mpsc::Sender<TransportCommand>,
        clear_tx: mpsc::Sender<TransportCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            media_tx,
            clear_tx,
            shutdown,
        }
    }

    /// Queue one audio frame for playback on the stream.
    pub async fn send_media(&self, stream_sid: &str, payload: String) -> BridgeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::Transport("transport closed".to_string()));
        }
        self.media_tx
            .send(TransportCommand::media(stream_sid, payload))
            .await
            .map_err(|_| BridgeError::Transport("transport writer gone".to_string()))
    }

    /// Queue a barge-in clear, bypassing queued media.
    pub async fn send_clear(&self, stream_sid: &str) -> BridgeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(BridgeError::Transport("transport closed".to_string()));
        }
        self.clear_tx
            .send(TransportCommand::clear(stream_sid))
            .await
            .map_err(|_| BridgeError::Transport("transport writer gone".to_string()))
    }

    /// Stop the writer task. Safe to call more than once.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Whether the sender has been closed.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

// =============================================================================
// Writer loop
// =============================================================================

/// Serialize outbound commands into a text sink until shutdown.
///
/// The select is biased: shutdown first, then the clear lane, then media.
/// A clear that arrives while media frames are queued is written before any
/// of them, and the queued frames are discarded. They predate the
/// interruption; delivering them after the clear would make the call leg
/// play stale audio it was just told to drop.
pub async fn run_writer<S>(
    sink: &mut S,
    mut media_rx: mpsc::Receiver<TransportCommand>,
    mut clear_rx: mpsc::Receiver<TransportCommand>,
    shutdown: CancellationToken,
) where
    S: Sink<String> + Unpin,
    S::Error: Display,
{
    let mut clear_open = true;
    let mut media_open = true;

    while clear_open || media_open {
        let command = tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,
            cmd = clear_rx.recv(), if clear_open => match cmd {
                Some(cmd) => cmd,
                None => {
                    clear_open = false;
                    continue;
                }
            },
            cmd = media_rx.recv(), if media_open => match cmd {
                Some(cmd) => cmd,
                None => {
                    media_open = false;
                    continue;
                }
            },
        };

        // Frames queued at the moment a clear is picked predate the
        // interruption; written after the clear, the call leg would play
        // audio it was just told to drop.
        if matches!(command, TransportCommand::Clear { .. }) {
            let mut discarded = 0usize;
            while media_rx.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                debug!(frames = discarded, "stale media discarded on clear");
            }
        }

        let json = match serde_json::to_string(&command) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize transport command");
                continue;
            }
        };

        if let Err(e) = sink.send(json).await {
            debug!(error = %e, "telephony socket write failed, stopping writer");
            break;
        }
    }
}

// =============================================================================
// Socket split
// =============================================================================

/// Split an accepted telephony socket into an event receiver and a command
/// sender, spawning the per-call reader and writer tasks.
///
/// The event receiver yields `None` when the socket closes or errors; that is
/// the transport-disconnect signal for the lifecycle controller.
pub fn split(socket: WebSocket) -> (TransportSender, mpsc::Receiver<TransportEvent>) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let (media_tx, media_rx) = mpsc::channel(MEDIA_BUFFER);
    let (clear_tx, clear_rx) = mpsc::channel(CLEAR_BUFFER);
    let shutdown = CancellationToken::new();

    let sender = TransportSender::new(media_tx, clear_tx, shutdown.clone());

    // Reader: telephony socket -> event channel
    let reader_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = reader_shutdown.cancelled() => break,
                msg = ws_stream.next() => msg,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<TransportEvent>(&text) {
                        Ok(event) => {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "unparseable telephony frame skipped");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("telephony socket closed");
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/pong handled by axum; binary frames unused
                }
                Some(Err(e)) => {
                    debug!(error = %e, "telephony socket read error");
                    break;
                }
            }
        }
        // Dropping event_tx surfaces the disconnect to the controller
    });

    // Writer: command channels -> telephony socket
    let writer_shutdown = shutdown;
    tokio::spawn(async move {
        let mut sink = ws_sink.with(|json: String| {
            std::future::ready(Ok::<Message, axum::Error>(Message::Text(json.into())))
        });
        run_writer(&mut sink, media_rx, clear_rx, writer_shutdown).await;
        let _ = sink.close().await;
    });

    (sender, event_rx)
}
