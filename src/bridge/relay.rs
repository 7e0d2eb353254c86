//! Audio relay loops.
//!
//! Two loops run for the life of a call. The inbound loop moves caller audio
//! from the telephony leg into the model's input buffer; the outbound loop
//! moves model audio back to the call leg, fires barge-in clears, and hands
//! completed function calls to the dispatcher.
//!
//! Audio is opaque in both directions; the payload string from one leg is
//! the payload string on the other.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::CloseReason;
use super::dispatch::FunctionDispatcher;
use crate::model::ModelHandle;
use crate::model::messages::{ClientEvent, ServerEvent};
use crate::session::SharedSession;
use crate::transport::{TransportEvent, TransportSender};

/// Relay caller audio into the model until the telephony leg ends.
///
/// Media arriving before the `start` event has no stream identity yet and is
/// dropped rather than buffered.
pub async fn run_inbound(
    events: &mut mpsc::Receiver<TransportEvent>,
    model: &ModelHandle,
    session: &SharedSession,
    cancel: &CancellationToken,
) -> CloseReason {
    let mut started = false;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return CloseReason::Cancelled,
            event = events.recv() => event,
        };

        match event {
            Some(TransportEvent::Connected) => {
                debug!("telephony handshake notice");
            }
            Some(TransportEvent::Start { start }) => {
                let caller_phone = start.caller_phone().map(String::from);
                session
                    .write()
                    .await
                    .begin_stream(start.stream_sid, caller_phone);
                started = true;
            }
            Some(TransportEvent::Media { media }) => {
                if !started {
                    debug!("media before stream start dropped");
                    continue;
                }
                if let Err(e) = model
                    .send(ClientEvent::InputAudioBufferAppend {
                        audio: media.payload,
                    })
                    .await
                {
                    debug!(error = %e, "model send failed, stopping inbound relay");
                    return CloseReason::ModelDisconnected;
                }
            }
            Some(TransportEvent::Mark) => {}
            Some(TransportEvent::Stop) => {
                info!("telephony stream stopped");
                return CloseReason::TransportStopped;
            }
            None => {
                debug!("telephony event channel closed");
                return CloseReason::TransportDisconnected;
            }
        }
    }
}

/// Relay model audio back to the caller until the model leg ends.
///
/// `speech_started` sends a `clear` before any further audio is forwarded,
/// so stale playback stops as soon as the caller interrupts. Audio deltas
/// that arrive before the stream identity is known are dropped.
pub async fn run_outbound(
    events: &mut mpsc::Receiver<ServerEvent>,
    transport: &TransportSender,
    model: &ModelHandle,
    dispatcher: &FunctionDispatcher,
    session: &SharedSession,
    cancel: &CancellationToken,
) -> CloseReason {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return CloseReason::Cancelled,
            event = events.recv() => event,
        };

        match event {
            Some(ServerEvent::AudioDelta { delta }) => {
                let stream_sid = session.read().await.stream_sid.clone();
                let Some(stream_sid) = stream_sid else {
                    debug!("model audio before stream start dropped");
                    continue;
                };
                if let Err(e) = transport.send_media(&stream_sid, delta).await {
                    debug!(error = %e, "transport send failed, stopping outbound relay");
                    return CloseReason::TransportDisconnected;
                }
            }
            Some(ServerEvent::SpeechStarted) => {
                let stream_sid = session.read().await.stream_sid.clone();
                if let Some(stream_sid) = stream_sid {
                    debug!("caller barge-in, clearing queued playback");
                    if let Err(e) = transport.send_clear(&stream_sid).await {
                        debug!(error = %e, "transport send failed, stopping outbound relay");
                        return CloseReason::TransportDisconnected;
                    }
                }
            }
            Some(ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            }) => {
                let caller_phone = session.read().await.caller_phone.clone();
                if let Err(e) = dispatcher
                    .dispatch(model, call_id, &name, &arguments, caller_phone.as_deref())
                    .await
                {
                    debug!(error = %e, "model send failed, stopping outbound relay");
                    return CloseReason::ModelDisconnected;
                }
            }
            Some(ServerEvent::Error { error }) => {
                warn!(kind = %error.kind, message = %error.message, "model reported an error");
                return CloseReason::ModelError(error.message);
            }
            Some(ServerEvent::AudioTranscriptDone { transcript }) => {
                info!(transcript = %transcript, "assistant said");
            }
            Some(ServerEvent::TranscriptionCompleted { transcript }) => {
                info!(transcript = %transcript.trim(), "caller said");
            }
            Some(
                ServerEvent::SessionCreated
                | ServerEvent::SessionUpdated
                | ServerEvent::ResponseCreated
                | ServerEvent::ResponseDone
                | ServerEvent::AudioDone
                | ServerEvent::Unknown,
            ) => {}
            None => {
                debug!("model event channel closed");
                return CloseReason::ModelDisconnected;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CallSession;
    use crate::transport::messages::{MediaFrame, StreamStart, TransportCommand};
    use crate::waitlist::NullWaitlistSink;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn start_event(stream_sid: &str) -> TransportEvent {
        TransportEvent::Start {
            start: StreamStart {
                stream_sid: stream_sid.to_string(),
                custom_parameters: HashMap::new(),
            },
        }
    }

    fn media_event(payload: &str) -> TransportEvent {
        TransportEvent::Media {
            media: MediaFrame {
                payload: payload.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_inbound_drops_media_before_start() {
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (model_tx, mut model_rx) = mpsc::channel(16);
        let model = ModelHandle::new(model_tx, CancellationToken::new());
        let session = CallSession::shared();
        let cancel = CancellationToken::new();

        event_tx.send(media_event("early")).await.unwrap();
        event_tx.send(start_event("MZ1")).await.unwrap();
        event_tx.send(media_event("QUJD")).await.unwrap();
        event_tx.send(TransportEvent::Stop).await.unwrap();

        let reason = run_inbound(&mut event_rx, &model, &session, &cancel).await;
        assert_eq!(reason, CloseReason::TransportStopped);

        // Only the post-start frame reached the model
        match model_rx.recv().await.unwrap() {
            ClientEvent::InputAudioBufferAppend { audio } => assert_eq!(audio, "QUJD"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(model_rx.try_recv().is_err());
        assert_eq!(session.read().await.stream_sid.as_deref(), Some("MZ1"));
    }

    #[tokio::test]
    async fn test_inbound_reports_transport_disconnect() {
        let (event_tx, mut event_rx) = mpsc::channel::<TransportEvent>(16);
        let (model_tx, _model_rx) = mpsc::channel(16);
        let model = ModelHandle::new(model_tx, CancellationToken::new());
        let session = CallSession::shared();
        let cancel = CancellationToken::new();

        drop(event_tx);
        let reason = run_inbound(&mut event_rx, &model, &session, &cancel).await;
        assert_eq!(reason, CloseReason::TransportDisconnected);
    }

    fn outbound_fixture() -> (
        mpsc::Sender<ServerEvent>,
        mpsc::Receiver<ServerEvent>,
        TransportSender,
        mpsc::Receiver<TransportCommand>,
        mpsc::Receiver<TransportCommand>,
        ModelHandle,
        FunctionDispatcher,
        SharedSession,
    ) {
        let (server_tx, server_rx) = mpsc::channel(16);
        let (media_tx, media_rx) = mpsc::channel(16);
        let (clear_tx, clear_rx) = mpsc::channel(16);
        let transport = TransportSender::new(media_tx, clear_tx, CancellationToken::new());
        let (model_tx, _model_rx) = mpsc::channel(16);
        let model = ModelHandle::new(model_tx, CancellationToken::new());
        let dispatcher = FunctionDispatcher::new(Arc::new(NullWaitlistSink));
        let session = CallSession::shared();
        (
            server_tx, server_rx, transport, media_rx, clear_rx, model, dispatcher, session,
        )
    }

    #[tokio::test]
    async fn test_outbound_relays_audio_to_known_stream() {
        let (server_tx, mut server_rx, transport, mut media_rx, _clear_rx, model, dispatcher, session) =
            outbound_fixture();
        session
            .write()
            .await
            .begin_stream("MZ9".to_string(), None);

        server_tx
            .send(ServerEvent::AudioDelta {
                delta: "QUJD".to_string(),
            })
            .await
            .unwrap();
        drop(server_tx);

        let cancel = CancellationToken::new();
        let reason = run_outbound(
            &mut server_rx,
            &transport,
            &model,
            &dispatcher,
            &session,
            &cancel,
        )
        .await;
        assert_eq!(reason, CloseReason::ModelDisconnected);

        assert_eq!(
            media_rx.recv().await.unwrap(),
            TransportCommand::media("MZ9", "QUJD")
        );
    }

    #[tokio::test]
    async fn test_outbound_clears_on_barge_in() {
        let (server_tx, mut server_rx, transport, _media_rx, mut clear_rx, model, dispatcher, session) =
            outbound_fixture();
        session
            .write()
            .await
            .begin_stream("MZ9".to_string(), None);

        server_tx.send(ServerEvent::SpeechStarted).await.unwrap();
        drop(server_tx);

        let cancel = CancellationToken::new();
        run_outbound(
            &mut server_rx,
            &transport,
            &model,
            &dispatcher,
            &session,
            &cancel,
        )
        .await;

        assert_eq!(clear_rx.recv().await.unwrap(), TransportCommand::clear("MZ9"));
    }

    #[tokio::test]
    async fn test_outbound_drops_audio_before_stream_identity() {
        let (server_tx, mut server_rx, transport, mut media_rx, _clear_rx, model, dispatcher, session) =
            outbound_fixture();

        server_tx
            .send(ServerEvent::AudioDelta {
                delta: "early".to_string(),
            })
            .await
            .unwrap();
        drop(server_tx);

        let cancel = CancellationToken::new();
        run_outbound(
            &mut server_rx,
            &transport,
            &model,
            &dispatcher,
            &session,
            &cancel,
        )
        .await;

        assert!(media_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_outbound_ends_on_model_error() {
        let (server_tx, mut server_rx, transport, _media_rx, _clear_rx, model, dispatcher, session) =
            outbound_fixture();

        server_tx
            .send(ServerEvent::Error {
                error: crate::model::messages::ErrorDetail {
                    kind: "server_error".to_string(),
                    code: None,
                    message: "internal".to_string(),
                },
            })
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let reason = run_outbound(
            &mut server_rx,
            &transport,
            &model,
            &dispatcher,
            &session,
            &cancel,
        )
        .await;
        assert_eq!(reason, CloseReason::ModelError("internal".to_string()));
    }
}
