//! Per-call lifecycle controller.
//!
//! Owns a call from accept to teardown: runs the configuration handshake,
//! requests the opening greeting, drives both relay loops, and closes both
//! legs exactly once when either side ends. Teardown is idempotent; whatever
//! order the legs fail in, the call converges on the `Closed` phase.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::CloseReason;
use super::dispatch::FunctionDispatcher;
use super::relay;
use crate::config::BridgeConfig;
use crate::errors::BridgeError;
use crate::model::messages::{ClientEvent, ServerEvent};
use crate::model::{ModelHandle, build_session_config, configure};
use crate::session::{CallPhase, SharedSession};
use crate::transport::{TransportEvent, TransportSender};
use crate::waitlist::WaitlistSink;

/// The two channel pairs a bridged call runs over.
///
/// The controller never touches sockets; the transport adapter and model
/// session hand it channels, which is also how the tests drive it.
pub struct BridgeIo {
    pub transport_events: mpsc::Receiver<TransportEvent>,
    pub transport: TransportSender,
    pub model_events: mpsc::Receiver<ServerEvent>,
    pub model: ModelHandle,
}

/// Run one call to completion.
///
/// Returns the close reason for the normal paths; a pre-audio failure
/// (handshake rejection or timeout) comes back as `Err` after both legs are
/// torn down.
pub async fn run_call(
    io: BridgeIo,
    session: SharedSession,
    config: Arc<BridgeConfig>,
    sink: Arc<dyn WaitlistSink>,
    cancel: CancellationToken,
) -> Result<CloseReason, BridgeError> {
    let BridgeIo {
        mut transport_events,
        transport,
        mut model_events,
        model,
    } = io;

    let call_id = session.read().await.call_id.clone();

    // Configure the model before any audio moves
    session.write().await.advance(CallPhase::Configuring);
    let session_config = build_session_config(&config);
    if let Err(e) = configure(
        &model,
        &mut model_events,
        session_config,
        config.handshake_timeout(),
    )
    .await
    {
        warn!(call_id = %call_id, error = %e, "handshake failed, tearing down");
        teardown(&session, &transport, &model).await;
        return Err(e);
    }

    session.write().await.advance(CallPhase::Active);

    // The model speaks first
    if let Err(e) = model.send(ClientEvent::ResponseCreate).await {
        warn!(call_id = %call_id, error = %e, "greeting request failed, tearing down");
        teardown(&session, &transport, &model).await;
        return Err(e);
    }

    let dispatcher = FunctionDispatcher::new(sink);

    // First relay to finish decides the close reason
    let reason = tokio::select! {
        reason = relay::run_inbound(&mut transport_events, &model, &session, &cancel) => reason,
        reason = relay::run_outbound(
            &mut model_events,
            &transport,
            &model,
            &dispatcher,
            &session,
            &cancel,
        ) => reason,
    };

    info!(call_id = %call_id, reason = %reason, "call ended");
    teardown(&session, &transport, &model).await;
    Ok(reason)
}

/// Close both legs and finish the lifecycle. Safe to run more than once.
async fn teardown(session: &SharedSession, transport: &TransportSender, model: &ModelHandle) {
    {
        let mut guard = session.write().await;
        guard.advance(CallPhase::Closing);
    }
    transport.close();
    model.close();
    session.write().await.advance(CallPhase::Closed);
}
