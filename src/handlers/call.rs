//! Call entry points.
//!
//! Twilio hits `/incoming-call` when a call arrives; the TwiML response tells
//! it to open a media stream WebSocket back at `/media-stream`, carrying the
//! caller's number as a stream parameter. The WebSocket handler then runs the
//! whole bridged call.

use axum::Json;
use axum::extract::ws::WebSocket;
use axum::extract::{Form, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::bridge::{BridgeIo, run_call};
use crate::model;
use crate::session::CallSession;
use crate::state::AppState;
use crate::transport;

/// Liveness probe.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fields of the Twilio voice webhook the bridge uses.
#[derive(Debug, Default, Deserialize)]
pub struct IncomingCallForm {
    /// Calling party number
    #[serde(rename = "From")]
    pub from: Option<String>,
}

/// Answer an incoming call with TwiML that opens the media stream.
pub async fn incoming_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<IncomingCallForm>,
) -> Response {
    let caller = form.from.unwrap_or_else(|| "unknown".to_string());

    let host = state
        .config
        .public_host
        .clone()
        .or_else(|| {
            headers
                .get("host")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .unwrap_or_else(|| state.config.address());

    info!(caller = %caller, "incoming call, directing to media stream");

    let twiml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Connect>
        <Stream url="wss://{host}/media-stream">
            <Parameter name="callerPhone" value="{caller}" />
        </Stream>
    </Connect>
</Response>"#
    );

    ([("content-type", "text/xml")], twiml).into_response()
}

/// Accept the media stream WebSocket and bridge the call.
pub async fn media_stream_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_media_stream(socket, state))
}

async fn handle_media_stream(socket: WebSocket, state: AppState) {
    let session = CallSession::shared();
    let call_id = session.read().await.call_id.clone();
    info!(call_id = %call_id, "media stream accepted");

    let (transport, transport_events) = transport::split(socket);

    let (model_handle, model_events) = match model::connect(&state.config).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(call_id = %call_id, error = %e, "model connection failed, dropping call");
            transport.close();
            return;
        }
    };

    let io = BridgeIo {
        transport_events,
        transport,
        model_events,
        model: model_handle,
    };

    match run_call(
        io,
        session,
        state.config.clone(),
        state.waitlist.clone(),
        state.shutdown.clone(),
    )
    .await
    {
        Ok(reason) => info!(call_id = %call_id, reason = %reason, "call closed"),
        Err(e) => error!(call_id = %call_id, error = %e, "call failed before audio"),
    }
}
