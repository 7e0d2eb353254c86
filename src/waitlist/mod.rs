//! Waitlist submission action.
//!
//! The single tool exposed to the model. A validated submission is forwarded
//! to a configured webhook; without one, submissions are logged and
//! acknowledged locally so the conversation still completes in development.
//!
//! Delivery is at-least-once. The receiving service dedupes on its side, so
//! a retried call after a dropped acknowledgment is harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};

/// Name the model uses to invoke the action.
pub const SUBMIT_WAITLIST: &str = "submit_waitlist";

/// Tool definition advertised in the session configuration.
pub fn tool_schema() -> Value {
    json!({
        "type": "function",
        "name": SUBMIT_WAITLIST,
        "description": "Submit a caller's waitlist request once every required field has been collected.",
        "parameters": {
            "type": "object",
            "properties": {
                "fullName": {"type": "string", "description": "Caller's full name"},
                "email": {"type": "string", "description": "Caller's email address"},
                "role": {"type": "string", "description": "Caller's role, e.g. veterinarian or practice manager"},
                "clinicName": {"type": "string", "description": "Name of the caller's clinic"},
                "preferredTime": {"type": "string", "description": "Preferred callback time"},
                "bestPhone": {"type": "string", "description": "Best phone number to reach the caller, if different from the calling number"}
            },
            "required": ["fullName", "email", "role", "clinicName", "preferredTime"]
        }
    })
}

/// A validated waitlist request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistSubmission {
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub clinic_name: String,
    pub preferred_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_phone: Option<String>,
}

// =============================================================================
// Sinks
// =============================================================================

/// Destination for validated submissions.
#[async_trait]
pub trait WaitlistSink: Send + Sync {
    /// Deliver one submission. `caller_phone` is the number the call came
    /// from, when the telephony leg provided it.
    async fn submit(
        &self,
        submission: &WaitlistSubmission,
        caller_phone: Option<&str>,
    ) -> BridgeResult<()>;
}

/// Forwards submissions to a webhook as JSON.
pub struct HttpWaitlistSink {
    client: reqwest::Client,
    url: String,
}

impl HttpWaitlistSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl WaitlistSink for HttpWaitlistSink {
    async fn submit(
        &self,
        submission: &WaitlistSubmission,
        caller_phone: Option<&str>,
    ) -> BridgeResult<()> {
        let mut body = serde_json::to_value(submission)
            .map_err(|e| BridgeError::Config(format!("unserializable submission: {e}")))?;
        if let Some(phone) = caller_phone {
            body["callerPhone"] = json!(phone);
        }

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("waitlist webhook unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "waitlist webhook returned {}",
                response.status()
            )));
        }

        info!(email = %submission.email, "waitlist submission delivered");
        Ok(())
    }
}

/// Logs submissions without delivering them anywhere.
pub struct NullWaitlistSink;

#[async_trait]
impl WaitlistSink for NullWaitlistSink {
    async fn submit(
        &self,
        submission: &WaitlistSubmission,
        caller_phone: Option<&str>,
    ) -> BridgeResult<()> {
        warn!(
            name = %submission.full_name,
            email = %submission.email,
            caller = caller_phone.unwrap_or("unknown"),
            "no waitlist webhook configured, submission logged only"
        );
        Ok(())
    }
}

/// Pick a sink based on whether a webhook is configured.
pub fn sink_from_config(config: &BridgeConfig) -> std::sync::Arc<dyn WaitlistSink> {
    match &config.waitlist_webhook_url {
        Some(url) => std::sync::Arc::new(HttpWaitlistSink::new(url.clone())),
        None => std::sync::Arc::new(NullWaitlistSink),
    }
}
