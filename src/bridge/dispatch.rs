//! Function call dispatch.
//!
//! Executes tool invocations raised by the model and reports exactly one
//! result per `call_id`. Every failure mode still produces a result item, so
//! the conversation can continue; the model relays the message to the caller
//! instead of going silent.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::BridgeResult;
use crate::model::messages::{ClientEvent, ConversationItem};
use crate::model::ModelHandle;
use crate::waitlist::{SUBMIT_WAITLIST, WaitlistSink, WaitlistSubmission};

/// Result payload inserted back into the conversation.
#[derive(Debug, Serialize)]
pub struct FunctionOutput {
    pub success: bool,
    pub message: String,
}

impl FunctionOutput {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// Executes tool calls against the waitlist sink.
pub struct FunctionDispatcher {
    sink: Arc<dyn WaitlistSink>,
}

impl FunctionDispatcher {
    pub fn new(sink: Arc<dyn WaitlistSink>) -> Self {
        Self { sink }
    }

    /// Handle one completed function call.
    ///
    /// Exactly one `function_call_output` goes back per `call_id`, followed
    /// by a `response.create` so the model speaks the outcome. Unknown
    /// function names and malformed arguments produce failure results, not
    /// errors; only a dead model connection propagates as `Err`.
    pub async fn dispatch(
        &self,
        handle: &ModelHandle,
        call_id: String,
        name: &str,
        arguments: &str,
        caller_phone: Option<&str>,
    ) -> BridgeResult<()> {
        let output = self.execute(name, arguments, caller_phone).await;

        let payload = serde_json::to_string(&output).unwrap_or_else(|_| {
            r#"{"success":false,"message":"Something went wrong on our side."}"#.to_string()
        });

        handle
            .send(ClientEvent::ConversationItemCreate {
                item: ConversationItem::FunctionCallOutput {
                    call_id,
                    output: payload,
                },
            })
            .await?;
        handle.send(ClientEvent::ResponseCreate).await?;
        Ok(())
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &str,
        caller_phone: Option<&str>,
    ) -> FunctionOutput {
        if name != SUBMIT_WAITLIST {
            warn!(function = name, "unknown function call");
            return FunctionOutput::failed("That action is not available.");
        }

        let submission: WaitlistSubmission = match serde_json::from_str(arguments) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(error = %e, "invalid waitlist arguments");
                return FunctionOutput::failed(
                    "Invalid data format. Please confirm the details and try again.",
                );
            }
        };

        match self.sink.submit(&submission, caller_phone).await {
            Ok(()) => {
                info!(email = %submission.email, "waitlist submission accepted");
                FunctionOutput::ok(
                    "You're on the waitlist. We'll reach out at your preferred time.",
                )
            }
            Err(e) => {
                warn!(error = %e, "waitlist submission failed");
                FunctionOutput::failed(
                    "We couldn't record that right now. Please try again in a moment.",
                )
            }
        }
    }
}
