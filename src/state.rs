//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::waitlist::{self, WaitlistSink};

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub waitlist: Arc<dyn WaitlistSink>,
    /// Cancelled on server shutdown; every in-flight call observes it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Self {
        let waitlist = waitlist::sink_from_config(&config);
        Self {
            config: Arc::new(config),
            waitlist,
            shutdown: CancellationToken::new(),
        }
    }
}
