//! Configuration for the intake bridge.
//!
//! Configuration is assembled from three layers, lowest priority first:
//! built-in defaults, environment variables (with `.env` loaded at startup),
//! and an optional YAML file passed via `--config`. YAML overrides
//! environment, environment overrides defaults.

use std::path::Path;
use std::time::Duration;

use crate::errors::{BridgeError, BridgeResult};

mod yaml;

pub use yaml::YamlConfig;

/// Default system instructions for the intake assistant.
///
/// Supplied externally in production; this fallback keeps local development
/// working without a prompt file.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a friendly scheduling assistant for a veterinary \
clinic. Greet the caller, answer questions about the clinic's waitlist, and collect their full \
name, email, role, clinic name, and preferred callback time. When you have every field, submit \
the waitlist request with the submit_waitlist function and confirm the outcome to the caller. \
Keep answers short and conversational; this is a phone call.";

/// Server and upstream configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Public hostname Twilio should open the media stream against.
    /// Falls back to the request Host header when unset.
    pub public_host: Option<String>,

    // Realtime model settings
    pub openai_api_key: Option<String>,
    pub realtime_url: String,
    pub realtime_model: String,
    pub voice: String,
    pub instructions: String,
    pub transcription_model: String,

    // Turn detection sensitivity (server VAD)
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,

    /// Bound on the wait for the model's configuration acknowledgment.
    pub handshake_timeout_secs: u64,

    /// Webhook receiving waitlist submissions. When unset, submissions are
    /// logged and acknowledged locally.
    pub waitlist_webhook_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5050,
            public_host: None,
            openai_api_key: None,
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            voice: "alloy".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            transcription_model: "whisper-1".to_string(),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
            handshake_timeout_secs: 10,
            waitlist_webhook_url: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables on top of defaults.
    pub fn from_env() -> BridgeResult<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("BRIDGE_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("BRIDGE_PORT") {
            config.port = port
                .parse()
                .map_err(|_| BridgeError::Config(format!("invalid BRIDGE_PORT: {port}")))?;
        }
        if let Ok(host) = std::env::var("BRIDGE_PUBLIC_HOST") {
            config.public_host = Some(host);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.openai_api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_REALTIME_URL") {
            config.realtime_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_REALTIME_MODEL") {
            config.realtime_model = model;
        }
        if let Ok(voice) = std::env::var("BRIDGE_VOICE") {
            config.voice = voice;
        }
        if let Ok(instructions) = std::env::var("BRIDGE_INSTRUCTIONS") {
            config.instructions = instructions;
        }
        if let Ok(url) = std::env::var("WAITLIST_WEBHOOK_URL") {
            if !url.is_empty() {
                config.waitlist_webhook_url = Some(url);
            }
        }
        if let Ok(secs) = std::env::var("BRIDGE_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout_secs = secs.parse().map_err(|_| {
                BridgeError::Config(format!("invalid BRIDGE_HANDSHAKE_TIMEOUT_SECS: {secs}"))
            })?;
        }

        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as
    /// the base layer.
    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let mut config = Self::from_env()?;
        let overrides = YamlConfig::from_file(path)?;
        overrides.apply(&mut config);
        Ok(config)
    }

    /// Validate that the configuration can actually run a call.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.openai_api_key.as_deref().unwrap_or("").is_empty() {
            return Err(BridgeError::Config(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "handshake timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Server bind address as "host:port".
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bound on the configuration-acknowledgment wait.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
