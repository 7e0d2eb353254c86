//! YAML configuration file loading.
//!
//! Every field is optional; a present field overrides the value assembled
//! from environment variables and defaults.

use std::path::Path;

use serde::Deserialize;

use super::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};

/// Optional overrides loaded from a YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub openai_api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub realtime_model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub transcription_model: Option<String>,
    pub vad_threshold: Option<f32>,
    pub vad_prefix_padding_ms: Option<u32>,
    pub vad_silence_duration_ms: Option<u32>,
    pub handshake_timeout_secs: Option<u64>,
    pub waitlist_webhook_url: Option<String>,
}

impl YamlConfig {
    /// Parse a YAML configuration file.
    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| BridgeError::Config(format!("invalid YAML in {}: {e}", path.display())))
    }

    /// Apply the present fields on top of an existing configuration.
    pub fn apply(self, config: &mut BridgeConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(public_host) = self.public_host {
            config.public_host = Some(public_host);
        }
        if let Some(key) = self.openai_api_key {
            config.openai_api_key = Some(key);
        }
        if let Some(url) = self.realtime_url {
            config.realtime_url = url;
        }
        if let Some(model) = self.realtime_model {
            config.realtime_model = model;
        }
        if let Some(voice) = self.voice {
            config.voice = voice;
        }
        if let Some(instructions) = self.instructions {
            config.instructions = instructions;
        }
        if let Some(model) = self.transcription_model {
            config.transcription_model = model;
        }
        if let Some(threshold) = self.vad_threshold {
            config.vad_threshold = threshold;
        }
        if let Some(ms) = self.vad_prefix_padding_ms {
            config.vad_prefix_padding_ms = ms;
        }
        if let Some(ms) = self.vad_silence_duration_ms {
            config.vad_silence_duration_ms = ms;
        }
        if let Some(secs) = self.handshake_timeout_secs {
            config.handshake_timeout_secs = secs;
        }
        if let Some(url) = self.waitlist_webhook_url {
            config.waitlist_webhook_url = Some(url);
        }
    }
}
