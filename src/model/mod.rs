//! Realtime model session.
//!
//! Maintains the duplex WebSocket to the OpenAI Realtime API: connection
//! with authentication headers, session configuration handshake, and typed
//! events in both directions. Audio crosses this seam as opaque base64
//! G.711 u-law, matching the telephony leg so no transcoding happens.

pub mod messages;
pub mod session;

pub use messages::{ClientEvent, ConversationItem, ServerEvent, SessionConfig};
pub use session::{ModelHandle, build_session_config, configure, connect};
