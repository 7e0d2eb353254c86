//! Telephony transport adapter for Twilio Media Streams.
//!
//! Owns the inbound call's duplex audio WebSocket. Inbound frames are parsed
//! into [`messages::TransportEvent`] values and delivered over a channel;
//! outbound [`messages::TransportCommand`] values are serialized by a writer
//! task with a dedicated priority lane for barge-in `clear` messages.

pub mod adapter;
pub mod messages;

pub use adapter::{TransportSender, split};
pub use messages::{TransportCommand, TransportEvent};
