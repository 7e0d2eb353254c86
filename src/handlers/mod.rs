//! HTTP and WebSocket request handlers.

pub mod call;

pub use call::{health_check, incoming_call, media_stream_handler};
