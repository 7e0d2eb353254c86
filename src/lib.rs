pub mod bridge;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod model;
pub mod routes;
pub mod session;
pub mod state;
pub mod transport;
pub mod waitlist;

// Re-export commonly used items for convenience
pub use config::BridgeConfig;
pub use errors::{BridgeError, BridgeResult};
pub use session::{CallPhase, CallSession, SharedSession};
pub use state::AppState;
