//! Streaming sessions
//!
//! One [`StreamingSession`] per client connect request. It bridges a
//! camera's skeleton topic on the upstream broker to the client's
//! outbound queue and keeps the subscription authorized while active.

pub mod bridge;
pub mod channel;
pub mod context;
pub mod refresh;
pub mod state;

pub use bridge::{StreamingSession, BROKER_LOST};
pub use channel::ClientChannel;
pub use context::StreamContext;
pub use state::{SessionPhase, SessionState};
