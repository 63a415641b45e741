//! Client envelopes and broker topics

pub mod envelope;
pub mod topics;

pub use envelope::{ClientRequest, ServerMessage};
pub use topics::StreamTopics;
