//! WebSocket relay server

pub mod config;
pub mod connection;
pub mod listener;

pub use config::{ForwardMode, ServerConfig, SessionConfig};
pub use connection::ClientConnection;
pub use listener::RelayServer;
