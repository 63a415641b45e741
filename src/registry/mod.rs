//! Session registry
//!
//! Process-wide map from session ID to [`StreamingSession`](crate::session::StreamingSession).
//! It is passed explicitly to whatever accepts client connections.
//!
//! ```text
//!                       Arc<SessionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ sessions: DashMap<u64,       │
//!                 │   Arc<StreamingSession>>     │
//!                 │ provider, connector, config  │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//!  [ClientConnection]     [ClientConnection]      shutdown()
//!   open / connect /       open / connect /       disconnects all
//!   disconnect             disconnect
//! ```

pub mod store;

pub use store::SessionRegistry;
