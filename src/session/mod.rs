//! The session actor: a persistent IMAP connection driven by a single
//! background task, plus the state, wire transport, command
//! dispatcher, and fetch pipeline it is built from.

pub mod dispatcher;
pub mod fetch;
pub mod machine;
pub mod state;
pub mod subscriber;
pub mod transport;

pub use machine::{run, ControlMsg};
pub use state::Session;
pub use subscriber::SubscriberId;
