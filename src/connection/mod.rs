//! Client connections.
//!
//! `main` accepts TCP connections and spawns one [`handle_connection`] task
//! per client. Each task owns its read buffer and parser and shares the
//! [`CommandHandler`](crate::commands::CommandHandler) and
//! [`ConnectionStats`] with every other connection.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
