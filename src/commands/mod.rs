//! Command layer.
//!
//! ```text
//! parsed RespValue ──> CommandHandler::execute ──> Keyspace ──> RespValue reply
//! ```
//!
//! [`handler::COMMANDS`] is the single table of names and arities; the
//! `COMMAND` and `HELP` commands report from it. `CONFIG GET/SET` reads and
//! writes [`settings::ServerSettings`].

pub mod handler;
pub mod settings;

pub use handler::{is_quit, lookup, CommandHandler, CommandDef, COMMANDS};
pub use settings::ServerSettings;
