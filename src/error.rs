//! Engine Errors
//!
//! Every failure the keyspace can report is a [`KvError`]. The `Display`
//! text of each variant is exactly what the command layer sends back to the
//! client as the payload of a RESP error reply, so the messages are part of
//! the wire contract and must not change casually.

/// Errors returned by keyspace operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KvError {
    // ========================================================================
    // Missing keys / wrong shapes
    // ========================================================================
    #[error("ERR string does not exist")]
    StringNotFound,

    #[error("ERR hash does not exist")]
    HashNotFound,

    #[error("ERR list does not exist")]
    ListNotFound,

    #[error("ERR set does not exist")]
    SetNotFound,

    #[error("ERR key does not exist")]
    KeyNotFound,

    #[error("ERR source key not found, or expired")]
    SourceKeyNotFound,

    // ========================================================================
    // Expiry and patterns
    // ========================================================================
    #[error("ERR expiry flag does not match the actual expiry type")]
    ExpiryType,

    #[error("ERR regex provided is not valid")]
    InvalidRegex,

    #[error("ERR provided time is not valid seconds")]
    InvalidTimeSeconds,

    #[error("ERR invalid expire time")]
    InvalidExpireTime,

    // ========================================================================
    // Numeric arguments and stored numbers
    // ========================================================================
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a float or out of range")]
    NotAFloat,

    #[error("ERR invalid increment value")]
    InvalidIncrement,

    #[error("ERR invalid decrement value")]
    InvalidDecrement,

    #[error("ERR offset is not an integer or out of range")]
    InvalidOffset,

    #[error("ERR invalid count")]
    InvalidCount,

    #[error("ERR invalid start index")]
    InvalidStartIndex,

    #[error("ERR invalid end index")]
    InvalidEndIndex,

    #[error("ERR start index greater than end index")]
    StartAfterEnd,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    // ========================================================================
    // Ranges
    // ========================================================================
    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR value is out of range")]
    OutOfRange,

    // ========================================================================
    // Command layer
    // ========================================================================
    #[error("ERR wrong number of arguments")]
    WrongArgumentCount,

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR unknown subcommand '{0}'")]
    UnknownSubcommand(String),

    #[error("ERR unknown configuration parameter '{0}'")]
    UnknownConfigParameter(String),

    #[error("ERR configuration parameter '{0}' can't be changed at runtime")]
    ImmutableConfigParameter(String),
}

/// Result alias used throughout the keyspace.
pub type KvResult<T> = Result<T, KvError>;
