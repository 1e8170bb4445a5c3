//! RESP2 reply and request values.
//!
//! Every frame starts with a one-byte type marker and ends with CRLF:
//!
//! ```text
//!   +OK\r\n                      simple string
//!   -ERR no such key\r\n         error
//!   :42\r\n                      integer
//!   $5\r\nhello\r\n              bulk string
//!   $-1\r\n                      null
//!   *2\r\n$3\r\nGET\r\n$1\r\nk\r\n  array
//! ```

use crate::error::KvError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

pub const CRLF: &[u8] = b"\r\n";

/// Type markers for each RESP2 frame kind.
pub mod marker {
    pub const SIMPLE: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+<text>\r\n`, must not contain CR or LF.
    SimpleString(String),
    /// `-<message>\r\n`
    Error(String),
    /// `:<n>\r\n`
    Integer(i64),
    /// `$<len>\r\n<bytes>\r\n`, binary safe.
    BulkString(Bytes),
    /// The null bulk string `$-1\r\n`. A null array parses to this too.
    Null,
    /// `*<count>\r\n` followed by `count` nested values.
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        RespValue::Error(message.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Builds a bulk string from anything convertible into [`Bytes`].
    ///
    /// # Example
    /// ```
    /// use tidekv::protocol::RespValue;
    /// let reply = RespValue::bulk_string("hello");
    /// assert_eq!(reply.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// Bulk string taking ownership of `s` without copying.
    pub fn from_string(s: String) -> Self {
        RespValue::BulkString(Bytes::from(s))
    }

    /// An array of bulk strings, the usual shape of a multi-value reply.
    pub fn from_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            items
                .into_iter()
                .map(|item| RespValue::BulkString(Bytes::from(item.into())))
                .collect(),
        )
    }

    /// Bulk string for `Some`, null for `None`.
    pub fn optional(value: Option<String>) -> Self {
        value.map_or(RespValue::Null, RespValue::from_string)
    }

    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Encodes the value into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len_hint());
        self.write_to(&mut buf);
        buf.to_vec()
    }

    /// Appends the wire form of the value to `buf`.
    ///
    /// The connection layer batches pipelined replies into one buffer
    /// through this method before a single write.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => write_line(buf, marker::SIMPLE, s.as_bytes()),
            RespValue::Error(s) => write_line(buf, marker::ERROR, s.as_bytes()),
            RespValue::Integer(n) => write_line(buf, marker::INTEGER, n.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                write_line(buf, marker::BULK, data.len().to_string().as_bytes());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            RespValue::Null => write_line(buf, marker::BULK, b"-1"),
            RespValue::Array(values) => {
                write_line(buf, marker::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.write_to(buf);
                }
            }
        }
    }

    fn encoded_len_hint(&self) -> usize {
        match self {
            RespValue::BulkString(data) => data.len() + 16,
            RespValue::Array(values) => values.len() * 16 + 16,
            _ => 32,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Text content of a simple or bulk string. Bulk strings that are not
    /// valid UTF-8 yield `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

fn write_line(buf: &mut BytesMut, marker: u8, body: &[u8]) {
    buf.reserve(body.len() + 3);
    buf.put_u8(marker);
    buf.put_slice(body);
    buf.put_slice(CRLF);
}

impl From<KvError> for RespValue {
    fn from(err: KvError) -> Self {
        RespValue::Error(err.to_string())
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "({} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            RespValue::Array(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
        assert_eq!(RespValue::pong().serialize(), b"+PONG\r\n");
        assert_eq!(RespValue::integer(-7).serialize(), b":-7\r\n");
        assert_eq!(RespValue::null().serialize(), b"$-1\r\n");
        assert_eq!(
            RespValue::error("ERR syntax error").serialize(),
            b"-ERR syntax error\r\n"
        );
    }

    #[test]
    fn test_bulk_string_is_binary_safe() {
        let value = RespValue::bulk_string(Bytes::from_static(b"a\r\nb"));
        assert_eq!(value.serialize(), b"$4\r\na\r\nb\r\n");
        assert_eq!(RespValue::bulk_string("").serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn test_from_strings() {
        let value = RespValue::from_strings(["GET", "k"]);
        assert_eq!(value.serialize(), b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
        assert_eq!(
            RespValue::from_strings(Vec::<String>::new()).serialize(),
            b"*0\r\n"
        );
    }

    #[test]
    fn test_nested_array() {
        let value = RespValue::array(vec![
            RespValue::optional(None),
            RespValue::array(vec![RespValue::integer(1)]),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n$-1\r\n*1\r\n:1\r\n");
    }

    #[test]
    fn test_write_to_appends() {
        let mut buf = BytesMut::new();
        RespValue::integer(1).write_to(&mut buf);
        RespValue::ok().write_to(&mut buf);
        assert_eq!(&buf[..], b":1\r\n+OK\r\n");
    }

    #[test]
    fn test_from_kv_error() {
        let reply: RespValue = KvError::StringNotFound.into();
        assert!(reply.is_error());
        assert_eq!(reply, RespValue::error(KvError::StringNotFound.to_string()));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(RespValue::bulk_string("x").as_str(), Some("x"));
        assert_eq!(RespValue::integer(3).as_integer(), Some(3));
        assert!(RespValue::null().is_null());
        assert_eq!(RespValue::integer(3).into_array(), None);
    }
}
