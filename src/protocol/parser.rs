//! Incremental RESP2 request parser.
//!
//! The parser is handed whatever bytes have arrived on a connection and
//! reports one of three outcomes:
//!
//! - `Ok(Some((value, consumed)))`: a complete frame; drop `consumed` bytes
//! - `Ok(None)`: the frame is not complete yet, read more and retry
//! - `Err(ParseError)`: the bytes can never form a valid frame
//!
//! Lines not starting with a RESP type marker are treated as inline
//! commands (`SET k v\r\n`), split on whitespace into an array of bulk
//! strings, so plain `telnet`/`nc` sessions work.

use crate::protocol::types::{marker, RespValue, CRLF};
use bytes::Bytes;
use memchr::memchr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid {what} '{text}'")]
    InvalidNumber { what: &'static str, text: String },

    #[error("unexpected byte {0:#04x} where a type marker belongs")]
    UnknownMarker(u8),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid bulk length {0}")]
    InvalidBulkLength(i64),

    #[error("invalid multibulk length {0}")]
    InvalidArrayLength(i64),

    #[error("bulk string of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("expected CRLF after bulk data")]
    MissingCrlf,

    #[error("unbalanced quotes in inline command")]
    UnbalancedQuotes,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Largest accepted bulk string.
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Deepest accepted array nesting.
pub const MAX_DEPTH: usize = 32;

/// Longest inline command line accepted before the connection gives up.
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Stateless between calls; `depth` only tracks the frame being parsed.
#[derive(Debug, Default)]
pub struct RespParser {
    depth: usize,
}

type Parsed = ParseResult<Option<(RespValue, usize)>>;

impl RespParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one frame from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> Parsed {
        self.depth = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf[0] {
            marker::ARRAY | marker::BULK | marker::SIMPLE | marker::ERROR | marker::INTEGER => {
                self.value(buf)
            }
            _ => parse_inline(buf),
        }
    }

    fn value(&mut self, buf: &[u8]) -> Parsed {
        let Some((line, header_len)) = read_line(&buf[1..]) else {
            return Ok(None);
        };
        let header_len = header_len + 1;

        match buf[0] {
            marker::SIMPLE => {
                let text = utf8(line, "simple string")?;
                Ok(Some((RespValue::SimpleString(text), header_len)))
            }
            marker::ERROR => {
                let text = utf8(line, "error")?;
                Ok(Some((RespValue::Error(text), header_len)))
            }
            marker::INTEGER => {
                let n = number(line, "integer")?;
                Ok(Some((RespValue::Integer(n), header_len)))
            }
            marker::BULK => bulk(buf, number(line, "bulk length")?, header_len),
            marker::ARRAY => self.array(buf, number(line, "multibulk length")?, header_len),
            other => Err(ParseError::UnknownMarker(other)),
        }
    }

    fn array(&mut self, buf: &[u8], count: i64, header_len: usize) -> Parsed {
        if count == -1 {
            return Ok(Some((RespValue::Null, header_len)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }

        let count = count as usize;
        // Cap the preallocation; `count` comes straight off the wire.
        let mut items = Vec::with_capacity(count.min(1024));
        let mut offset = header_len;
        for _ in 0..count {
            if offset >= buf.len() {
                return Ok(None);
            }
            match self.value(&buf[offset..])? {
                Some((item, used)) => {
                    items.push(item);
                    offset += used;
                }
                None => return Ok(None),
            }
        }

        self.depth -= 1;
        Ok(Some((RespValue::Array(items), offset)))
    }
}

/// Parses a single frame with a throwaway parser.
pub fn parse_message(buf: &[u8]) -> Parsed {
    RespParser::new().parse(buf)
}

fn bulk(buf: &[u8], len: i64, header_len: usize) -> Parsed {
    if len == -1 {
        return Ok(Some((RespValue::Null, header_len)));
    }
    if len < 0 {
        return Err(ParseError::InvalidBulkLength(len));
    }
    let len = len as usize;
    if len > MAX_BULK_SIZE {
        return Err(ParseError::TooLarge {
            size: len,
            max: MAX_BULK_SIZE,
        });
    }

    let end = header_len + len;
    if buf.len() < end + CRLF.len() {
        return Ok(None);
    }
    if &buf[end..end + CRLF.len()] != CRLF {
        return Err(ParseError::MissingCrlf);
    }
    let data = Bytes::copy_from_slice(&buf[header_len..end]);
    Ok(Some((RespValue::BulkString(data), end + CRLF.len())))
}

fn parse_inline(buf: &[u8]) -> Parsed {
    let Some((line, used)) = read_line(buf) else {
        if buf.len() > MAX_INLINE_SIZE {
            return Err(ParseError::TooLarge {
                size: buf.len(),
                max: MAX_INLINE_SIZE,
            });
        }
        return Ok(None);
    };

    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8("inline command"))?;
    let words = split_inline(line)?;
    let items = words
        .into_iter()
        .map(|word| RespValue::BulkString(Bytes::from(word)))
        .collect();
    Ok(Some((RespValue::Array(items), used)))
}

/// Splits an inline command on whitespace, honouring double and single
/// quotes so values with spaces can be sent by hand.
fn split_inline(line: &str) -> ParseResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnbalancedQuotes);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Finds the first line in `buf`, returning it without the terminator
/// and the number of bytes including the terminator. A bare `\n` also
/// ends a line, which inline clients sometimes send.
fn read_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let nl = memchr(b'\n', buf)?;
    let line = match nl.checked_sub(1) {
        Some(cr) if buf[cr] == b'\r' => &buf[..cr],
        _ => &buf[..nl],
    };
    Some((line, nl + 1))
}

fn utf8(bytes: &[u8], what: &'static str) -> ParseResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ParseError::InvalidUtf8(what))
}

fn number(bytes: &[u8], what: &'static str) -> ParseResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::InvalidNumber {
            what,
            text: String::from_utf8_lossy(bytes).into_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk_of(s: &str) -> RespValue {
        RespValue::bulk_string(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn test_parse_command_array() {
        let input = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nhello\r\n";
        let (value, used) = parse_message(input).unwrap().unwrap();
        assert_eq!(used, input.len());
        assert_eq!(
            value,
            RespValue::array(vec![bulk_of("SET"), bulk_of("k"), bulk_of("hello")])
        );
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(
            parse_message(b"+OK\r\n").unwrap(),
            Some((RespValue::simple_string("OK"), 5))
        );
        assert_eq!(
            parse_message(b"-ERR bad\r\n").unwrap(),
            Some((RespValue::error("ERR bad"), 10))
        );
        assert_eq!(
            parse_message(b":-12\r\n").unwrap(),
            Some((RespValue::integer(-12), 6))
        );
        assert_eq!(parse_message(b"$-1\r\n").unwrap(), Some((RespValue::Null, 5)));
        assert_eq!(parse_message(b"*-1\r\n").unwrap(), Some((RespValue::Null, 5)));
    }

    #[test]
    fn test_bulk_string_with_crlf_inside() {
        let (value, _) = parse_message(b"$4\r\na\r\nb\r\n").unwrap().unwrap();
        assert_eq!(value, bulk_of("a\r\nb"));
    }

    #[test]
    fn test_incomplete_frames() {
        assert_eq!(parse_message(b"").unwrap(), None);
        assert_eq!(parse_message(b"*2\r\n$3\r\nGET\r\n").unwrap(), None);
        assert_eq!(parse_message(b"$5\r\nhel").unwrap(), None);
        assert_eq!(parse_message(b"*1\r\n$3\r\nGET").unwrap(), None);
        assert_eq!(parse_message(b"PING").unwrap(), None);
    }

    #[test]
    fn test_pipelined_frames() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, first) = parse_message(input).unwrap().unwrap();
        let (value, second) = parse_message(&input[first..]).unwrap().unwrap();
        assert_eq!(first + second, input.len());
        assert_eq!(value, RespValue::array(vec![bulk_of("PING")]));
    }

    #[test]
    fn test_invalid_frames() {
        assert!(matches!(
            parse_message(b"$abc\r\n"),
            Err(ParseError::InvalidNumber { .. })
        ));
        assert_eq!(
            parse_message(b"$-5\r\n"),
            Err(ParseError::InvalidBulkLength(-5))
        );
        assert_eq!(
            parse_message(b"*-3\r\n"),
            Err(ParseError::InvalidArrayLength(-3))
        );
        assert_eq!(parse_message(b"$3\r\nabcXY"), Err(ParseError::MissingCrlf));
        assert_eq!(
            parse_message(b"*1\r\nPING\r\n"),
            Err(ParseError::UnknownMarker(b'P'))
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = Vec::new();
        for _ in 0..=MAX_DEPTH {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");
        assert_eq!(parse_message(&input), Err(ParseError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_inline_command() {
        let (value, used) = parse_message(b"SET key  value\r\n").unwrap().unwrap();
        assert_eq!(used, 16);
        assert_eq!(
            value,
            RespValue::array(vec![bulk_of("SET"), bulk_of("key"), bulk_of("value")])
        );
    }

    #[test]
    fn test_inline_quotes_and_bare_newline() {
        let (value, _) = parse_message(b"SET k \"two words\"\n").unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::array(vec![bulk_of("SET"), bulk_of("k"), bulk_of("two words")])
        );
        assert_eq!(
            parse_message(b"SET k \"oops\r\n"),
            Err(ParseError::UnbalancedQuotes)
        );
    }

    #[test]
    fn test_blank_inline_line_is_empty_array() {
        let (value, used) = parse_message(b"\r\n").unwrap().unwrap();
        assert_eq!(used, 2);
        assert_eq!(value, RespValue::array(vec![]));
    }
}
