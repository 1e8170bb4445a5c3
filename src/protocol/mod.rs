//! RESP2 wire protocol.
//!
//! - `types`: [`RespValue`] and its encoder
//! - `parser`: incremental decoder for requests, including inline commands
//!
//! ```
//! use tidekv::protocol::{parse_message, RespValue};
//!
//! let (request, used) = parse_message(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(used, 20);
//! assert_eq!(request, RespValue::from_strings(["GET", "k"]));
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
