//! RESP Protocol Codec
//!
//! Client-side implementation of the Redis Serialization Protocol (RESP2),
//! used by the Redis-backed paste store.
//!
//! - `types`: the `RespValue` enum, command building and serialization
//! - `parser`: incremental parser for server replies
//!
//! ## Example
//!
//! ```
//! use flashpaste::protocol::{parse_message, RespValue};
//!
//! let wire = RespValue::command(["INCR", "paste:abc:views"]).serialize();
//! assert!(wire.starts_with(b"*2\r\n"));
//!
//! let (reply, _) = parse_message(b":3\r\n").unwrap().unwrap();
//! assert_eq!(reply.as_integer(), Some(3));
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
