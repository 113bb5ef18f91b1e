//! Store Server Connection
//!
//! TCP connection management for the Redis-backed paste store.
//!
//! ```text
//! ┌──────────────┐   commands (one flush)   ┌──────────────────┐
//! │ RedisStore   │ ───────────────────────> │ Redis-compatible │
//! │ (Mutex<Conn>)│ <─────────────────────── │ server           │
//! └──────────────┘   replies (in order)     └──────────────────┘
//! ```
//!
//! A connection is opened lazily on first use and dropped after any error,
//! so the next call reconnects. There is no retry loop.

pub mod handler;

pub use handler::{ConnectionError, ConnectionHandler};
