//! RESP Client Connection
//!
//! A single TCP connection to a Redis-compatible server. Commands are written
//! in one flush (so `MULTI ... EXEC` goes out as a pipeline) and replies are
//! read back in order.
//!
//! ## Buffer Management
//!
//! Replies accumulate in a `BytesMut`. TCP is a stream protocol, so one read
//! may carry a partial reply or several pipelined ones; the parser consumes
//! complete values from the front and leaves the rest.

use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, trace};

/// Maximum size for the read buffer
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024 + 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Upper bound on establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on a full request/reply exchange.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// One open connection to the backing server.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    parser: RespParser,
}

impl ConnectionHandler {
    /// Connects to `addr`, failing fast after [`CONNECT_TIMEOUT`].
    pub async fn connect(addr: &str) -> Result<Self, ConnectionError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::Timeout)??;
        stream.set_nodelay(true)?;
        let addr = stream.peer_addr()?;
        debug!(server = %addr, "Connected to store server");

        Ok(Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RespParser::new(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends one command and waits for its reply.
    pub async fn request(&mut self, command: RespValue) -> Result<RespValue, ConnectionError> {
        let mut replies = self.pipeline(vec![command]).await?;
        replies.pop().ok_or(ConnectionError::UnexpectedEof)
    }

    /// Sends all commands in a single write and returns one reply per command.
    pub async fn pipeline(
        &mut self,
        commands: Vec<RespValue>,
    ) -> Result<Vec<RespValue>, ConnectionError> {
        tokio::time::timeout(IO_TIMEOUT, self.exchange(commands))
            .await
            .map_err(|_| ConnectionError::Timeout)?
    }

    async fn exchange(
        &mut self,
        commands: Vec<RespValue>,
    ) -> Result<Vec<RespValue>, ConnectionError> {
        let mut out = Vec::new();
        for command in &commands {
            command.serialize_into(&mut out);
        }
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        trace!(server = %self.addr, bytes = out.len(), commands = commands.len(), "Sent commands");

        let mut replies = Vec::with_capacity(commands.len());
        while replies.len() < commands.len() {
            match self.try_parse_reply()? {
                Some(reply) => replies.push(reply),
                None => self.read_more_data().await?,
            }
        }
        Ok(replies)
    }

    /// Attempts to parse a reply from the buffer.
    fn try_parse_reply(&mut self) -> Result<Option<RespValue>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((value, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    server = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed reply"
                );
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                error!(server = %self.addr, error = %e, "Unparseable reply from store server");
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Err(ConnectionError::UnexpectedEof);
        }

        trace!(server = %self.addr, bytes = n, "Read data");
        Ok(())
    }
}

/// Errors that can occur while talking to the store server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Server closed the connection before a full reply arrived
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,

    #[error("Timed out waiting for store server")]
    Timeout,
}
