//! Transport abstraction for the writer loop.
//!
//! The channel core only needs two things from a transport: a fast
//! connectivity check at the top of each loop iteration, and a flush that
//! moves the drained buffer's bytes out. Reconnection is not a transport
//! concern here - a lost connection terminates the writer loop and the
//! caller builds a new channel.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::debug;

use codec::WireBuffer;

use crate::error::{ChannelError, ChannelResult};

pub trait ChannelTransport: Send + 'static {
    /// Fails fast when the connection is no longer healthy.
    fn ensure_connected(&mut self) -> ChannelResult<()>;

    /// Writes all readable bytes of `buffer` to the transport.
    fn flush_out(&mut self, buffer: &mut WireBuffer) -> ChannelResult<()>;
}

/// TCP transport with Nagle disabled - the linger window already does the
/// coalescing, so the stack must not add its own.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> ChannelResult<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> ChannelResult<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!(%peer, "channel transport connected");
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl ChannelTransport for TcpTransport {
    fn ensure_connected(&mut self) -> ChannelResult<()> {
        match self.stream.take_error() {
            Ok(None) => Ok(()),
            Ok(Some(err)) => Err(ChannelError::connection_lost(format!(
                "{}: {err}",
                self.peer
            ))),
            Err(err) => Err(ChannelError::connection_lost(format!(
                "{}: {err}",
                self.peer
            ))),
        }
    }

    fn flush_out(&mut self, buffer: &mut WireBuffer) -> ChannelResult<()> {
        let remaining = buffer.remaining();
        self.stream
            .write_all(buffer.as_read_slice())
            .map_err(|err| ChannelError::connection_lost(format!("{}: {err}", self.peer)))?;
        buffer.advance_read(remaining);
        Ok(())
    }
}
