// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket transport between the adapter (server) and the simulation (client).
//!
//! ```text
//! Unbound --bind--> Listening --accept--> Connected --close--> Closed
//! ```
//!
//! Exactly one peer is expected, so the listener uses a backlog of 1 and is
//! kept open only until the connection is torn down.
//!
//! # Framing
//!
//! Messages are newline terminated with an implicit length. The first read
//! peeks [`HEADER_LENGTH`] bytes to learn the number of doubles and caches the
//! resulting buffer size for the rest of the run. Reads then accumulate chunks
//! until a newline arrives.

pub mod discovery;
pub mod stream;

pub use discovery::{read_discovery_file, write_discovery_file, Endpoint};
pub use stream::ByteStream;

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener};
use std::path::Path;

use crate::codec::{decode, decode_header, encode, WireMessage};
use crate::config::{HEADER_LENGTH, LEGACY_PROTOCOL_VERSION, READ_CHUNK};
use crate::error::{Error, Result};

/// Lifecycle of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unbound,
    Listening,
    Connected,
    Closed,
}

/// Create the listening socket on every interface with an OS-assigned port.
fn create_tcp_listener() -> io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], 0));

    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.bind(&addr.into())?;
    socket.listen(1)?;

    Ok(socket.into())
}

// ============================================================================
// Channel: framing over a connected stream
// ============================================================================

/// Framed message channel over a connected [`ByteStream`].
pub struct Channel<S: ByteStream> {
    stream: S,
    /// Buffer size learned from the first header peek.
    required_len: Option<usize>,
    /// Protocol version announced by the peer.
    peer_version: Option<i32>,
    /// Bytes received after the last newline.
    pending: Vec<u8>,
}

impl<S: ByteStream> Channel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            required_len: None,
            peer_version: None,
            pending: Vec::new(),
        }
    }

    /// Buffer length learned from the peer, if any message was read yet.
    pub fn required_length(&self) -> Option<usize> {
        self.required_len
    }

    /// Protocol version announced by the peer.
    pub fn peer_version(&self) -> Option<i32> {
        self.peer_version
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Send one message with a single write.
    ///
    /// Short writes are not retried.
    pub fn write_message(&mut self, msg: &WireMessage) -> Result<()> {
        let line = encode(msg);
        let written = loop {
            match self.stream.write(line.as_bytes()) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_stream_error(e)),
            }
        };
        if written != line.len() {
            return Err(Error::Io(io::Error::new(
                ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, line.len()),
            )));
        }
        log::trace!("[epfmu] sent {} bytes, flag {}", written, msg.flag);
        Ok(())
    }

    /// Receive one message.
    pub fn read_message(&mut self) -> Result<WireMessage> {
        let required = match self.required_len {
            Some(len) => len,
            None => self.learn_required_length()?,
        };

        let mut line = std::mem::take(&mut self.pending);
        if let Some(pos) = line.iter().position(|&b| b == b'\n') {
            self.pending = line.split_off(pos + 1);
            return self.finish(&line);
        }

        line.reserve(required.saturating_sub(line.len()));
        let mut chunk = vec![0u8; READ_CHUNK.min(required)];
        loop {
            let n = match self.stream.read(&mut chunk) {
                Ok(0) => return Err(Error::Disconnected),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_stream_error(e)),
            };
            let fresh = &chunk[..n];
            if let Some(pos) = fresh.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&fresh[..=pos]);
                self.pending.extend_from_slice(&fresh[pos + 1..]);
                break;
            }
            line.extend_from_slice(fresh);
            if self.peer_version == Some(LEGACY_PROTOCOL_VERSION) {
                return Err(Error::LegacyOverflow);
            }
        }
        self.finish(&line)
    }

    /// Write `msg`, then read the reply.
    pub fn exchange(&mut self, msg: &WireMessage) -> Result<WireMessage> {
        self.write_message(msg)?;
        self.read_message()
    }

    /// Shut down both directions.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("[epfmu] socket shutdown: {}", e);
        }
    }

    fn learn_required_length(&mut self) -> Result<usize> {
        let mut peeked = vec![0u8; HEADER_LENGTH];
        let n = loop {
            match self.stream.peek(&mut peeked) {
                Ok(0) => return Err(Error::Disconnected),
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_stream_error(e)),
            }
        };
        let header = decode_header(&peeked[..n])?;
        let required = header.required_length()?;
        self.peer_version = Some(header.version);
        self.required_len = Some(required);
        log::debug!(
            "[epfmu] peer protocol version {}, {} doubles, buffer {} bytes",
            header.version,
            header.n_dbl,
            required
        );
        Ok(required)
    }

    fn finish(&mut self, line: &[u8]) -> Result<WireMessage> {
        let msg = decode(line)?;
        msg.header().required_length()?;
        log::trace!("[epfmu] received flag {}, {} doubles", msg.flag, msg.doubles.len());
        Ok(msg)
    }
}

fn map_stream_error(e: io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            Error::Disconnected
        }
        _ => Error::Io(e),
    }
}

// ============================================================================
// Transport: listener + accepted connection
// ============================================================================

/// Server side of the simulation connection.
pub struct Transport {
    state: TransportState,
    listener: Option<TcpListener>,
    channel: Option<Channel<Box<dyn ByteStream>>>,
    endpoint: Option<Endpoint>,
}

impl Transport {
    /// Unbound transport.
    pub fn new() -> Self {
        Self {
            state: TransportState::Unbound,
            listener: None,
            channel: None,
            endpoint: None,
        }
    }

    /// Transport already connected over `stream`, with no listener.
    pub fn connected(stream: Box<dyn ByteStream>) -> Self {
        Self {
            state: TransportState::Connected,
            listener: None,
            channel: Some(Channel::new(stream)),
            endpoint: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Endpoint published to the simulation.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Bind an ephemeral port and start listening.
    pub fn bind(&mut self, hostname: &str) -> Result<&Endpoint> {
        if self.state != TransportState::Unbound {
            return Err(Error::InvalidState(format!(
                "transport cannot bind while {:?}",
                self.state
            )));
        }
        let listener = create_tcp_listener().map_err(|e| Error::BindFailed(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::BindFailed(format!("cannot query bound port: {}", e)))?
            .port();

        log::info!("[epfmu] listening on port {} as {}", port, hostname);
        self.listener = Some(listener);
        self.state = TransportState::Listening;
        Ok(&*self.endpoint.insert(Endpoint {
            port,
            hostname: hostname.to_string(),
        }))
    }

    /// Write the discovery document for the simulation.
    pub fn publish(&self, path: &Path) -> Result<()> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::InvalidState("transport is not bound".into()))?;
        write_discovery_file(path, endpoint)
            .map_err(|e| Error::BindFailed(format!("cannot write {}: {}", path.display(), e)))
    }

    /// Block until the simulation connects.
    pub fn accept(&mut self) -> Result<SocketAddr> {
        let listener = match (&self.listener, self.state) {
            (Some(listener), TransportState::Listening) => listener,
            _ => {
                return Err(Error::InvalidState(format!(
                    "transport cannot accept while {:?}",
                    self.state
                )))
            }
        };
        let (stream, peer) = loop {
            match listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        };
        log::info!("[epfmu] simulation connected from {}", peer);
        self.channel = Some(Channel::new(Box::new(stream)));
        self.state = TransportState::Connected;
        Ok(peer)
    }

    /// Framed channel, once connected.
    pub fn channel(&mut self) -> Result<&mut Channel<Box<dyn ByteStream>>> {
        match (self.state, self.channel.as_mut()) {
            (TransportState::Connected, Some(channel)) => Ok(channel),
            (state, _) => Err(Error::InvalidState(format!(
                "transport is {:?}, not connected",
                state
            ))),
        }
    }

    /// Close the connection and the listener.
    ///
    /// Returns `false` when already closed.
    pub fn close(&mut self) -> bool {
        if self.state == TransportState::Closed {
            return false;
        }
        if let Some(mut channel) = self.channel.take() {
            channel.shutdown();
        }
        self.listener = None;
        self.state = TransportState::Closed;
        true
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}
