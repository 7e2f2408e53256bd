// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ByteStream trait over the accepted simulation connection.
//!
//! The channel only needs blocking reads and writes plus a non-consuming
//! `peek`, so tests can replace the socket with an in-memory stream.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// Abstraction over a connected byte stream.
pub trait ByteStream: Read + Write + Send {
    /// Read without consuming.
    fn peek(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Shutdown the stream.
    fn shutdown(&mut self, how: Shutdown) -> io::Result<()>;

    /// Get the peer address of this stream.
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

// ============================================================================
// TcpStream implementation
// ============================================================================

impl ByteStream for TcpStream {
    fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::peek(self, buf)
    }

    fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        TcpStream::shutdown(self, how)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}

// ============================================================================
// Box<dyn ByteStream> implementation
// ============================================================================

impl ByteStream for Box<dyn ByteStream> {
    fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).peek(buf)
    }

    fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        (**self).shutdown(how)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        (**self).peer_addr()
    }
}

// ============================================================================
// Test mock stream
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock byte stream for testing.
    ///
    /// Reads are served from a queue, each `feed` forming one chunk so that
    /// partial deliveries can be simulated. Writes are captured.
    #[derive(Debug, Clone)]
    pub struct MockStream {
        /// Chunks available for reading
        chunks: Arc<Mutex<VecDeque<Vec<u8>>>>,

        /// Data written (for verification)
        written: Arc<Mutex<Vec<u8>>>,

        /// Number of peek calls
        peeks: Arc<AtomicUsize>,

        /// Number of shutdown calls
        shutdowns: Arc<AtomicUsize>,

        /// Error to inject on the next read
        read_error: Option<io::ErrorKind>,

        /// Error to inject on every write
        write_error: Option<io::ErrorKind>,
    }

    impl MockStream {
        /// Create a new mock stream.
        pub fn new() -> Self {
            Self {
                chunks: Arc::new(Mutex::new(VecDeque::new())),
                written: Arc::new(Mutex::new(Vec::new())),
                peeks: Arc::new(AtomicUsize::new(0)),
                shutdowns: Arc::new(AtomicUsize::new(0)),
                read_error: None,
                write_error: None,
            }
        }

        /// Queue one chunk for reading.
        pub fn feed(&self, data: &[u8]) {
            self.chunks.lock().unwrap().push_back(data.to_vec());
        }

        /// Get all data written to this stream.
        pub fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }

        /// Number of peeks issued so far.
        pub fn peek_count(&self) -> usize {
            self.peeks.load(Ordering::SeqCst)
        }

        /// Number of shutdowns issued so far.
        pub fn shutdown_count(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }

        /// Inject a read error.
        pub fn inject_read_error(&mut self, kind: io::ErrorKind) {
            self.read_error = Some(kind);
        }

        /// Inject a write error.
        pub fn inject_write_error(&mut self, kind: io::ErrorKind) {
            self.write_error = Some(kind);
        }
    }

    impl Default for MockStream {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(kind) = self.read_error.take() {
                return Err(io::Error::new(kind, "injected read error"));
            }
            let mut chunks = self.chunks.lock().unwrap();
            let Some(front) = chunks.front_mut() else {
                // Empty queue behaves like a closed peer.
                return Ok(0);
            };
            let n = front.len().min(buf.len());
            buf[..n].copy_from_slice(&front[..n]);
            *front = front.split_off(n);
            if front.is_empty() {
                chunks.pop_front();
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.write_error {
                return Err(io::Error::new(kind, "injected write error"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ByteStream for MockStream {
        fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
            self.peeks.fetch_add(1, Ordering::SeqCst);
            let chunks = self.chunks.lock().unwrap();
            let Some(front) = chunks.front() else {
                return Ok(0);
            };
            let n = front.len().min(buf.len());
            buf[..n].copy_from_slice(&front[..n]);
            Ok(n)
        }

        fn shutdown(&mut self, _how: Shutdown) -> io::Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn peer_addr(&self) -> io::Result<SocketAddr> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 54321)))
        }
    }
}
