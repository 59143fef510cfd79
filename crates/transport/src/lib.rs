// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the TCP transport that relays [`bus`] register words and
//! frame payloads to a remote HRAM device server.
//!
//! A transport exposes a single operation, [`BusTransport::exchange`]:
//! send an 8-byte request word, optionally send or receive a
//! [`bus::FRAME_SIZE`]-byte payload depending on the opcode carried in
//! the word, then receive an 8-byte response word. [`TcpTransport`] is
//! the production implementation; tests exercise the same contract
//! against an in-process listener rather than a real device server,
//! which stays out of scope here.

#![forbid(unsafe_code)]

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bus::{Opcode, PayloadDirection, FRAME_SIZE};

/// Errors that can occur while exchanging a request with the device
/// server.
///
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying TCP connection could not be established or a read
    /// or write on it failed. Every short read, short write or connect
    /// failure is a hard failure; the transport never retries
    /// internally.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request word's `key1` field did not name a known opcode.
    #[error("unknown opcode in request word: {0}")]
    UnknownOpcode(u8),
}

/// A single one-round-trip exchange with the device: a request word,
/// optionally a frame payload, and a response word.
///
/// Implementors must perform 64-bit host-to-network byte order
/// conversion on the register words they send and receive; frame
/// payloads are opaque bytes and pass through unmodified.
///
pub trait BusTransport {
    /// Sends `request` and returns the response word. `buffer` is a
    /// caller-owned read-target or write-source, used or left alone
    /// according to the opcode encoded in `request`.
    fn exchange(&mut self, request: u64, buffer: &mut [u8; FRAME_SIZE]) -> Result<u64, Error>;
}

/// A [`BusTransport`] backed by a TCP connection to a remote device
/// server.
///
/// The connection is opened lazily on the first call to `exchange` and
/// reused by subsequent calls. A shutdown opcode closes the socket
/// after its exchange completes and re-arms the lazy-connect state, so
/// the next `exchange` reopens it.
///
pub struct TcpTransport {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Returns a transport configured to connect to `host:port`. No
    /// connection is made until the first `exchange` call.
    ///
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        TcpTransport {
            host: host.into(),
            port,
            stream: None,
        }
    }

    fn connection(&mut self) -> Result<&mut TcpStream, Error> {
        if self.stream.is_none() {
            let addr = (self.host.as_str(), self.port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        format!("no addresses resolved for {}:{}", self.host, self.port),
                    )
                })?;
            log::debug!("transport: connecting to {}", addr);
            let stream = TcpStream::connect(addr)?;
            stream.set_nodelay(true)?;
            self.stream = Some(stream);
        }

        Ok(self.stream.as_mut().expect("just populated"))
    }

    fn disconnect(&mut self) {
        log::debug!("transport: closing connection to {}:{}", self.host, self.port);
        self.stream = None;
    }
}

impl BusTransport for TcpTransport {
    fn exchange(&mut self, request: u64, buffer: &mut [u8; FRAME_SIZE]) -> Result<u64, Error> {
        let fields = bus::decode(request);
        let opcode = Opcode::try_from(fields.key1).map_err(|e| Error::UnknownOpcode(e.0))?;
        let direction = opcode.payload_direction();

        let stream = self.connection()?;
        stream.write_all(&request.to_be_bytes())?;

        if direction == Some(PayloadDirection::HostToDevice) {
            stream.write_all(buffer)?;
        }

        let mut response_bytes = [0u8; 8];
        stream.read_exact(&mut response_bytes)?;
        let response = u64::from_be_bytes(response_bytes);

        if direction == Some(PayloadDirection::DeviceToHost) {
            stream.read_exact(buffer)?;
        }

        if opcode == Opcode::Shutdown {
            self.disconnect();
        }

        Ok(response)
    }
}
