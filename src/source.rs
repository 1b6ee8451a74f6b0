// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Byte and packet sources consumed by the event readers.

use std::io::{self, ErrorKind, Read};

/// Result of a single [`ByteSource::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// This many bytes (always non-zero) were written into the buffer.
    Data(usize),
    /// No bytes are available right now, but more may arrive later.
    Pending,
    /// The source is exhausted for good.
    Closed,
}

/// A source of raw binlog bytes.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Chunk>;
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
        (**self).read(buf)
    }
}

// stolen from futures-rs
macro_rules! with_interrupt {
    ($e:expr) => {
        loop {
            match $e {
                Ok(x) => {
                    break Ok(x);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {
                    continue;
                }
                Err(e) => {
                    break Err(e);
                }
            }
        }
    };
}

/// Adapts a [`Read`] implementation to the [`ByteSource`] contract.
///
/// End of stream and `WouldBlock` are both reported as [`Chunk::Pending`] since a log
/// file that is still being written may grow later.
#[derive(Debug)]
pub struct ReadSource<R> {
    read: R,
}

impl<R> ReadSource<R> {
    pub fn new(read: R) -> Self {
        Self { read }
    }

    /// Returns reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.read
    }

    /// Returns mutable reference to the wrapped reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.read
    }

    pub fn into_inner(self) -> R {
        self.read
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
        if buf.is_empty() {
            return Ok(Chunk::Data(0));
        }
        match with_interrupt!(self.read.read(buf)) {
            Ok(0) => Ok(Chunk::Pending),
            Ok(n) => Ok(Chunk::Data(n)),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(Chunk::Pending),
            Err(e) => Err(e),
        }
    }
}

/// Packet status marker of a successfully delivered binlog frame.
pub const PACKET_OK: u8 = 0x00;
/// Packet status marker of a server error.
pub const PACKET_ERR: u8 = 0xff;
/// Packet status marker of the end of the currently available stream.
pub const PACKET_EOF: u8 = 0xfe;

/// A packet oriented source, such as a replication connection.
///
/// Every packet starts with a status byte (one of [`PACKET_OK`], [`PACKET_ERR`],
/// [`PACKET_EOF`]) followed by its payload.
pub trait PacketSource {
    fn read_packet(&mut self) -> io::Result<Vec<u8>>;
}

impl<T: PacketSource + ?Sized> PacketSource for Box<T> {
    fn read_packet(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_packet()
    }
}
