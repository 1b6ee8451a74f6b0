// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Frame level readers.

use std::{cmp::min, sync::Arc};

use bytes::{Buf, BytesMut};
use tracing::error;

use crate::{
    error::{Error, Result},
    io::ParseBuf,
    source::{ByteSource, Chunk, PacketSource, PACKET_EOF, PACKET_ERR, PACKET_OK},
};

use super::{
    events::{DecodedEvent, Event},
    raw::{BinlogEventHeader, RawEvent},
};

/// A pull-based reader of binlog events.
///
/// `next_event` returns [`Error::NotYetAvailable`] if the underlying source has no
/// more bytes right now. Such a call may be repeated later and will continue where
/// the previous one stopped.
pub trait EventReader {
    /// Returns the next event together with a non-fatal error, if any.
    fn next_event(&mut self) -> Result<DecodedEvent>;

    fn close(&mut self) -> Result<()>;

    /// Returns the first `n` bytes of the next event header without consuming them.
    ///
    /// Used to detect the magic marker at the start of a file. `n` must not exceed
    /// [`BinlogEventHeader::LEN`].
    fn peek_header_bytes(&mut self, n: usize) -> Result<&[u8]>;

    /// Skips `n` bytes before the next event header.
    fn consume_header_bytes(&mut self, n: usize) -> Result<()>;

    /// Stream position right after the event being read (or to be read).
    fn next_event_end_position(&self) -> u64;
}

impl<T: EventReader + ?Sized> EventReader for Box<T> {
    fn next_event(&mut self) -> Result<DecodedEvent> {
        (**self).next_event()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn peek_header_bytes(&mut self, n: usize) -> Result<&[u8]> {
        (**self).peek_header_bytes(n)
    }

    fn consume_header_bytes(&mut self, n: usize) -> Result<()> {
        (**self).consume_header_bytes(n)
    }

    fn next_event_end_position(&self) -> u64 {
        (**self).next_event_end_position()
    }
}

/// Body of a frame under construction.
#[derive(Debug)]
struct PartialFrame {
    data: Vec<u8>,
    filled: usize,
}

/// Splits a byte source into raw v4 frames.
///
/// Regions of returned events aren't set, i.e. the whole body is variable-length data.
/// The source must not start with the binlog magic marker unless it is skipped via
/// [`EventReader::consume_header_bytes`].
#[derive(Debug)]
pub struct RawEventReader<S> {
    source: S,
    source_name: Arc<str>,
    position: u64,
    header: [u8; BinlogEventHeader::LEN],
    header_len: usize,
    frame: Option<PartialFrame>,
    poisoned: bool,
    closed: bool,
}

impl<S: ByteSource> RawEventReader<S> {
    pub fn new(source: S, source_name: impl Into<Arc<str>>) -> Self {
        Self {
            source,
            source_name: source_name.into(),
            position: 0,
            header: [0; BinlogEventHeader::LEN],
            header_len: 0,
            frame: None,
            poisoned: false,
            closed: false,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Stream position of the next event.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns reference to the byte source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Returns mutable reference to the byte source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn check_state(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else if self.poisoned {
            Err(Error::Poisoned)
        } else {
            Ok(())
        }
    }

    fn malformed(&mut self, reason: String) -> Error {
        self.poisoned = true;
        error!(
            source = &*self.source_name,
            position = self.position,
            "malformed binlog frame: {}",
            reason
        );
        Error::MalformedFrame {
            source_name: self.source_name.to_string(),
            position: self.position,
            reason,
        }
    }

    /// Reads into `buf`, mapping source exhaustion to the proper error.
    fn read_some(&mut self, at: ReadTarget) -> Result<usize> {
        let chunk = match at {
            ReadTarget::Header(n) => self.source.read(&mut self.header[self.header_len..n])?,
            ReadTarget::Body => match self.frame {
                Some(ref mut frame) => self.source.read(&mut frame.data[frame.filled..])?,
                None => return Err(Error::InvalidState("no frame to read")),
            },
        };
        match chunk {
            Chunk::Data(n) => Ok(n),
            Chunk::Pending => Err(Error::NotYetAvailable),
            Chunk::Closed if self.header_len == 0 && self.frame.is_none() => Err(Error::Exhausted),
            Chunk::Closed => Err(self.malformed("source closed in the middle of a frame".into())),
        }
    }

    /// Makes sure at least `n` header bytes are buffered.
    fn fill_header(&mut self, n: usize) -> Result<()> {
        while self.header_len < n {
            let read = self.read_some(ReadTarget::Header(n))?;
            self.header_len += read;
        }
        Ok(())
    }

    /// Reads the next frame.
    pub fn next_raw(&mut self) -> Result<RawEvent> {
        self.check_state()?;

        if self.frame.is_none() {
            self.fill_header(BinlogEventHeader::LEN)?;
            let total = self.declared_size();
            if total < BinlogEventHeader::LEN {
                return Err(self.malformed(format!(
                    "declared event size {} is less than header size",
                    total
                )));
            }
            let mut data = vec![0; total];
            data[..BinlogEventHeader::LEN].copy_from_slice(&self.header);
            self.frame = Some(PartialFrame {
                data,
                filled: BinlogEventHeader::LEN,
            });
        }

        while let Some(PartialFrame { data, filled }) = self.frame.as_ref() {
            if *filled == data.len() {
                break;
            }
            let read = self.read_some(ReadTarget::Body)?;
            if let Some(ref mut frame) = self.frame {
                frame.filled += read;
            }
        }

        let frame = self
            .frame
            .take()
            .ok_or(Error::InvalidState("no frame to complete"))?;
        self.header_len = 0;
        let start = self.position;
        self.position += frame.data.len() as u64;
        RawEvent::new(self.source_name.clone(), start, frame.data)
    }

    fn declared_size(&self) -> usize {
        ParseBuf(&self.header[9..13])
            .eat_u32_le()
            .map(|x| x as usize)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
enum ReadTarget {
    /// Header bytes up to the given length.
    Header(usize),
    Body,
}

impl<S: ByteSource> EventReader for RawEventReader<S> {
    fn next_event(&mut self) -> Result<DecodedEvent> {
        self.next_raw().map(|raw| DecodedEvent::new(Event::raw(raw)))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn peek_header_bytes(&mut self, n: usize) -> Result<&[u8]> {
        self.check_state()?;
        if n > BinlogEventHeader::LEN {
            return Err(Error::InvalidState("can't peek past the event header"));
        }
        if self.frame.is_some() {
            return Err(Error::InvalidState("event header is already parsed"));
        }
        self.fill_header(n)?;
        Ok(&self.header[..n])
    }

    fn consume_header_bytes(&mut self, n: usize) -> Result<()> {
        self.check_state()?;
        if self.frame.is_some() {
            return Err(Error::InvalidState(
                "can't consume header bytes while reading an event body",
            ));
        }
        if n > BinlogEventHeader::LEN {
            return Err(Error::InvalidState("can't consume past the event header"));
        }
        self.fill_header(n)?;
        self.header.copy_within(n..self.header_len, 0);
        self.header_len -= n;
        self.position += n as u64;
        Ok(())
    }

    fn next_event_end_position(&self) -> u64 {
        match self.frame {
            Some(ref frame) => self.position + frame.data.len() as u64,
            None => self.position + BinlogEventHeader::LEN as u64,
        }
    }
}

/// Bytes received in packets but not yet consumed by the frame reader.
#[derive(Debug, Default)]
pub struct PacketBuffer {
    buf: BytesMut,
}

impl PacketBuffer {
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

impl ByteSource for PacketBuffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Chunk> {
        if self.buf.is_empty() {
            return Ok(Chunk::Pending);
        }
        let n = min(buf.len(), self.buf.len());
        self.buf.copy_to_slice(&mut buf[..n]);
        Ok(Chunk::Data(n))
    }
}

/// Reads events from a replication connection.
///
/// Every packet carries a status byte followed by a single serialized event.
#[derive(Debug)]
pub struct PacketEventReader<P> {
    packets: P,
    reader: RawEventReader<PacketBuffer>,
}

impl<P: PacketSource> PacketEventReader<P> {
    pub const SOURCE_NAME: &'static str = "stream-reader";

    pub fn new(packets: P) -> Self {
        Self {
            packets,
            reader: RawEventReader::new(PacketBuffer::default(), Self::SOURCE_NAME),
        }
    }

    /// Returns mutable reference to the packet source.
    pub fn get_mut(&mut self) -> &mut P {
        &mut self.packets
    }

    /// Reads a packet and appends its payload to the frame buffer.
    fn read_packet(&mut self) -> Result<()> {
        let packet = self.packets.read_packet()?;
        let (status, payload) = match packet.split_first() {
            Some((status, payload)) => (*status, payload),
            None => return Err(Error::NotYetAvailable),
        };
        match status {
            PACKET_OK => {
                self.reader.get_mut().extend(payload);
                Ok(())
            }
            PACKET_ERR => Err(parse_err_packet(payload)),
            // the server has nothing to send now, can be retried to see new transactions
            PACKET_EOF => Err(Error::NotYetAvailable),
            x => Err(Error::MalformedFrame {
                source_name: Self::SOURCE_NAME.into(),
                position: self.reader.position(),
                reason: format!("unexpected packet status byte {:#04x}", x),
            }),
        }
    }
}

/// Parses the payload of an error packet: code, optional `#` and state, message.
fn parse_err_packet(payload: &[u8]) -> Error {
    let mut buf = ParseBuf(payload);
    let code = buf.eat_u16_le().unwrap_or_default();
    let mut state = String::new();
    if buf.0.first() == Some(&b'#') && buf.len() >= 6 {
        buf.eat_u8().ok();
        state = buf
            .eat(5)
            .map(|x| String::from_utf8_lossy(x).into_owned())
            .unwrap_or_default();
    }
    Error::Server {
        code,
        state,
        message: String::from_utf8_lossy(buf.eat_all()).into_owned(),
    }
}

impl<P: PacketSource> EventReader for PacketEventReader<P> {
    fn next_event(&mut self) -> Result<DecodedEvent> {
        loop {
            match self.reader.next_event() {
                Err(Error::NotYetAvailable) => self.read_packet()?,
                other => return other,
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader.close()
    }

    fn peek_header_bytes(&mut self, n: usize) -> Result<&[u8]> {
        loop {
            match self.reader.peek_header_bytes(n) {
                Err(Error::NotYetAvailable) => self.read_packet()?,
                Err(err) => return Err(err),
                Ok(_) => break,
            }
        }
        self.reader.peek_header_bytes(n)
    }

    fn consume_header_bytes(&mut self, n: usize) -> Result<()> {
        loop {
            match self.reader.consume_header_bytes(n) {
                Err(Error::NotYetAvailable) => self.read_packet()?,
                other => return other,
            }
        }
    }

    fn next_event_end_position(&self) -> u64 {
        self.reader.next_event_end_position()
    }
}
