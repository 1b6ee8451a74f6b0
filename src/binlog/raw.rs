// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! In-memory representation of a single binlog frame.

use std::{convert::TryFrom, fmt, sync::Arc};

use saturating::Saturating as S;

use crate::{
    constants::{EventFlags, EventType, UnknownEventType},
    error::{DecodeError, Error},
    io::ParseBuf,
};

/// Binlog event header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinlogEventHeader {
    /// Seconds since unix epoch.
    pub timestamp: u32,
    /// Raw event type code.
    pub event_type: u8,
    /// Server-id of the originating mysql-server.
    ///
    /// Used to filter out events in circular replication.
    pub server_id: u32,
    /// Size of the event (header, post-header, body).
    pub event_size: u32,
    /// Position of the next event as written by the server.
    ///
    /// This value is advisory and is known to be wrong in some streams
    /// (e.g. relay logs), so it is never used to compute offsets.
    pub log_pos: u32,
    /// Raw event flags. Use [`BinlogEventHeader::flags`] to get the known ones.
    pub flags: u16,
}

impl BinlogEventHeader {
    /// Binlog event header length for version >= 4.
    pub const LEN: usize = 19;

    /// Offset of the flags field within a serialized header.
    const FLAGS_OFFSET: usize = 17;

    /// Parses a header from the first [`BinlogEventHeader::LEN`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = ParseBuf(bytes);
        buf.ensure(Self::LEN)?;
        Ok(Self {
            timestamp: buf.eat_u32_le()?,
            event_type: buf.eat_u8()?,
            server_id: buf.eat_u32_le()?,
            event_size: buf.eat_u32_le()?,
            log_pos: buf.eat_u32_le()?,
            flags: buf.eat_u16_le()?,
        })
    }

    /// Returns the parsed event type, if it's known.
    pub fn event_type(&self) -> Result<EventType, UnknownEventType> {
        EventType::try_from(self.event_type)
    }

    /// Returns known flags, unknown bits are dropped.
    pub fn flags(&self) -> EventFlags {
        EventFlags::from_bits_truncate(self.flags)
    }
}

/// A single binlog frame: the owned header+body buffer plus the boundaries of its
/// sub-regions.
///
/// The body is split into four regions: extra headers, fixed-length (post-header)
/// data, variable-length data and checksum. The variable-length region takes
/// whatever is left, so a region whose size was never set reads as empty.
#[derive(Clone, PartialEq, Eq)]
pub struct RawEvent {
    source_name: Arc<str>,
    source_position: u64,
    header: BinlogEventHeader,
    data: Vec<u8>,
    extra_headers_size: usize,
    fixed_length_data_size: usize,
    checksum_size: usize,
}

impl RawEvent {
    /// Creates a frame from a buffer that holds exactly one serialized event.
    ///
    /// `source_position` is the offset of the first byte of `data` within the named source.
    pub fn new(source_name: Arc<str>, source_position: u64, data: Vec<u8>) -> Result<Self, Error> {
        let malformed = |reason: String| Error::MalformedFrame {
            source_name: source_name.to_string(),
            position: source_position,
            reason,
        };

        let header =
            BinlogEventHeader::parse(&data).map_err(|err| malformed(err.to_string()))?;
        if header.event_size as usize != data.len() {
            return Err(malformed(format!(
                "declared event size {} doesn't match buffer size {}",
                header.event_size,
                data.len()
            )));
        }

        Ok(Self {
            source_name,
            source_position,
            header,
            data,
            extra_headers_size: 0,
            fixed_length_data_size: 0,
            checksum_size: 0,
        })
    }

    pub fn header(&self) -> &BinlogEventHeader {
        &self.header
    }

    /// Returns the event type if it is known.
    pub fn event_type(&self) -> Option<EventType> {
        self.header.event_type().ok()
    }

    pub fn event_type_code(&self) -> u8 {
        self.header.event_type
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn server_id(&self) -> u32 {
        self.header.server_id
    }

    pub fn event_length(&self) -> usize {
        self.data.len()
    }

    /// Advisory next position from the event header. See [`BinlogEventHeader::log_pos`].
    pub fn next_position(&self) -> u32 {
        self.header.log_pos
    }

    pub fn flags(&self) -> u16 {
        self.header.flags
    }

    /// Name of the log (or stream) this event was read from.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Position of this event's first byte within its source.
    pub fn source_position(&self) -> u64 {
        self.source_position
    }

    /// Position right after this event within its source.
    pub fn end_position(&self) -> u64 {
        self.source_position + self.data.len() as u64
    }

    /// The whole serialized event.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn basic_header(&self) -> &[u8] {
        &self.data[..BinlogEventHeader::LEN]
    }

    pub fn extra_headers(&self) -> &[u8] {
        let start = BinlogEventHeader::LEN;
        &self.data[start..start + self.extra_headers_size]
    }

    pub fn fixed_length_data(&self) -> &[u8] {
        let start = BinlogEventHeader::LEN + self.extra_headers_size;
        &self.data[start..start + self.fixed_length_data_size]
    }

    pub fn variable_length_data(&self) -> &[u8] {
        let start =
            BinlogEventHeader::LEN + self.extra_headers_size + self.fixed_length_data_size;
        &self.data[start..self.data.len() - self.checksum_size]
    }

    pub fn checksum(&self) -> &[u8] {
        &self.data[self.data.len() - self.checksum_size..]
    }

    pub fn extra_headers_size(&self) -> usize {
        self.extra_headers_size
    }

    pub fn fixed_length_data_size(&self) -> usize {
        self.fixed_length_data_size
    }

    pub fn variable_length_data_size(&self) -> usize {
        self.variable_length_data().len()
    }

    pub fn checksum_size(&self) -> usize {
        self.checksum_size
    }

    pub fn set_extra_headers_size(&mut self, size: usize) -> Result<(), Error> {
        self.check_regions(
            "extra headers",
            size,
            size,
            self.fixed_length_data_size,
            self.checksum_size,
        )?;
        self.extra_headers_size = size;
        Ok(())
    }

    pub fn set_fixed_length_data_size(&mut self, size: usize) -> Result<(), Error> {
        self.check_regions(
            "fixed length data",
            size,
            self.extra_headers_size,
            size,
            self.checksum_size,
        )?;
        self.fixed_length_data_size = size;
        Ok(())
    }

    pub fn set_checksum_size(&mut self, size: usize) -> Result<(), Error> {
        self.check_regions(
            "checksum",
            size,
            self.extra_headers_size,
            self.fixed_length_data_size,
            size,
        )?;
        self.checksum_size = size;
        Ok(())
    }

    fn check_regions(
        &self,
        region: &'static str,
        size: usize,
        extra_headers: usize,
        fixed_length: usize,
        checksum: usize,
    ) -> Result<(), Error> {
        let sum = S(BinlogEventHeader::LEN) + S(extra_headers) + S(fixed_length) + S(checksum);
        if sum.0 > self.data.len() {
            return Err(Error::InvalidRegionSize {
                region,
                size,
                total: self.data.len(),
            });
        }
        Ok(())
    }

    /// Computes CRC32 of the event excluding its checksum region.
    ///
    /// `LOG_EVENT_BINLOG_IN_USE_F` is ignored for format description events since the
    /// server clears it after the checksum was written.
    pub fn calc_checksum(&self) -> u32 {
        let end = self.data.len() - self.checksum_size;
        let mut header = [0_u8; BinlogEventHeader::LEN];
        header.copy_from_slice(self.basic_header());
        if self.event_type() == Some(EventType::FORMAT_DESCRIPTION_EVENT) {
            header[BinlogEventHeader::FLAGS_OFFSET] &=
                !(EventFlags::LOG_EVENT_BINLOG_IN_USE_F.bits() as u8);
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(&self.data[BinlogEventHeader::LEN..end]);
        hasher.finalize()
    }

    /// Compares the stored CRC32 checksum with the computed one.
    ///
    /// Does nothing if the checksum region isn't 4 bytes long.
    pub fn verify_checksum(&self) -> Result<(), DecodeError> {
        if self.checksum_size != 4 {
            return Ok(());
        }
        let expected = ParseBuf(self.checksum()).eat_u32_le()?;
        let actual = self.calc_checksum();
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }
}

impl fmt::Debug for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEvent")
            .field("source_name", &self.source_name)
            .field("source_position", &self.source_position)
            .field("header", &self.header)
            .field("extra_headers", &self.extra_headers())
            .field("fixed_length_data", &self.fixed_length_data())
            .field("variable_length_data_size", &self.variable_length_data_size())
            .field("checksum", &self.checksum())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const EVENT: &[u8] = b"\x04\x03\x02\x01\x12\x0f\x0e\x0e\x0b\x16\x00\x00\x00\xf4\xf3\xf2\xf1\xad\xde\x0a\x0b\x0c";

    fn event() -> RawEvent {
        RawEvent::new("test".into(), 1234, EVENT.to_vec()).unwrap()
    }

    #[test]
    fn should_parse_header() {
        let event = event();
        assert_eq!(event.timestamp(), 0x01020304);
        assert_eq!(event.event_type_code(), 0x12);
        assert_eq!(event.event_type(), Some(EventType::EXECUTE_LOAD_QUERY_EVENT));
        assert_eq!(event.server_id(), 0x0b0e0e0f);
        assert_eq!(event.event_length(), 22);
        assert_eq!(event.next_position(), 0xf1f2f3f4);
        assert_eq!(event.flags(), 0xdead);
        assert_eq!(event.source_position(), 1234);
        assert_eq!(event.end_position(), 1256);
        assert_eq!(event.basic_header(), &EVENT[..19]);
    }

    #[test]
    fn unset_regions_are_empty() {
        let event = event();
        assert_eq!(event.extra_headers(), b"");
        assert_eq!(event.fixed_length_data(), b"");
        assert_eq!(event.variable_length_data(), b"\x0a\x0b\x0c");
        assert_eq!(event.checksum(), b"");
    }

    #[test]
    fn should_split_regions() -> Result<(), Error> {
        let mut event = event();
        event.set_extra_headers_size(1)?;
        event.set_fixed_length_data_size(1)?;
        event.set_checksum_size(1)?;
        assert_eq!(event.extra_headers(), b"\x0a");
        assert_eq!(event.fixed_length_data(), b"\x0b");
        assert_eq!(event.variable_length_data(), b"");
        assert_eq!(event.checksum(), b"\x0c");
        Ok(())
    }

    #[test]
    fn should_reject_oversized_regions() -> Result<(), Error> {
        let mut event = event();
        event.set_fixed_length_data_size(2)?;
        assert!(matches!(
            event.set_checksum_size(2),
            Err(Error::InvalidRegionSize {
                region: "checksum",
                size: 2,
                total: 22
            })
        ));
        assert!(event.set_extra_headers_size(4).is_err());
        assert_eq!(event.checksum_size(), 0);
        assert_eq!(event.fixed_length_data(), b"\x0a\x0b");
        assert_eq!(event.variable_length_data(), b"\x0c");
        Ok(())
    }

    #[test]
    fn should_reject_size_mismatch() {
        let mut data = EVENT.to_vec();
        data.push(0);
        assert!(matches!(
            RawEvent::new("test".into(), 0, data),
            Err(Error::MalformedFrame { position: 0, .. })
        ));
        assert!(RawEvent::new("test".into(), 0, EVENT[..18].to_vec()).is_err());
    }

    #[test]
    fn should_verify_checksum() -> Result<(), Error> {
        let mut data = EVENT.to_vec();
        data[9] = 26;
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let mut event = RawEvent::new("test".into(), 4, data)?;
        event.set_checksum_size(4)?;
        assert_eq!(event.calc_checksum(), crc);
        event.verify_checksum()?;

        let mut data = event.bytes().to_vec();
        data[20] ^= 0xff;
        let mut event = RawEvent::new("test".into(), 4, data)?;
        event.set_checksum_size(4)?;
        assert!(matches!(
            event.verify_checksum(),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
        Ok(())
    }

    proptest! {
        #[test]
        fn regions_always_cover_the_frame(
            body in proptest::collection::vec(any::<u8>(), 0..64),
            extra in 0usize..80,
            fixed in 0usize..80,
            checksum in 0usize..8,
        ) {
            let mut data = EVENT[..19].to_vec();
            data[9..13].copy_from_slice(&((19 + body.len()) as u32).to_le_bytes());
            data.extend_from_slice(&body);
            let mut event = RawEvent::new("prop".into(), 0, data).unwrap();

            let fits = 19 + extra + fixed + checksum <= event.event_length();
            let result = event
                .set_extra_headers_size(extra)
                .and_then(|_| event.set_fixed_length_data_size(fixed))
                .and_then(|_| event.set_checksum_size(checksum));
            prop_assert_eq!(result.is_ok(), fits);

            let total = event.basic_header().len()
                + event.extra_headers().len()
                + event.fixed_length_data().len()
                + event.variable_length_data().len()
                + event.checksum().len();
            prop_assert_eq!(total, event.event_length());
        }
    }
}
