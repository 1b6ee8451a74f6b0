// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{borrow::Cow, convert::TryFrom};

use crate::{
    binlog::raw::{BinlogEventHeader, RawEvent},
    constants::{BinlogChecksumAlg, EventType, UnknownChecksumAlg},
    error::{DecodeError, Error},
    io::ParseBuf,
};

/// Server version family a format description event was written by.
///
/// Recognized by the number of entries in the post-header lengths table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatDialect {
    /// 27 entries, no checksum.
    Mysql55,
    /// 35 entries followed by checksum algorithm and checksum.
    Mysql56,
    /// 38 entries followed by checksum algorithm and checksum.
    Mysql57,
    /// 40 or 41 entries followed by checksum algorithm and checksum.
    Mysql80,
}

impl FormatDialect {
    /// Detects the dialect by the number of bytes left after the common part.
    fn detect(len: usize) -> Option<(Self, usize)> {
        const TRAILER: usize = FormatDescriptionEvent::CHECKSUM_TRAILER_LEN;

        match len {
            27 => Some((FormatDialect::Mysql55, 27)),
            x if x == 35 + TRAILER => Some((FormatDialect::Mysql56, 35)),
            x if x == 38 + TRAILER => Some((FormatDialect::Mysql57, 38)),
            x if x == 40 + TRAILER => Some((FormatDialect::Mysql80, 40)),
            x if x == 41 + TRAILER => Some((FormatDialect::Mysql80, 41)),
            _ => None,
        }
    }

    /// Returns `true` if events of this dialect may carry a checksum.
    pub fn supports_checksum(self) -> bool {
        self != FormatDialect::Mysql55
    }
}

/// A descriptor event that is written to the beginning of a binlog file.
///
/// It describes the format of every other event in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatDescriptionEvent {
    binlog_version: u16,
    server_version: Vec<u8>,
    create_timestamp: u32,
    event_header_length: u8,
    post_header_lengths: Vec<u8>,
    dialect: FormatDialect,
    checksum_alg: Option<u8>,
    num_known_types: usize,
}

impl FormatDescriptionEvent {
    /// The whole body of this event is variable-length data.
    pub const POST_HEADER_LEN: usize = 0;
    pub const SERVER_VER_LEN: usize = 50;
    /// Size of the common part: binlog version, server version, timestamp, header length.
    pub const COMMON_LEN: usize = 2 + Self::SERVER_VER_LEN + 4 + 1;
    /// Checksum algorithm (1 byte) and checksum (4 bytes).
    pub const CHECKSUM_TRAILER_LEN: usize = 1 + 4;

    /// Parses the event and sets the checksum region of `raw` if the dialect has one.
    ///
    /// The binlog version isn't validated here. Log files reject versions other than 4
    /// in [`check_format_description`](crate::binlog::file::check_format_description);
    /// packet streams accept whatever the server sends.
    pub fn parse(raw: &mut RawEvent) -> Result<Self, Error> {
        let mut buf = ParseBuf(raw.variable_length_data());

        let binlog_version = buf.eat_u16_le()?;
        let server_version = buf.eat(Self::SERVER_VER_LEN)?;
        let server_version = match server_version.iter().position(|x| *x == 0) {
            Some(pos) => server_version[..pos].to_vec(),
            None => server_version.to_vec(),
        };
        let create_timestamp = buf.eat_u32_le()?;
        let event_header_length = buf.eat_u8()?;
        if (event_header_length as usize) < BinlogEventHeader::LEN {
            return Err(DecodeError::Invalid(format!(
                "event header length {} is shorter than the common header",
                event_header_length
            ))
            .into());
        }

        let (dialect, table_len) = FormatDialect::detect(buf.len())
            .ok_or_else(|| DecodeError::UnrecognizedDialect(buf.len()))?;
        let post_header_lengths = buf.eat(table_len)?.to_vec();
        let checksum_alg = if dialect.supports_checksum() {
            Some(buf.eat_u8()?)
        } else {
            None
        };

        let mut num_known_types = post_header_lengths.len() + 1;
        if dialect == FormatDialect::Mysql56
            && post_header_lengths[EventType::WRITE_ROWS_EVENT as usize - 1] == 0
        {
            // 5.5 primary behind a 5.6 relay.
            num_known_types = EventType::HEARTBEAT_EVENT as usize + 1;
        }

        if dialect.supports_checksum() {
            raw.set_checksum_size(4)?;
        }

        Ok(Self {
            binlog_version,
            server_version,
            create_timestamp,
            event_header_length,
            post_header_lengths,
            dialect,
            checksum_alg,
            num_known_types,
        })
    }

    pub fn binlog_version(&self) -> u16 {
        self.binlog_version
    }

    /// Returns the server version as a byte slice.
    pub fn server_version_raw(&self) -> &[u8] {
        &self.server_version
    }

    /// Returns the server version as a string (lossy converted).
    pub fn server_version(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.server_version)
    }

    /// Seconds since unix epoch when the binlog was created. May be `0`.
    pub fn create_timestamp(&self) -> u32 {
        self.create_timestamp
    }

    pub fn event_header_length(&self) -> u8 {
        self.event_header_length
    }

    /// Size of headers following the common 19-byte header.
    pub fn extra_headers_size(&self) -> usize {
        self.event_header_length as usize - BinlogEventHeader::LEN
    }

    pub fn dialect(&self) -> FormatDialect {
        self.dialect
    }

    /// Post-header lengths table, the first entry describes type `1`.
    pub fn post_header_lengths(&self) -> &[u8] {
        &self.post_header_lengths
    }

    /// Returns the post-header (fixed-length data) size declared for `event_type`.
    pub fn post_header_len(&self, event_type: EventType) -> Option<usize> {
        (event_type as usize)
            .checked_sub(1)
            .and_then(|i| self.post_header_lengths.get(i))
            .map(|x| *x as usize)
    }

    /// Number of event type codes (starting at `0`) this stream may contain.
    pub fn num_known_types(&self) -> usize {
        self.num_known_types
    }

    /// Body size this event must declare for itself in the post-header lengths table.
    pub fn expected_post_header_len(&self) -> usize {
        Self::COMMON_LEN + self.post_header_lengths.len()
    }

    /// Raw checksum algorithm, `None` for dialects without checksum support.
    pub fn raw_checksum_alg(&self) -> Option<u8> {
        self.checksum_alg
    }

    /// Checksum algorithm of the following events.
    pub fn checksum_alg(&self) -> Result<BinlogChecksumAlg, UnknownChecksumAlg> {
        match self.checksum_alg {
            Some(alg) => BinlogChecksumAlg::try_from(alg),
            None => Ok(BinlogChecksumAlg::BINLOG_CHECKSUM_ALG_OFF),
        }
    }
}
