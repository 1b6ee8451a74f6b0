// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Reader of a single binlog or relay log file.

use std::{convert::TryInto, sync::Arc};

use tracing::debug;

use crate::{
    constants::EventType,
    error::{Error, Result},
    source::ByteSource,
};

use super::{
    events::{DecodedEvent, EventData, FormatDescriptionEvent, GtidEvent},
    parsed::ParsedEventReader,
    raw::BinlogEventHeader,
    reader::{EventReader, RawEventReader},
    registry::ParserRegistry,
};

/// Every binlog and relay log file starts with these bytes.
pub const BINLOG_MAGIC: &[u8] = b"\xfe\x62\x69\x6e";

/// Bytes of the first event header needed to tell the binlog format version.
const FORMAT_VERSION_HEADER_LEN: usize = 13;
/// `START_EVENT_V3` of a v1 binlog is shorter than this.
const MAX_FIRST_EVENT_LENGTH_FOR_V1: u32 = 75;

/// Returns binlog format version judging by the header of the first event.
///
/// See "Determining the Binary Log Version" in MySQL internals manual.
fn format_version(header: &[u8]) -> u8 {
    let event_type = header[4];
    let event_length = header[9..13]
        .try_into()
        .map(u32::from_le_bytes)
        .unwrap_or_default();

    if event_type == EventType::FORMAT_DESCRIPTION_EVENT as u8 {
        4
    } else if event_type == EventType::START_EVENT_V3 as u8
        && event_length < MAX_FIRST_EVENT_LENGTH_FOR_V1
    {
        1
    } else {
        3
    }
}

/// Reads events of a single log file.
///
/// Checks the magic marker and the binlog format version before the first event,
/// and validates every format description event against the registered parsers.
#[derive(Debug)]
pub struct LogFileEventReader<S> {
    reader: ParsedEventReader<RawEventReader<S>>,
    passed_magic_check: bool,
    passed_format_version_check: bool,
}

impl<S: ByteSource> LogFileEventReader<S> {
    pub fn new(source: S, source_name: impl Into<Arc<str>>, registry: ParserRegistry) -> Self {
        Self {
            reader: ParsedEventReader::new(RawEventReader::new(source, source_name), registry),
            passed_magic_check: false,
            passed_format_version_check: false,
        }
    }

    pub fn source_name(&self) -> &str {
        self.reader.get_ref().source_name()
    }

    /// Position of the next event within the file.
    pub fn position(&self) -> u64 {
        self.reader.get_ref().position()
    }

    pub fn registry(&self) -> &ParserRegistry {
        self.reader.registry()
    }

    pub fn into_registry(self) -> ParserRegistry {
        self.reader.into_registry()
    }

    fn check_magic(&mut self) -> Result<()> {
        if self.passed_magic_check {
            return Ok(());
        }

        let magic = self.reader.peek_header_bytes(BINLOG_MAGIC.len())?;
        if magic != BINLOG_MAGIC {
            return Err(Error::InvalidMagic(magic.to_vec()));
        }
        self.reader.consume_header_bytes(BINLOG_MAGIC.len())?;

        self.passed_magic_check = true;
        Ok(())
    }

    fn check_format_version(&mut self) -> Result<()> {
        if self.passed_format_version_check {
            return Ok(());
        }

        let header = self.reader.peek_header_bytes(FORMAT_VERSION_HEADER_LEN)?;
        let version = format_version(header);
        if version != 4 {
            return Err(Error::UnsupportedBinlogVersion(version));
        }
        debug!(source = self.source_name(), "binlog format version is 4");

        self.passed_format_version_check = true;
        Ok(())
    }
}

/// Validates a format description event against the parsers of `registry`.
///
/// All mismatches are collected into a single message.
pub fn check_format_description(
    fde: &FormatDescriptionEvent,
    registry: &ParserRegistry,
) -> std::result::Result<(), String> {
    if fde.binlog_version() != 4 {
        return Err(format!("invalid binlog format version {}", fde.binlog_version()));
    }
    if (fde.event_header_length() as usize) != BinlogEventHeader::LEN {
        return Err(format!("invalid extra headers size {}", fde.extra_headers_size()));
    }
    if let Err(err) = fde.checksum_alg() {
        return Err(format!("invalid checksum algorithm {}", err.0));
    }

    let mut mismatches = Vec::new();
    match fde.post_header_len(EventType::FORMAT_DESCRIPTION_EVENT) {
        Some(actual) if actual == fde.expected_post_header_len() => (),
        actual => mismatches.push(format!(
            "{:?} (expected: {} actual: {:?})",
            EventType::FORMAT_DESCRIPTION_EVENT,
            fde.expected_post_header_len(),
            actual
        )),
    }

    for parser in registry.parsers() {
        let event_type = parser.event_type();
        if event_type == EventType::FORMAT_DESCRIPTION_EVENT
            || (event_type as usize) >= fde.num_known_types()
        {
            continue;
        }
        let actual = match fde.post_header_len(event_type) {
            Some(actual) => actual,
            None => continue,
        };
        let expected = parser.fixed_length_data_size();
        let with_logical_timestamp = matches!(
            event_type,
            EventType::GTID_EVENT | EventType::ANONYMOUS_GTID_EVENT
        ) && actual == GtidEvent::POST_HEADER_LEN_WITH_LOGICAL_TIMESTAMP;
        if actual != expected && !with_logical_timestamp {
            mismatches.push(format!(
                "{:?} (expected: {} actual: {})",
                event_type, expected, actual
            ));
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "invalid fixed length data size: {}",
            mismatches.join("; ")
        ))
    }
}

impl<S: ByteSource> EventReader for LogFileEventReader<S> {
    fn next_event(&mut self) -> Result<DecodedEvent> {
        self.check_magic()?;
        self.check_format_version()?;

        let decoded = self.reader.next_event()?;
        let check = match decoded.event.data() {
            EventData::FormatDescription(fde) => check_format_description(fde, self.reader.registry()),
            _ => Ok(()),
        };
        match check {
            Ok(()) => Ok(decoded),
            Err(msg) => Ok(decoded.or_error(Error::Continuity(msg))),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader.close()
    }

    fn peek_header_bytes(&mut self, n: usize) -> Result<&[u8]> {
        self.reader.peek_header_bytes(n)
    }

    fn consume_header_bytes(&mut self, n: usize) -> Result<()> {
        self.reader.consume_header_bytes(n)
    }

    fn next_event_end_position(&self) -> u64 {
        self.reader.next_event_end_position()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        binlog::{
            registry::Parser,
            test_utils::{fde55_body, fde56_body, frame, LogFileBuilder},
        },
        source::tests::ChunkedSource,
    };

    use super::*;

    fn file_reader(bytes: &[u8], registry: ParserRegistry) -> LogFileEventReader<ChunkedSource> {
        let mut source = ChunkedSource::new();
        source.push(bytes);
        source.closed = true;
        LogFileEventReader::new(source, "bin.000001", registry)
    }

    #[test]
    fn should_read_5_5_file() -> Result<()> {
        let file = LogFileBuilder::mysql55().query("BEGIN").xid(7).build();
        let mut reader = file_reader(&file, ParserRegistry::new());

        let fde = reader.next_event()?.into_result()?;
        assert_eq!(fde.source_position(), 4);
        assert!(matches!(fde.data(), EventData::FormatDescription(_)));
        assert!(matches!(
            reader.next_event()?.into_result()?.data(),
            EventData::Query(_)
        ));
        match reader.next_event()?.into_result()?.data() {
            EventData::Xid(xid) => assert_eq!(xid.xid(), 7),
            other => panic!("unexpected data {:?}", other),
        }
        assert!(matches!(reader.next_event(), Err(Error::Exhausted)));
        assert_eq!(reader.position(), file.len() as u64);
        Ok(())
    }

    #[test]
    fn should_read_5_6_file_with_checksums() -> Result<()> {
        let file = LogFileBuilder::mysql56().query("BEGIN").xid(8).build();
        let mut reader = file_reader(&file, ParserRegistry::new().with_verify_checksums(true));

        reader.next_event()?.into_result()?;
        assert_eq!(reader.registry().checksum_size(), 4);
        let query = reader.next_event()?.into_result()?;
        assert_eq!(query.raw_event().checksum_size(), 4);
        match reader.next_event()?.into_result()?.data() {
            EventData::Xid(xid) => assert_eq!(xid.xid(), 8),
            other => panic!("unexpected data {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn should_reject_bad_magic() {
        let mut file = LogFileBuilder::mysql55().build();
        file[1] = b'B';
        let mut reader = file_reader(&file, ParserRegistry::new());
        match reader.next_event() {
            Err(err @ Error::InvalidMagic(_)) => assert!(err.is_fatal()),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn should_reject_old_format_versions() {
        let mut file = BINLOG_MAGIC.to_vec();
        file.extend(frame(EventType::START_EVENT_V3, 0, &[0; 56]));
        let mut reader = file_reader(&file, ParserRegistry::new());
        assert!(matches!(
            reader.next_event(),
            Err(Error::UnsupportedBinlogVersion(3))
        ));

        let mut file = BINLOG_MAGIC.to_vec();
        file.extend(frame(EventType::START_EVENT_V3, 0, &[0; 10]));
        let mut reader = file_reader(&file, ParserRegistry::new());
        assert!(matches!(
            reader.next_event(),
            Err(Error::UnsupportedBinlogVersion(1))
        ));

        let mut file = BINLOG_MAGIC.to_vec();
        file.extend(frame(EventType::QUERY_EVENT, 0, &[0; 20]));
        let mut reader = file_reader(&file, ParserRegistry::new());
        assert!(matches!(
            reader.next_event(),
            Err(Error::UnsupportedBinlogVersion(3))
        ));
    }

    #[test]
    fn should_wait_for_magic() {
        let mut source = ChunkedSource::new();
        source.push(&BINLOG_MAGIC[..2]);
        let mut reader = LogFileEventReader::new(source, "bin.000001", ParserRegistry::new());
        assert!(matches!(reader.next_event(), Err(Error::NotYetAvailable)));
    }

    #[test]
    fn should_check_parser_sizes() -> Result<()> {
        let mut registry = ParserRegistry::empty();
        registry.register(Parser::new(EventType::FORMAT_DESCRIPTION_EVENT, 0, |raw, _| {
            Ok(EventData::FormatDescription(FormatDescriptionEvent::parse(raw)?))
        }))?;
        registry.register(Parser::new(EventType::ROTATE_EVENT, 10, |_, _| {
            Ok(EventData::Raw)
        }))?;
        let file = LogFileBuilder::mysql55().build();
        let mut reader = file_reader(&file, registry);

        let decoded = reader.next_event()?;
        assert!(matches!(
            decoded.event.data(),
            EventData::FormatDescription(_)
        ));
        match decoded.error {
            Some(Error::Continuity(msg)) => assert!(msg.contains("ROTATE_EVENT"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn should_report_bad_binlog_version() -> Result<()> {
        let mut body = fde56_body(0);
        body[0] = 3;
        let mut file = BINLOG_MAGIC.to_vec();
        file.extend(frame(EventType::FORMAT_DESCRIPTION_EVENT, 0, &body));
        let mut reader = file_reader(&file, ParserRegistry::new());

        let decoded = reader.next_event()?;
        assert!(matches!(decoded.error, Some(Error::Continuity(_))));
        assert_eq!(reader.registry().num_known_types(), 36);
        Ok(())
    }

    #[test]
    fn should_accept_format_descriptions() {
        let registry = ParserRegistry::new();
        for body in &[fde55_body(), fde56_body(0), fde56_body(1)] {
            let mut raw = crate::binlog::raw::RawEvent::new(
                "fde".into(),
                4,
                frame(EventType::FORMAT_DESCRIPTION_EVENT, 0, body),
            )
            .unwrap();
            let fde = FormatDescriptionEvent::parse(&mut raw).unwrap();
            assert_eq!(check_format_description(&fde, &registry), Ok(()));
        }
    }
}
