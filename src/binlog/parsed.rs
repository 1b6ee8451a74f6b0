// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use crate::error::Result;

use super::{events::DecodedEvent, reader::EventReader, registry::ParserRegistry};

/// Applies parsers of a [`ParserRegistry`] to the raw events of the wrapped reader.
///
/// Events that have no parser or fail to parse are returned undecoded, the latter
/// along with the error.
#[derive(Debug)]
pub struct ParsedEventReader<R> {
    reader: R,
    registry: ParserRegistry,
}

impl<R: EventReader> ParsedEventReader<R> {
    pub fn new(reader: R, registry: ParserRegistry) -> Self {
        Self { reader, registry }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ParserRegistry {
        &mut self.registry
    }

    /// Returns reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Returns mutable reference to the wrapped reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_parts(self) -> (R, ParserRegistry) {
        (self.reader, self.registry)
    }

    pub fn into_registry(self) -> ParserRegistry {
        self.registry
    }
}

impl<R: EventReader> EventReader for ParsedEventReader<R> {
    fn next_event(&mut self) -> Result<DecodedEvent> {
        let decoded = self.reader.next_event()?;
        if decoded.error.is_some() || !decoded.event.is_raw() {
            return Ok(decoded);
        }
        Ok(self.registry.decode(decoded.event.into_raw()))
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
            events::EventData,
            reader::RawEventReader,
            test_utils::{fde55_body, frame, query_body},
        },
        constants::EventType,
        error::Error,
        source::tests::ChunkedSource,
    };

    use super::*;

    #[test]
    fn should_decode_raw_events() -> Result<()> {
        let mut bytes = frame(EventType::FORMAT_DESCRIPTION_EVENT, 0, &fde55_body());
        bytes.extend(frame(
            EventType::QUERY_EVENT,
            0,
            &query_body(5, &[], b"db", b"CREATE TABLE t (a INT)"),
        ));
        bytes.extend(frame(EventType::XID_EVENT, 0, &[0; 4]));
        bytes.extend(frame(EventType::INTVAR_EVENT, 0, &[2; 9]));

        let mut source = ChunkedSource::new();
        source.push(&bytes);
        source.closed = true;
        let mut reader =
            ParsedEventReader::new(RawEventReader::new(source, "parsed"), ParserRegistry::new());

        let fde = reader.next_event()?.into_result()?;
        assert!(matches!(fde.data(), EventData::FormatDescription(_)));
        assert_eq!(reader.registry().num_known_types(), 28);

        match reader.next_event()?.into_result()?.data() {
            EventData::Query(query) => {
                assert_eq!(query.thread_id(), 5);
                assert_eq!(query.query(), "CREATE TABLE t (a INT)");
            }
            other => panic!("unexpected data {:?}", other),
        }

        let xid = reader.next_event()?;
        assert!(xid.event.is_raw());
        assert!(matches!(xid.error, Some(Error::Decode(_))));

        let intvar = reader.next_event()?;
        assert!(intvar.is_ok());
        assert!(intvar.event.is_raw());

        assert!(matches!(reader.next_event(), Err(Error::Exhausted)));
        Ok(())
    }
}
