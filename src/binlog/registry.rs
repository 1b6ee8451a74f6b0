// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Per-stream decoding session: parsers by event type and the table schemas
//! seen so far.

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{
    constants::{BinlogChecksumAlg, EventType},
    error::{DecodeError, Error},
};

use super::{
    events::{
        DecodedEvent, Event, EventData, FormatDescriptionEvent, GtidEvent, PreviousGtidsEvent,
        QueryEvent, RotateEvent, RowsEvent, RowsQueryEvent, TableContext, TableMapEvent,
        XidEvent,
    },
    raw::RawEvent,
};

/// Number of event type codes known before any format description event is seen.
pub const DEFAULT_NUM_KNOWN_TYPES: usize = EventType::HEARTBEAT_LOG_EVENT_V2 as usize + 1;

/// Table schemas by table id.
///
/// A newer table map event for the same id replaces the older context.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: HashMap<u64, Arc<TableContext>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `context` returning the context it replaced, if any.
    pub fn insert(&mut self, context: Arc<TableContext>) -> Option<Arc<TableContext>> {
        self.tables.insert(context.table_id(), context)
    }

    pub fn get(&self, table_id: u64) -> Option<&Arc<TableContext>> {
        self.tables.get(&table_id)
    }

    pub fn remove(&mut self, table_id: u64) -> Option<Arc<TableContext>> {
        self.tables.remove(&table_id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear()
    }
}

/// Decodes the regions of a frame into a typed payload.
pub type ParseFn = fn(&mut RawEvent, &TableRegistry) -> Result<EventData, Error>;

/// Parser of a single event type.
#[derive(Clone, Copy)]
pub struct Parser {
    event_type: EventType,
    fixed_length_data_size: usize,
    parse: ParseFn,
}

impl Parser {
    pub fn new(event_type: EventType, fixed_length_data_size: usize, parse: ParseFn) -> Self {
        Self {
            event_type,
            fixed_length_data_size,
            parse,
        }
    }

    /// Parser that leaves the event undecoded.
    pub fn no_op(event_type: EventType) -> Self {
        Self::new(event_type, 0, |_, _| Ok(EventData::Raw))
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Post-header size this parser expects, independent of the format description.
    pub fn fixed_length_data_size(&self) -> usize {
        self.fixed_length_data_size
    }

    pub fn parse(&self, raw: &mut RawEvent, tables: &TableRegistry) -> Result<EventData, Error> {
        (self.parse)(raw, tables)
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("event_type", &self.event_type)
            .field("fixed_length_data_size", &self.fixed_length_data_size)
            .finish()
    }
}

fn parse_rows(raw: &mut RawEvent, tables: &TableRegistry) -> Result<EventData, Error> {
    Ok(EventData::Rows(RowsEvent::parse(raw, tables)?))
}

/// Event type code to parser mapping plus the stream state that affects framing.
///
/// The state is updated by every format description event that goes through
/// [`ParserRegistry::decode`].
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    parsers: Vec<Option<Parser>>,
    num_known_types: usize,
    checksum_size: usize,
    extra_headers_size: usize,
    verify_checksums: bool,
    tables: TableRegistry,
}

impl ParserRegistry {
    /// Creates a registry without parsers.
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
            num_known_types: DEFAULT_NUM_KNOWN_TYPES,
            checksum_size: 0,
            extra_headers_size: 0,
            verify_checksums: false,
            tables: TableRegistry::new(),
        }
    }

    /// Creates a registry with parsers for every supported event type.
    pub fn new() -> Self {
        use EventType::*;

        let mut registry = Self::empty();
        let parsers = [
            Parser::new(
                FORMAT_DESCRIPTION_EVENT,
                FormatDescriptionEvent::POST_HEADER_LEN,
                |raw, _| Ok(EventData::FormatDescription(FormatDescriptionEvent::parse(raw)?)),
            ),
            Parser::new(QUERY_EVENT, QueryEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::Query(QueryEvent::parse(raw)?))
            }),
            Parser::new(STOP_EVENT, 0, |_, _| Ok(EventData::Stop)),
            Parser::new(ROTATE_EVENT, RotateEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::Rotate(RotateEvent::parse(raw)?))
            }),
            Parser::new(XID_EVENT, XidEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::Xid(XidEvent::parse(raw)?))
            }),
            Parser::new(TABLE_MAP_EVENT, TableMapEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::TableMap(TableMapEvent::parse(raw)?))
            }),
            Parser::new(WRITE_ROWS_EVENT_V1, RowsEvent::POST_HEADER_LEN_V1, parse_rows),
            Parser::new(UPDATE_ROWS_EVENT_V1, RowsEvent::POST_HEADER_LEN_V1, parse_rows),
            Parser::new(DELETE_ROWS_EVENT_V1, RowsEvent::POST_HEADER_LEN_V1, parse_rows),
            Parser::no_op(HEARTBEAT_EVENT),
            Parser::new(ROWS_QUERY_EVENT, RowsQueryEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::RowsQuery(RowsQueryEvent::parse(raw)?))
            }),
            Parser::new(WRITE_ROWS_EVENT, RowsEvent::POST_HEADER_LEN_V2, parse_rows),
            Parser::new(UPDATE_ROWS_EVENT, RowsEvent::POST_HEADER_LEN_V2, parse_rows),
            Parser::new(DELETE_ROWS_EVENT, RowsEvent::POST_HEADER_LEN_V2, parse_rows),
            Parser::new(GTID_EVENT, GtidEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::Gtid(GtidEvent::parse(raw)?))
            }),
            Parser::new(ANONYMOUS_GTID_EVENT, GtidEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::Gtid(GtidEvent::parse(raw)?))
            }),
            Parser::new(PREVIOUS_GTIDS_EVENT, PreviousGtidsEvent::POST_HEADER_LEN, |raw, _| {
                Ok(EventData::PreviousGtids(PreviousGtidsEvent::parse(raw)?))
            }),
        ];

        for parser in parsers.iter() {
            registry.parsers_mut(parser.event_type).replace(*parser);
        }

        registry
    }

    fn parsers_mut(&mut self, event_type: EventType) -> &mut Option<Parser> {
        let index = event_type as usize;
        if self.parsers.len() <= index {
            self.parsers.resize(index + 1, None);
        }
        &mut self.parsers[index]
    }

    /// Adds a parser. Fails if there already is one for the same event type.
    pub fn register(&mut self, parser: Parser) -> Result<(), Error> {
        let slot = self.parsers_mut(parser.event_type);
        if slot.is_some() {
            return Err(Error::DuplicateParser(parser.event_type));
        }
        *slot = Some(parser);
        Ok(())
    }

    /// Returns `true` if checksums of decoded events will be verified.
    pub fn verify_checksums(&self) -> bool {
        self.verify_checksums
    }

    pub fn set_verify_checksums(&mut self, verify_checksums: bool) {
        self.verify_checksums = verify_checksums;
    }

    pub fn with_verify_checksums(mut self, verify_checksums: bool) -> Self {
        self.verify_checksums = verify_checksums;
        self
    }

    /// Returns a parser for the given type code.
    ///
    /// `None` if the code is outside of the known type codes or there is no parser.
    pub fn get(&self, type_code: u8) -> Option<&Parser> {
        let index = type_code as usize;
        if index >= self.num_known_types {
            return None;
        }
        self.parsers.get(index).and_then(Option::as_ref)
    }

    /// Iterates over registered parsers.
    pub fn parsers(&self) -> impl Iterator<Item = &Parser> {
        self.parsers.iter().filter_map(Option::as_ref)
    }

    /// Checksum size of every event except format description events.
    pub fn checksum_size(&self) -> usize {
        self.checksum_size
    }

    pub fn extra_headers_size(&self) -> usize {
        self.extra_headers_size
    }

    pub fn num_known_types(&self) -> usize {
        self.num_known_types
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut TableRegistry {
        &mut self.tables
    }

    /// Reconfigures the registry according to the format description event.
    ///
    /// An unknown checksum algorithm disables checksums and is reported as an error.
    pub fn apply_format_description(
        &mut self,
        fde: &FormatDescriptionEvent,
    ) -> Result<(), DecodeError> {
        self.num_known_types = fde.num_known_types();
        let alg = fde.checksum_alg();
        self.checksum_size = alg.map(BinlogChecksumAlg::checksum_size).unwrap_or(0);
        debug!(
            server_version = %fde.server_version(),
            dialect = ?fde.dialect(),
            checksum_size = self.checksum_size,
            num_known_types = self.num_known_types,
            "format description applied"
        );
        alg.map(|_| ()).map_err(DecodeError::from)
    }

    /// Sets regions of `raw` and decodes it.
    ///
    /// The event is always returned. On failure its payload is [`EventData::Raw`]
    /// and the error is attached.
    pub fn decode(&mut self, mut raw: RawEvent) -> DecodedEvent {
        let is_fde = raw.event_type() == Some(EventType::FORMAT_DESCRIPTION_EVENT);

        // A format description event sets its own checksum size.
        let regions = if is_fde {
            raw.set_extra_headers_size(0)
        } else {
            raw.set_extra_headers_size(self.extra_headers_size)
                .and_then(|_| raw.set_checksum_size(self.checksum_size))
        };
        if let Err(err) = regions {
            return DecodedEvent::with_error(Event::raw(raw), err);
        }

        let parser = match self.get(raw.event_type_code()) {
            Some(parser) => *parser,
            None => return DecodedEvent::new(Event::raw(raw)),
        };

        if let Err(err) = raw.set_fixed_length_data_size(parser.fixed_length_data_size) {
            return DecodedEvent::with_error(Event::raw(raw), err);
        }

        let data = match parser.parse(&mut raw, &self.tables) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    source = raw.source_name(),
                    position = raw.source_position(),
                    event_type = raw.event_type_code(),
                    "failed to decode event: {}",
                    err
                );
                return DecodedEvent::with_error(Event::raw(raw), err);
            }
        };

        let mut error = None;
        match data {
            EventData::TableMap(ref event) => {
                self.tables.insert(event.context().clone());
            }
            EventData::FormatDescription(ref fde) => {
                error = self.apply_format_description(fde).err().map(Error::from);
            }
            _ => (),
        }

        if self.verify_checksums && error.is_none() && raw.checksum_size() > 0 {
            error = self.checksum_error(&raw, &data);
        }

        let event = Event::new(raw, data);
        match error {
            Some(err) => DecodedEvent::with_error(event, err),
            None => DecodedEvent::new(event),
        }
    }

    fn checksum_error(&self, raw: &RawEvent, data: &EventData) -> Option<Error> {
        if let EventData::FormatDescription(fde) = data {
            if fde.checksum_alg() != Ok(BinlogChecksumAlg::BINLOG_CHECKSUM_ALG_CRC32) {
                return None;
            }
        }
        raw.verify_checksum().err().map(Error::from)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
