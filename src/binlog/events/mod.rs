// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Typed binlog events.

use crate::{constants::EventType, error::Error};

use super::raw::RawEvent;

pub use self::{
    format_description_event::{FormatDescriptionEvent, FormatDialect},
    gtid_event::{GtidEvent, LogicalTimestamp},
    previous_gtids_event::PreviousGtidsEvent,
    query_event::{AutoIncrement, Charset, Invoker, QueryEvent, StatusVars, UpdatedDbNames},
    rotate_event::RotateEvent,
    rows_event::{RowsEvent, RowsEventKind, RowsEventRows, RowsEventVersion, UpdatedRow},
    rows_query_event::RowsQueryEvent,
    table_map_event::{TableContext, TableMapEvent},
    xid_event::XidEvent,
};

mod format_description_event;
mod gtid_event;
mod previous_gtids_event;
mod query_event;
mod rotate_event;
mod rows_event;
mod rows_query_event;
mod table_map_event;
mod xid_event;

/// Decoded payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// The event wasn't decoded. Either its type has no parser or parsing failed.
    Raw,
    FormatDescription(FormatDescriptionEvent),
    Query(QueryEvent),
    Rotate(RotateEvent),
    Xid(XidEvent),
    TableMap(TableMapEvent),
    Rows(RowsEvent),
    Gtid(GtidEvent),
    PreviousGtids(PreviousGtidsEvent),
    RowsQuery(RowsQueryEvent),
    Stop,
}

/// A binlog event: the raw frame together with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    raw: RawEvent,
    data: EventData,
}

impl Event {
    pub fn new(raw: RawEvent, data: EventData) -> Self {
        Self { raw, data }
    }

    /// Creates an event that wasn't decoded.
    pub fn raw(raw: RawEvent) -> Self {
        Self::new(raw, EventData::Raw)
    }

    pub fn raw_event(&self) -> &RawEvent {
        &self.raw
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn is_raw(&self) -> bool {
        self.data == EventData::Raw
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.raw.event_type()
    }

    pub fn timestamp(&self) -> u32 {
        self.raw.timestamp()
    }

    pub fn server_id(&self) -> u32 {
        self.raw.server_id()
    }

    /// Position of this event within its source.
    pub fn source_position(&self) -> u64 {
        self.raw.source_position()
    }

    pub fn into_raw(self) -> RawEvent {
        self.raw
    }

    pub fn into_parts(self) -> (RawEvent, EventData) {
        (self.raw, self.data)
    }
}

/// Result of reading a single event.
///
/// An event is always available, `error` is set if something went wrong while
/// decoding it or checking stream continuity. In the latter case the event may be
/// left undecoded (see [`EventData::Raw`]).
#[derive(Debug)]
pub struct DecodedEvent {
    pub event: Event,
    pub error: Option<Error>,
}

impl DecodedEvent {
    pub fn new(event: Event) -> Self {
        Self { event, error: None }
    }

    pub fn with_error(event: Event, error: Error) -> Self {
        Self {
            event,
            error: Some(error),
        }
    }

    /// Attaches `error` unless there already is one.
    pub fn or_error(mut self, error: Error) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into a `Result` dropping the event if there was an error.
    pub fn into_result(self) -> Result<Event, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.event),
        }
    }
}
