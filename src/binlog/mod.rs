// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Binlog events and readers. This implementation assumes binlog version 4
//! (MySql >= 5.0.0).
//!
//! Reading is layered:
//!
//! * [`reader::RawEventReader`] splits a byte source into raw frames,
//!   [`reader::PacketEventReader`] does the same for a replication connection;
//! * [`parsed::ParsedEventReader`] decodes frames with a [`registry::ParserRegistry`];
//! * [`file::LogFileEventReader`] reads a single log file;
//! * [`stream::LogStreamEventReader`] follows a sequence of log files.
//!
//! Every layer implements [`reader::EventReader`].

pub mod events;
pub mod fields;
pub mod file;
pub mod gtid;
pub mod parsed;
pub mod raw;
pub mod reader;
pub mod registry;
pub mod row;
pub mod stream;
pub mod time;

#[cfg(test)]
pub(crate) mod test_utils;

pub use self::{
    events::{DecodedEvent, Event, EventData},
    file::LogFileEventReader,
    parsed::ParsedEventReader,
    raw::{BinlogEventHeader, RawEvent},
    reader::{EventReader, PacketEventReader, RawEventReader},
    registry::{Parser, ParserRegistry, TableRegistry},
    stream::{LogStreamConfig, LogStreamEventReader},
};
