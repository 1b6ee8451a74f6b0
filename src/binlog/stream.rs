// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Reader of a numbered sequence of log files.
//!
//! Log files are named `<prefix><6 digit number>`. The reader follows rotate and
//! stop events from one file to the next one. Relay logs are read the same way,
//! except that the relay's own format description and rotate events are hidden
//! from the caller.

use std::{
    convert::TryFrom,
    fmt,
    fs::File,
    io::{self, BufReader},
    mem,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    constants::EventType,
    error::{Error, Result},
    source::{ByteSource, ReadSource},
};

use super::{
    events::{DecodedEvent, EventData},
    file::{LogFileEventReader, BINLOG_MAGIC},
    reader::EventReader,
    registry::ParserRegistry,
};

/// Log file numbers wrap around to zero after this one.
pub const MAX_LOG_FILE_NUM: u32 = 999_999;

const LOG_FILE_NUM_DIGITS: usize = 6;

/// Returns the name of a log file with the given number.
pub fn log_file_name(prefix: &str, file_num: u32) -> String {
    format!("{}{:06}", prefix, file_num)
}

/// Number of the log file that follows `file_num`.
fn next_log_file_num(file_num: u32) -> u32 {
    if file_num < MAX_LOG_FILE_NUM {
        file_num + 1
    } else {
        0
    }
}

/// Settings of a [`LogStreamEventReader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStreamConfig {
    /// Directory that contains the log files.
    pub directory: PathBuf,
    /// File name prefix, e.g. `mysql-bin.`.
    pub prefix: String,
    /// Number of the first file to read.
    pub start_file_num: u32,
    /// Whether files are relay logs.
    #[serde(default)]
    pub is_relay: bool,
    /// Whether to verify event checksums.
    #[serde(default)]
    pub verify_checksums: bool,
}

impl LogStreamConfig {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            start_file_num: 0,
            is_relay: false,
            verify_checksums: false,
        }
    }

    pub fn with_start_file_num(mut self, start_file_num: u32) -> Self {
        self.start_file_num = start_file_num;
        self
    }

    pub fn with_relay(mut self, is_relay: bool) -> Self {
        self.is_relay = is_relay;
        self
    }

    pub fn with_verify_checksums(mut self, verify_checksums: bool) -> Self {
        self.verify_checksums = verify_checksums;
        self
    }
}

/// Opens log files by name.
pub trait LogFileOpener {
    fn open(&mut self, directory: &Path, name: &str) -> io::Result<Box<dyn ByteSource>>;
}

/// Opens log files on the local filesystem.
///
/// End of file is reported as "not yet available", so a file that is still being
/// written to may be followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

impl LogFileOpener for FsOpener {
    fn open(&mut self, directory: &Path, name: &str) -> io::Result<Box<dyn ByteSource>> {
        let file = File::open(directory.join(name))?;
        Ok(Box::new(ReadSource::new(BufReader::new(file))))
    }
}

/// Where a rotate event points to.
enum RotationTarget {
    /// Next file of this stream.
    Next(u32),
    /// A file outside of this stream.
    Foreign,
}

/// Reads events from consecutive log files.
///
/// A single [`ParserRegistry`] is shared by all files of the stream, so table
/// contexts and format negotiation carry over a rotation.
pub struct LogStreamEventReader<O = FsOpener> {
    config: LogStreamConfig,
    opener: O,
    reader: Option<LogFileEventReader<Box<dyn ByteSource>>>,
    /// Owned here while no file is open.
    registry: ParserRegistry,
    current_file_num: u32,
    is_new_log_file: bool,
    closed: bool,
}

impl LogStreamEventReader<FsOpener> {
    pub fn new(config: LogStreamConfig) -> Self {
        let registry = ParserRegistry::new();
        Self::with_opener(config, FsOpener, registry)
    }
}

impl<O: LogFileOpener> LogStreamEventReader<O> {
    /// Creates a reader that opens files with `opener` and parses them with `registry`.
    ///
    /// Checksum verification of the registry is overridden by the config.
    pub fn with_opener(config: LogStreamConfig, opener: O, mut registry: ParserRegistry) -> Self {
        registry.set_verify_checksums(config.verify_checksums);
        Self {
            current_file_num: config.start_file_num,
            config,
            opener,
            reader: None,
            registry,
            is_new_log_file: false,
            closed: false,
        }
    }

    pub fn config(&self) -> &LogStreamConfig {
        &self.config
    }

    /// Number of the file being read, or of the file to be opened next.
    pub fn current_file_num(&self) -> u32 {
        self.current_file_num
    }

    pub fn current_file_name(&self) -> String {
        log_file_name(&self.config.prefix, self.current_file_num)
    }

    pub fn registry(&self) -> &ParserRegistry {
        match self.reader {
            Some(ref reader) => reader.registry(),
            None => &self.registry,
        }
    }

    fn log_file_reader(&mut self) -> Result<&mut LogFileEventReader<Box<dyn ByteSource>>> {
        if self.closed {
            return Err(Error::Closed);
        }

        if self.reader.is_none() {
            let name = self.current_file_name();
            let path = self.config.directory.join(&name);
            info!(file = %path.display(), "Opening log file");

            let source = self
                .opener
                .open(&self.config.directory, &name)
                .map_err(|source| Error::FailedToOpen {
                    file_num: self.current_file_num,
                    source,
                })?;
            let registry = mem::take(&mut self.registry);
            self.reader = Some(LogFileEventReader::new(
                source,
                path.to_string_lossy().into_owned(),
                registry,
            ));
            self.is_new_log_file = true;
        }

        self.reader
            .as_mut()
            .ok_or(Error::InvalidState("log file is not open"))
    }

    /// A relay log file must start with a format description event.
    ///
    /// Looks at the type code of the first frame before the file reader gets to
    /// check the binlog format version. Does nothing once the magic marker is consumed.
    fn check_relay_log_start(&mut self) -> Result<()> {
        const TYPE_CODE_OFFSET: usize = BINLOG_MAGIC.len() + 4;

        let header = self
            .log_file_reader()?
            .peek_header_bytes(TYPE_CODE_OFFSET + 1)?;
        if !header.starts_with(BINLOG_MAGIC) {
            return Ok(());
        }
        let type_code = header[TYPE_CODE_OFFSET];
        if type_code != EventType::FORMAT_DESCRIPTION_EVENT as u8 {
            let event_type = EventType::try_from(type_code).unwrap_or(EventType::UNKNOWN_EVENT);
            return Err(Error::InvalidRelayLog(event_type));
        }
        Ok(())
    }

    /// Closes the current file and takes its registry back.
    fn close_log_file(&mut self) -> Result<()> {
        match self.reader.take() {
            Some(mut reader) => {
                let result = reader.close();
                self.registry = reader.into_registry();
                result
            }
            None => Ok(()),
        }
    }

    /// Switches to another file. The file is opened lazily by the next read.
    fn advance(&mut self, next_file_num: u32) -> Result<()> {
        let result = self.close_log_file();
        self.current_file_num = next_file_num;
        result
    }

    fn invalid_rotation(&self, new_log_name: &[u8]) -> Error {
        Error::InvalidRotation {
            current: self.current_file_num,
            new_log_name: String::from_utf8_lossy(new_log_name).into_owned(),
        }
    }

    fn rotation_target(&self, new_log_name: &[u8]) -> Result<RotationTarget> {
        let prefix = self.config.prefix.as_bytes();
        if new_log_name.len() != prefix.len() + LOG_FILE_NUM_DIGITS
            || !new_log_name.starts_with(prefix)
        {
            return Ok(RotationTarget::Foreign);
        }

        let file_num = btoi::btou::<u32>(&new_log_name[prefix.len()..])
            .map_err(|_| self.invalid_rotation(new_log_name))?;
        if file_num != next_log_file_num(self.current_file_num) {
            return Err(self.invalid_rotation(new_log_name));
        }
        Ok(RotationTarget::Next(file_num))
    }
}

impl<O> fmt::Debug for LogStreamEventReader<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStreamEventReader")
            .field("config", &self.config)
            .field("current_file_num", &self.current_file_num)
            .field("is_open", &self.reader.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<O: LogFileOpener> EventReader for LogStreamEventReader<O> {
    fn next_event(&mut self) -> Result<DecodedEvent> {
        loop {
            if self.config.is_relay && (self.reader.is_none() || self.is_new_log_file) {
                self.check_relay_log_start()?;
            }
            let decoded = self.log_file_reader()?.next_event()?;

            if mem::replace(&mut self.is_new_log_file, false) && self.config.is_relay {
                if decoded.error.is_some() {
                    return Ok(decoded);
                }
                match decoded.event.data() {
                    EventData::FormatDescription(_) => continue,
                    _ => {
                        let event_type = decoded
                            .event
                            .event_type()
                            .unwrap_or(EventType::UNKNOWN_EVENT);
                        return Err(Error::InvalidRelayLog(event_type));
                    }
                }
            }

            if !decoded.is_ok() {
                return Ok(decoded);
            }

            let current = self.current_file_name();
            match decoded.event.data() {
                EventData::Rotate(rotate) => {
                    let target = match self.rotation_target(rotate.name_raw()) {
                        Ok(target) => target,
                        Err(err) => return Ok(decoded.or_error(err)),
                    };
                    let next_file_num = match target {
                        RotationTarget::Next(file_num) => file_num,
                        RotationTarget::Foreign if self.config.is_relay => {
                            info!(
                                current = %current,
                                new_log_name = %rotate.name(),
                                "Ignored master's rotate event"
                            );
                            return Ok(decoded);
                        }
                        RotationTarget::Foreign => {
                            let err = self.invalid_rotation(rotate.name_raw());
                            return Ok(decoded.or_error(err));
                        }
                    };

                    info!(
                        current = %current,
                        next = %rotate.name(),
                        "Reached end of log file"
                    );
                    let closed = self.advance(next_file_num);
                    if self.config.is_relay {
                        // The relay's own rotate event is not a part of the replicated stream.
                        closed?;
                        continue;
                    }
                    return Ok(match closed {
                        Ok(()) => decoded,
                        Err(err) => decoded.or_error(err),
                    });
                }
                EventData::Stop => {
                    let next_file_num = next_log_file_num(self.current_file_num);
                    info!(
                        current = %current,
                        next = %log_file_name(&self.config.prefix, next_file_num),
                        "Detected stop event"
                    );
                    return Ok(match self.advance(next_file_num) {
                        Ok(()) => decoded,
                        Err(err) => decoded.or_error(err),
                    });
                }
                _ => return Ok(decoded),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.close_log_file()
    }

    fn peek_header_bytes(&mut self, n: usize) -> Result<&[u8]> {
        self.log_file_reader()?.peek_header_bytes(n)
    }

    fn consume_header_bytes(&mut self, n: usize) -> Result<()> {
        self.log_file_reader()?.consume_header_bytes(n)
    }

    /// Positions are only meaningful within a file, so this is the end position of
    /// the next event of the current file, or zero if no file is open.
    fn next_event_end_position(&self) -> u64 {
        self.reader
            .as_ref()
            .map(|reader| reader.next_event_end_position())
            .unwrap_or(0)
    }
}
