// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Error types shared by every layer of the event pipeline.

use std::io;

use crate::constants::{ColumnType, EventType, UnknownChecksumAlg, UnknownColumnType};

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to interpret the bytes of an otherwise well-framed event.
///
/// A decode error never ends a stream. Readers return it together with the event
/// it was found in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("not enough bytes: needed {needed}, {available} available")]
    NotEnoughBytes { needed: usize, available: usize },
    #[error("{0} extra bytes left after decoding")]
    ExtraBytes(usize),
    #[error("table context not set for table id {0}")]
    TableContextNotSet(u64),
    #[error("table id mismatch: event refers to {event}, context has {context}")]
    TableIdMismatch { event: u64, context: u64 },
    #[error("unrecognized format description dialect ({0} bytes of post-header lengths)")]
    UnrecognizedDialect(usize),
    #[error(transparent)]
    UnknownChecksumAlg(#[from] UnknownChecksumAlg),
    #[error(transparent)]
    UnknownColumnType(#[from] UnknownColumnType),
    #[error("unsupported column type {0:?}")]
    UnsupportedColumnType(ColumnType),
    #[error("unknown query status variable code {0}")]
    UnknownStatusVar(u8),
    #[error("null value in non-nullable column {column} of table {table}")]
    NullInNonNullableColumn { table: String, column: usize },
    #[error("checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("{0}")]
    Invalid(String),
}

impl DecodeError {
    pub(crate) fn invalid<T: Into<String>>(msg: T) -> Self {
        DecodeError::Invalid(msg.into())
    }
}

/// Errors produced by the event readers.
///
/// Variants fall into five groups: transport exhaustion (`NotYetAvailable`,
/// `Exhausted`), structural malformation (`MalformedFrame`, `InvalidMagic`,
/// `UnsupportedBinlogVersion`, `InvalidRelayLog`, `Poisoned`), semantic decode
/// errors (`Decode`, `InvalidRegionSize`, `Server`), continuity errors
/// (`Continuity`, `InvalidRotation`) and open failures (`FailedToOpen`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no more bytes are available right now")]
    NotYetAvailable,
    #[error("byte source is exhausted")]
    Exhausted,
    #[error("malformed frame at {position} in `{source_name}`: {reason}")]
    MalformedFrame {
        source_name: String,
        position: u64,
        reason: String,
    },
    #[error("invalid region size {size} for {region} (frame length {total})")]
    InvalidRegionSize {
        region: &'static str,
        size: usize,
        total: usize,
    },
    #[error("invalid binary log magic marker {0:02x?}")]
    InvalidMagic(Vec<u8>),
    #[error("unsupported binlog format version {0}")]
    UnsupportedBinlogVersion(u8),
    #[error("relay log must start with a format description event, found {0:?}")]
    InvalidRelayLog(EventType),
    #[error("reader is unusable after a malformed frame")]
    Poisoned,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("server error {code} ({state}): {message}")]
    Server {
        code: u16,
        state: String,
        message: String,
    },
    #[error("format description check failed: {0}")]
    Continuity(String),
    #[error("invalid rotation from log file {current} to `{new_log_name}`")]
    InvalidRotation { current: u32, new_log_name: String },
    #[error("failed to open log file {file_num}: {source}")]
    FailedToOpen { file_num: u32, source: io::Error },
    #[error("duplicate parser for {0:?}")]
    DuplicateParser(EventType),
    #[error("invalid reader state: {0}")]
    InvalidState(&'static str),
    #[error("reader is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` if the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NotYetAvailable => true,
            Error::FailedToOpen { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns `true` if the reader that returned this error can't be used anymore.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::MalformedFrame { .. }
                | Error::InvalidMagic(_)
                | Error::UnsupportedBinlogVersion(_)
                | Error::InvalidRelayLog(_)
                | Error::Poisoned
                | Error::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(Error::NotYetAvailable.is_retryable());
        assert!(Error::FailedToOpen {
            file_num: 7,
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        }
        .is_retryable());
        assert!(!Error::FailedToOpen {
            file_num: 7,
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        }
        .is_retryable());
        assert!(!Error::Exhausted.is_retryable());
        assert!(!Error::Decode(DecodeError::ExtraBytes(1)).is_retryable());
    }

    #[test]
    fn fatal_errors() {
        let malformed = Error::MalformedFrame {
            source_name: "bin.000001".into(),
            position: 4,
            reason: "too short".into(),
        };
        assert!(malformed.is_fatal());
        assert!(!malformed.is_retryable());
        assert!(!Error::Continuity("version".into()).is_fatal());
        assert!(!Error::NotYetAvailable.is_fatal());
    }
}
