// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Wire-level constants of the binary log format.

use std::convert::TryFrom;

/// Binlog event type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum EventType {
    /// Ignored event.
    UNKNOWN_EVENT = 0x00,
    /// Written as the first event in a version 1 or 3 binlog file.
    START_EVENT_V3 = 0x01,
    /// Written when an updating statement is done.
    QUERY_EVENT = 0x02,
    /// Written when mysqld stops.
    STOP_EVENT = 0x03,
    /// Written when mysqld switches to a new binary log file.
    ROTATE_EVENT = 0x04,
    INTVAR_EVENT = 0x05,
    LOAD_EVENT = 0x06,
    SLAVE_EVENT = 0x07,
    CREATE_FILE_EVENT = 0x08,
    APPEND_BLOCK_EVENT = 0x09,
    EXEC_LOAD_EVENT = 0x0a,
    DELETE_FILE_EVENT = 0x0b,
    NEW_LOAD_EVENT = 0x0c,
    RAND_EVENT = 0x0d,
    USER_VAR_EVENT = 0x0e,
    /// A descriptor event that is written to the beginning of a binlog file.
    FORMAT_DESCRIPTION_EVENT = 0x0f,
    /// Generated for a commit of a transaction that modifies one or more tables
    /// of an XA-capable storage engine.
    XID_EVENT = 0x10,
    BEGIN_LOAD_QUERY_EVENT = 0x11,
    EXECUTE_LOAD_QUERY_EVENT = 0x12,
    /// Describes the structure of a table. Precedes row events of that table.
    TABLE_MAP_EVENT = 0x13,
    PRE_GA_WRITE_ROWS_EVENT = 0x14,
    PRE_GA_UPDATE_ROWS_EVENT = 0x15,
    PRE_GA_DELETE_ROWS_EVENT = 0x16,
    WRITE_ROWS_EVENT_V1 = 0x17,
    UPDATE_ROWS_EVENT_V1 = 0x18,
    DELETE_ROWS_EVENT_V1 = 0x19,
    INCIDENT_EVENT = 0x1a,
    /// Sent by a primary to a replica to let it know that the primary is alive.
    HEARTBEAT_EVENT = 0x1b,
    IGNORABLE_EVENT = 0x1c,
    /// Carries the text of the statement that produced the following rows events.
    ROWS_QUERY_EVENT = 0x1d,
    WRITE_ROWS_EVENT = 0x1e,
    UPDATE_ROWS_EVENT = 0x1f,
    DELETE_ROWS_EVENT = 0x20,
    GTID_EVENT = 0x21,
    ANONYMOUS_GTID_EVENT = 0x22,
    PREVIOUS_GTIDS_EVENT = 0x23,
    TRANSACTION_CONTEXT_EVENT = 0x24,
    VIEW_CHANGE_EVENT = 0x25,
    XA_PREPARE_LOG_EVENT = 0x26,
    PARTIAL_UPDATE_ROWS_EVENT = 0x27,
    TRANSACTION_PAYLOAD_EVENT = 0x28,
    HEARTBEAT_LOG_EVENT_V2 = 0x29,
}

impl EventType {
    /// Returns `true` for write, update and delete rows events of both versions.
    pub fn is_rows_event(self) -> bool {
        matches!(
            self,
            EventType::WRITE_ROWS_EVENT_V1
                | EventType::UPDATE_ROWS_EVENT_V1
                | EventType::DELETE_ROWS_EVENT_V1
                | EventType::WRITE_ROWS_EVENT
                | EventType::UPDATE_ROWS_EVENT
                | EventType::DELETE_ROWS_EVENT
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Unknown event type {}", _0)]
#[repr(transparent)]
pub struct UnknownEventType(pub u8);

impl From<UnknownEventType> for u8 {
    fn from(x: UnknownEventType) -> Self {
        x.0
    }
}

impl TryFrom<u8> for EventType {
    type Error = UnknownEventType;

    fn try_from(byte: u8) -> Result<Self, UnknownEventType> {
        use EventType::*;

        const TYPES: [EventType; 42] = [
            UNKNOWN_EVENT,
            START_EVENT_V3,
            QUERY_EVENT,
            STOP_EVENT,
            ROTATE_EVENT,
            INTVAR_EVENT,
            LOAD_EVENT,
            SLAVE_EVENT,
            CREATE_FILE_EVENT,
            APPEND_BLOCK_EVENT,
            EXEC_LOAD_EVENT,
            DELETE_FILE_EVENT,
            NEW_LOAD_EVENT,
            RAND_EVENT,
            USER_VAR_EVENT,
            FORMAT_DESCRIPTION_EVENT,
            XID_EVENT,
            BEGIN_LOAD_QUERY_EVENT,
            EXECUTE_LOAD_QUERY_EVENT,
            TABLE_MAP_EVENT,
            PRE_GA_WRITE_ROWS_EVENT,
            PRE_GA_UPDATE_ROWS_EVENT,
            PRE_GA_DELETE_ROWS_EVENT,
            WRITE_ROWS_EVENT_V1,
            UPDATE_ROWS_EVENT_V1,
            DELETE_ROWS_EVENT_V1,
            INCIDENT_EVENT,
            HEARTBEAT_EVENT,
            IGNORABLE_EVENT,
            ROWS_QUERY_EVENT,
            WRITE_ROWS_EVENT,
            UPDATE_ROWS_EVENT,
            DELETE_ROWS_EVENT,
            GTID_EVENT,
            ANONYMOUS_GTID_EVENT,
            PREVIOUS_GTIDS_EVENT,
            TRANSACTION_CONTEXT_EVENT,
            VIEW_CHANGE_EVENT,
            XA_PREPARE_LOG_EVENT,
            PARTIAL_UPDATE_ROWS_EVENT,
            TRANSACTION_PAYLOAD_EVENT,
            HEARTBEAT_LOG_EVENT_V2,
        ];

        TYPES
            .get(byte as usize)
            .copied()
            .ok_or(UnknownEventType(byte))
    }
}

bitflags::bitflags! {
    /// Binlog event flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u16 {
        /// Gets unset in the `FORMAT_DESCRIPTION_EVENT`
        /// when the file gets closed to detect broken binlogs.
        const LOG_EVENT_BINLOG_IN_USE_F = 0x0001;
        const LOG_EVENT_THREAD_SPECIFIC_F = 0x0004;
        const LOG_EVENT_SUPPRESS_USE_F = 0x0008;
        /// Artificial events are created arbitrarily and not written to binary log.
        const LOG_EVENT_ARTIFICIAL_F = 0x0020;
        /// Events with this flag set are created by slave IO thread and written to relay log.
        const LOG_EVENT_RELAY_LOG_F = 0x0040;
        const LOG_EVENT_IGNORABLE_F = 0x0080;
        const LOG_EVENT_NO_FILTER_F = 0x0100;
        const LOG_EVENT_MTS_ISOLATE_F = 0x0200;
    }
}

bitflags::bitflags! {
    /// Flags of a rows event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RowsEventFlags: u16 {
        /// Last event of a statement.
        const STMT_END = 0x0001;
        const NO_FOREIGN_KEY_CHECKS = 0x0002;
        const RELAXED_UNIQUE_CHECKS = 0x0004;
        /// Indicates that rows in this event are complete,
        /// that is contain values for all columns of the table.
        const COMPLETE_ROWS = 0x0008;
    }
}

/// Enumerates types of binlog checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum BinlogChecksumAlg {
    /// Events are without checksum though its generator is checksum-capable.
    BINLOG_CHECKSUM_ALG_OFF = 0,
    /// CRC32 of zlib algorithm.
    BINLOG_CHECKSUM_ALG_CRC32 = 1,
}

impl BinlogChecksumAlg {
    /// Size of a checksum trailer written with this algorithm.
    pub fn checksum_size(self) -> usize {
        match self {
            BinlogChecksumAlg::BINLOG_CHECKSUM_ALG_OFF => 0,
            BinlogChecksumAlg::BINLOG_CHECKSUM_ALG_CRC32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Unknown checksum algorithm {}", _0)]
#[repr(transparent)]
pub struct UnknownChecksumAlg(pub u8);

impl From<UnknownChecksumAlg> for u8 {
    fn from(x: UnknownChecksumAlg) -> Self {
        x.0
    }
}

impl TryFrom<u8> for BinlogChecksumAlg {
    type Error = UnknownChecksumAlg;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::BINLOG_CHECKSUM_ALG_OFF),
            1 => Ok(Self::BINLOG_CHECKSUM_ALG_CRC32),
            x => Err(UnknownChecksumAlg(x)),
        }
    }
}

/// Type of MySql column field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum ColumnType {
    MYSQL_TYPE_DECIMAL = 0,
    MYSQL_TYPE_TINY,
    MYSQL_TYPE_SHORT,
    MYSQL_TYPE_LONG,
    MYSQL_TYPE_FLOAT,
    MYSQL_TYPE_DOUBLE,
    MYSQL_TYPE_NULL,
    MYSQL_TYPE_TIMESTAMP,
    MYSQL_TYPE_LONGLONG,
    MYSQL_TYPE_INT24,
    MYSQL_TYPE_DATE,
    MYSQL_TYPE_TIME,
    MYSQL_TYPE_DATETIME,
    MYSQL_TYPE_YEAR,
    MYSQL_TYPE_NEWDATE,
    MYSQL_TYPE_VARCHAR,
    MYSQL_TYPE_BIT,
    MYSQL_TYPE_TIMESTAMP2,
    MYSQL_TYPE_DATETIME2,
    MYSQL_TYPE_TIME2,
    MYSQL_TYPE_JSON = 245,
    MYSQL_TYPE_NEWDECIMAL = 246,
    MYSQL_TYPE_ENUM = 247,
    MYSQL_TYPE_SET = 248,
    MYSQL_TYPE_TINY_BLOB = 249,
    MYSQL_TYPE_MEDIUM_BLOB = 250,
    MYSQL_TYPE_LONG_BLOB = 251,
    MYSQL_TYPE_BLOB = 252,
    MYSQL_TYPE_VAR_STRING = 253,
    MYSQL_TYPE_STRING = 254,
    MYSQL_TYPE_GEOMETRY = 255,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Unknown column type {}", _0)]
#[repr(transparent)]
pub struct UnknownColumnType(pub u8);

impl From<UnknownColumnType> for u8 {
    fn from(x: UnknownColumnType) -> Self {
        x.0
    }
}

impl TryFrom<u8> for ColumnType {
    type Error = UnknownColumnType;

    fn try_from(byte: u8) -> Result<Self, UnknownColumnType> {
        use ColumnType::*;

        match byte {
            0x00 => Ok(MYSQL_TYPE_DECIMAL),
            0x01 => Ok(MYSQL_TYPE_TINY),
            0x02 => Ok(MYSQL_TYPE_SHORT),
            0x03 => Ok(MYSQL_TYPE_LONG),
            0x04 => Ok(MYSQL_TYPE_FLOAT),
            0x05 => Ok(MYSQL_TYPE_DOUBLE),
            0x06 => Ok(MYSQL_TYPE_NULL),
            0x07 => Ok(MYSQL_TYPE_TIMESTAMP),
            0x08 => Ok(MYSQL_TYPE_LONGLONG),
            0x09 => Ok(MYSQL_TYPE_INT24),
            0x0a => Ok(MYSQL_TYPE_DATE),
            0x0b => Ok(MYSQL_TYPE_TIME),
            0x0c => Ok(MYSQL_TYPE_DATETIME),
            0x0d => Ok(MYSQL_TYPE_YEAR),
            0x0e => Ok(MYSQL_TYPE_NEWDATE),
            0x0f => Ok(MYSQL_TYPE_VARCHAR),
            0x10 => Ok(MYSQL_TYPE_BIT),
            0x11 => Ok(MYSQL_TYPE_TIMESTAMP2),
            0x12 => Ok(MYSQL_TYPE_DATETIME2),
            0x13 => Ok(MYSQL_TYPE_TIME2),
            0xf5 => Ok(MYSQL_TYPE_JSON),
            0xf6 => Ok(MYSQL_TYPE_NEWDECIMAL),
            0xf7 => Ok(MYSQL_TYPE_ENUM),
            0xf8 => Ok(MYSQL_TYPE_SET),
            0xf9 => Ok(MYSQL_TYPE_TINY_BLOB),
            0xfa => Ok(MYSQL_TYPE_MEDIUM_BLOB),
            0xfb => Ok(MYSQL_TYPE_LONG_BLOB),
            0xfc => Ok(MYSQL_TYPE_BLOB),
            0xfd => Ok(MYSQL_TYPE_VAR_STRING),
            0xfe => Ok(MYSQL_TYPE_STRING),
            0xff => Ok(MYSQL_TYPE_GEOMETRY),
            x => Err(UnknownColumnType(x)),
        }
    }
}

/// Key of a query event status variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum StatusVarKey {
    /// Contains `Flags2`. Value is 4 bytes.
    Flags2 = 0,
    /// Contains `SqlMode`. Value is 8 bytes.
    SqlMode,
    /// Contains values in the following order: length byte, catalog, `\0`.
    Catalog,
    /// Contains `auto_increment_increment` and `auto_increment_offset`, 2 bytes each.
    AutoIncrement,
    /// Contains `character_set_client`, `collation_connection`, `collation_server`,
    /// 2 bytes each.
    Charset,
    /// Contains length byte and `time_zone` value.
    TimeZone,
    /// Contains length byte and catalog name.
    CatalogNz,
    /// Contains `lc_time_names` code. Value is 2 bytes.
    LcTimeNames,
    /// Contains `character_set_database` code. Value is 2 bytes.
    CharsetDatabase,
    /// Contains `table_map_for_update` bitmap. Value is 8 bytes.
    TableMapForUpdate,
    /// Value is 4 bytes.
    MasterDataWritten,
    /// Contains length byte, user name, length byte, host name.
    Invoker,
    /// Contains count byte and that many `\0`-terminated database names.
    UpdatedDbNames,
    /// Contains 3 bytes of microseconds.
    Microseconds,
    CommitTs,
    CommitTs2,
    /// Value is 1 byte.
    ExplicitDefaultsForTimestamp,
    /// Value is 8 bytes.
    DdlLoggedWithXid,
    /// Value is 2 bytes.
    DefaultCollationForUtf8mb4,
    /// Value is 1 byte.
    SqlRequirePrimaryKey,
    /// Value is 1 byte.
    DefaultTableEncryption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Unknown status var key {}", _0)]
#[repr(transparent)]
pub struct UnknownStatusVarKey(pub u8);

impl TryFrom<u8> for StatusVarKey {
    type Error = UnknownStatusVarKey;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use StatusVarKey::*;

        match value {
            0 => Ok(Flags2),
            1 => Ok(SqlMode),
            2 => Ok(Catalog),
            3 => Ok(AutoIncrement),
            4 => Ok(Charset),
            5 => Ok(TimeZone),
            6 => Ok(CatalogNz),
            7 => Ok(LcTimeNames),
            8 => Ok(CharsetDatabase),
            9 => Ok(TableMapForUpdate),
            10 => Ok(MasterDataWritten),
            11 => Ok(Invoker),
            12 => Ok(UpdatedDbNames),
            13 => Ok(Microseconds),
            14 => Ok(CommitTs),
            15 => Ok(CommitTs2),
            16 => Ok(ExplicitDefaultsForTimestamp),
            17 => Ok(DdlLoggedWithXid),
            18 => Ok(DefaultCollationForUtf8mb4),
            19 => Ok(SqlRequirePrimaryKey),
            20 => Ok(DefaultTableEncryption),
            x => Err(UnknownStatusVarKey(x)),
        }
    }
}
