// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Builders of hand-made binlog frames and files.

use crate::constants::EventType;

use super::{gtid::Sid, raw::BinlogEventHeader};

pub const SERVER_ID: u32 = 1;
pub const TIMESTAMP: u32 = 1_600_000_000;

/// Serializes an event with the given body. The checksum (if any) is part of `body`.
pub fn frame(event_type: EventType, next_pos: u32, body: &[u8]) -> Vec<u8> {
    frame_with(event_type as u8, TIMESTAMP, next_pos, 0, body)
}

pub fn frame_with(type_code: u8, timestamp: u32, next_pos: u32, flags: u16, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(BinlogEventHeader::LEN + body.len());
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    bytes.push(type_code);
    bytes.extend_from_slice(&SERVER_ID.to_le_bytes());
    bytes.extend_from_slice(&((BinlogEventHeader::LEN + body.len()) as u32).to_le_bytes());
    bytes.extend_from_slice(&next_pos.to_le_bytes());
    bytes.extend_from_slice(&flags.to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// Appends CRC32 checksum to a serialized event fixing its size.
pub fn with_checksum(mut frame: Vec<u8>) -> Vec<u8> {
    let size = frame.len() as u32 + 4;
    frame[9..13].copy_from_slice(&size.to_le_bytes());
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

fn server_version(version: &str) -> Vec<u8> {
    let mut bytes = version.as_bytes().to_vec();
    bytes.resize(50, 0);
    bytes
}

/// Format description event of 5.5 (no checksum support).
pub fn fde55_body() -> Vec<u8> {
    let mut body = vec![4, 0];
    body.extend(server_version("5.5.34-32.0-log"));
    body.extend_from_slice(&[0, 0, 0, 0, 19]);
    body.extend_from_slice(&[
        56, 13, 0, 8, 0, 18, 0, 4, 4, 4, 4, 18, 0, 0, 84, 0, 4, 26, 8, 0, 0, 0, 8, 8, 8, 2, 0,
    ]);
    body
}

/// Format description event of 5.6 with the given checksum algorithm and a dummy
/// checksum.
pub fn fde56_body(alg: u8) -> Vec<u8> {
    let mut body = vec![4, 0];
    body.extend(server_version("5.6.15-63.0-log"));
    body.extend_from_slice(&[0, 0, 0, 0, 19]);
    body.extend_from_slice(&[
        56, 13, 0, 8, 0, 18, 0, 4, 4, 4, 4, 18, 0, 0, 92, 0, 4, 26, 8, 0, 0, 0, 8, 8, 8, 2, 0, 0,
        0, 10, 10, 10, 25, 25, 0,
    ]);
    body.push(alg);
    body.extend_from_slice(&[40, 216, 52, 169]);
    body
}

pub fn query_body(thread_id: u32, status_vars: &[u8], schema: &[u8], query: &[u8]) -> Vec<u8> {
    let mut body = thread_id.to_le_bytes().to_vec();
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(schema.len() as u8);
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&(status_vars.len() as u16).to_le_bytes());
    body.extend_from_slice(status_vars);
    body.extend_from_slice(schema);
    body.push(0);
    body.extend_from_slice(query);
    body
}

pub fn rotate_body(position: u64, name: &str) -> Vec<u8> {
    let mut body = position.to_le_bytes().to_vec();
    body.extend_from_slice(name.as_bytes());
    body
}

pub fn gtid_body(commit: bool, sid: &Sid, gno: u64) -> Vec<u8> {
    let mut body = vec![commit as u8];
    body.extend_from_slice(sid.as_bytes());
    body.extend_from_slice(&gno.to_le_bytes());
    body
}

pub fn table_map_body(
    table_id: u64,
    database: &[u8],
    table: &[u8],
    column_types: &[u8],
    metadata: &[u8],
    null_bitmap: &[u8],
) -> Vec<u8> {
    let mut body = table_id.to_le_bytes()[..6].to_vec();
    body.extend_from_slice(&[0, 0]);
    body.push(database.len() as u8);
    body.extend_from_slice(database);
    body.push(0);
    body.push(table.len() as u8);
    body.extend_from_slice(table);
    body.push(0);
    body.push(column_types.len() as u8);
    body.extend_from_slice(column_types);
    body.push(metadata.len() as u8);
    body.extend_from_slice(metadata);
    body.extend_from_slice(null_bitmap);
    body
}

/// Rows event body. `extra_info` is `Some` for v2 events.
pub fn rows_body(
    table_id: u64,
    extra_info: Option<&[u8]>,
    width: u8,
    columns: &[u8],
    after_image_columns: Option<&[u8]>,
    rows: &[u8],
) -> Vec<u8> {
    let mut body = table_id.to_le_bytes()[..6].to_vec();
    body.extend_from_slice(&1u16.to_le_bytes());
    if let Some(extra_info) = extra_info {
        body.extend_from_slice(&(extra_info.len() as u16 + 2).to_le_bytes());
        body.extend_from_slice(extra_info);
    }
    body.push(width);
    body.extend_from_slice(columns);
    if let Some(after_image_columns) = after_image_columns {
        body.extend_from_slice(after_image_columns);
    }
    body.extend_from_slice(rows);
    body
}

/// Builds the contents of a binlog file event by event.
#[derive(Debug, Clone)]
pub struct LogFileBuilder {
    bytes: Vec<u8>,
    checksum: bool,
}

impl LogFileBuilder {
    pub const MAGIC: &'static [u8] = b"\xfebin";

    /// Starts a file with a 5.5 format description event.
    pub fn mysql55() -> Self {
        let mut builder = Self {
            bytes: Self::MAGIC.to_vec(),
            checksum: false,
        };
        builder.event(EventType::FORMAT_DESCRIPTION_EVENT, &fde55_body());
        builder
    }

    /// Starts a file with a 5.6 format description event and CRC32 checksums.
    pub fn mysql56() -> Self {
        let mut body = fde56_body(1);
        body.truncate(body.len() - 4);
        let mut builder = Self {
            bytes: Self::MAGIC.to_vec(),
            checksum: true,
        };
        builder.event(EventType::FORMAT_DESCRIPTION_EVENT, &body);
        builder
    }

    /// Starts a file without magic and format description event.
    pub fn bare() -> Self {
        Self {
            bytes: Vec::new(),
            checksum: false,
        }
    }

    /// Current file length which is also the position of the next event.
    pub fn position(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Appends an event, followed by its checksum in a checksum-enabled file.
    pub fn event(&mut self, event_type: EventType, body: &[u8]) -> &mut Self {
        let checksum = self.checksum;
        let extra = if checksum { 4 } else { 0 };
        let next_pos = self.bytes.len() + BinlogEventHeader::LEN + body.len() + extra;
        let frame = frame(event_type, next_pos as u32, body);
        if checksum {
            self.bytes.extend(with_checksum(frame));
        } else {
            self.bytes.extend(frame);
        }
        self
    }

    pub fn query(&mut self, query: &str) -> &mut Self {
        self.event(
            EventType::QUERY_EVENT,
            &query_body(1, &[], b"db", query.as_bytes()),
        )
    }

    pub fn xid(&mut self, xid: u64) -> &mut Self {
        self.event(EventType::XID_EVENT, &xid.to_le_bytes())
    }

    pub fn rotate(&mut self, name: &str) -> &mut Self {
        self.event(EventType::ROTATE_EVENT, &rotate_body(4, name))
    }

    pub fn stop(&mut self) -> &mut Self {
        self.event(EventType::STOP_EVENT, &[])
    }

    pub fn fde55(&mut self) -> &mut Self {
        self.event(EventType::FORMAT_DESCRIPTION_EVENT, &fde55_body())
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}
