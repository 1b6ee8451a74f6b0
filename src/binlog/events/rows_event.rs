// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::sync::Arc;

use bitvec::prelude::*;

use crate::{
    binlog::{
        fields::ColumnDescriptor, raw::RawEvent, registry::TableRegistry, row::BinlogRow,
    },
    constants::{EventType, RowsEventFlags},
    error::DecodeError,
    io::ParseBuf,
};

use super::TableContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowsEventVersion {
    /// 5.1 to 5.5 rows events.
    V1,
    /// 5.6+ rows events with the extra info block.
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowsEventKind {
    Write,
    Update,
    Delete,
}

impl RowsEventKind {
    fn of(event_type: EventType) -> Option<(Self, RowsEventVersion)> {
        use RowsEventKind::*;
        use RowsEventVersion::*;

        match event_type {
            EventType::WRITE_ROWS_EVENT_V1 => Some((Write, V1)),
            EventType::UPDATE_ROWS_EVENT_V1 => Some((Update, V1)),
            EventType::DELETE_ROWS_EVENT_V1 => Some((Delete, V1)),
            EventType::WRITE_ROWS_EVENT => Some((Write, V2)),
            EventType::UPDATE_ROWS_EVENT => Some((Update, V2)),
            EventType::DELETE_ROWS_EVENT => Some((Delete, V2)),
            _ => None,
        }
    }
}

/// Before and after images of an updated row.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedRow {
    pub before: BinlogRow,
    pub after: BinlogRow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowsEventRows {
    /// Inserted rows.
    Write(Vec<BinlogRow>),
    Update(Vec<UpdatedRow>),
    /// Deleted rows.
    Delete(Vec<BinlogRow>),
}

impl RowsEventRows {
    pub fn len(&self) -> usize {
        match self {
            RowsEventRows::Write(rows) | RowsEventRows::Delete(rows) => rows.len(),
            RowsEventRows::Update(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write, update or delete rows event.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsEvent {
    table_id: u64,
    flags: u16,
    version: RowsEventVersion,
    kind: RowsEventKind,
    extra_info: Vec<u8>,
    width: usize,
    used_columns: Vec<usize>,
    after_image_columns: Option<Vec<usize>>,
    table: Arc<TableContext>,
    rows: RowsEventRows,
}

impl RowsEvent {
    /// Table id and flags.
    pub const POST_HEADER_LEN_V1: usize = 6 + 2;
    /// Table id, flags and extra info length.
    pub const POST_HEADER_LEN_V2: usize = 6 + 2 + 2;

    /// Returns the post-header size of the given rows event type.
    pub fn post_header_len(event_type: EventType) -> Option<usize> {
        RowsEventKind::of(event_type).map(|(_, version)| match version {
            RowsEventVersion::V1 => Self::POST_HEADER_LEN_V1,
            RowsEventVersion::V2 => Self::POST_HEADER_LEN_V2,
        })
    }

    pub fn parse(raw: &RawEvent, tables: &TableRegistry) -> Result<Self, DecodeError> {
        let event_type = raw
            .event_type()
            .ok_or_else(|| DecodeError::invalid("unknown rows event type"))?;
        let (kind, version) = RowsEventKind::of(event_type)
            .ok_or_else(|| DecodeError::Invalid(format!("{:?} is not a rows event", event_type)))?;

        let mut fixed = ParseBuf(raw.fixed_length_data());
        let table_id = fixed.eat_u48_le()?;
        let flags = fixed.eat_u16_le()?;

        let mut buf = ParseBuf(raw.variable_length_data());
        let extra_info = match version {
            RowsEventVersion::V1 => Vec::new(),
            RowsEventVersion::V2 => {
                // the length includes itself
                let len = fixed.eat_u16_le()? as usize;
                let len = len.checked_sub(2).ok_or_else(|| {
                    DecodeError::Invalid(format!("invalid extra info length {}", len))
                })?;
                buf.eat(len)?.to_vec()
            }
        };

        let table = tables
            .get(table_id)
            .ok_or(DecodeError::TableContextNotSet(table_id))?
            .clone();
        if table.table_id() != table_id {
            return Err(DecodeError::TableIdMismatch {
                event: table_id,
                context: table.table_id(),
            });
        }

        let width = buf.eat_lenenc_int()? as usize;
        if width > table.column_count() {
            return Err(DecodeError::Invalid(format!(
                "rows event has {} columns, table `{}` has {}",
                width,
                table.table(),
                table.column_count()
            )));
        }

        let used_columns = read_columns_bitmap(&mut buf, width)?;
        let after_image_columns = if kind == RowsEventKind::Update {
            Some(read_columns_bitmap(&mut buf, width)?)
        } else {
            None
        };

        let before = select_columns(&table, &used_columns);
        let after = after_image_columns
            .as_deref()
            .map(|columns| select_columns(&table, columns));

        // an image without columns occupies no bytes, so no rows can follow it
        let empty_image =
            before.is_empty() || after.as_ref().map_or(false, |after| after.is_empty());
        if empty_image && !buf.is_empty() {
            return Err(DecodeError::ExtraBytes(buf.len()));
        }

        let rows = match kind {
            RowsEventKind::Write | RowsEventKind::Delete => {
                let mut rows = Vec::new();
                while !buf.is_empty() {
                    rows.push(BinlogRow::read(&mut buf, &before, &table)?);
                }
                if kind == RowsEventKind::Write {
                    RowsEventRows::Write(rows)
                } else {
                    RowsEventRows::Delete(rows)
                }
            }
            RowsEventKind::Update => {
                let after = after.unwrap_or_else(|| select_columns(&table, &[]));
                let mut rows = Vec::new();
                while !buf.is_empty() {
                    let before = BinlogRow::read(&mut buf, &before, &table)?;
                    let after = BinlogRow::read(&mut buf, &after, &table)?;
                    rows.push(UpdatedRow { before, after });
                }
                RowsEventRows::Update(rows)
            }
        };

        Ok(Self {
            table_id,
            flags,
            version,
            kind,
            extra_info,
            width,
            used_columns,
            after_image_columns,
            table,
            rows,
        })
    }

    pub fn table_id(&self) -> u64 {
        self.table_id
    }

    /// Returns raw flags value.
    pub fn flags_raw(&self) -> u16 {
        self.flags
    }

    /// Returns known flags, unknown bits are dropped.
    pub fn flags(&self) -> RowsEventFlags {
        RowsEventFlags::from_bits_truncate(self.flags)
    }

    pub fn version(&self) -> RowsEventVersion {
        self.version
    }

    pub fn kind(&self) -> RowsEventKind {
        self.kind
    }

    /// Extra info block of a v2 event (without its length).
    pub fn extra_info(&self) -> &[u8] {
        &self.extra_info
    }

    /// Number of columns the event was written for.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Indexes of the columns present in the (before) image.
    pub fn used_columns(&self) -> &[usize] {
        &self.used_columns
    }

    /// Indexes of the columns present in the after image of an update event.
    pub fn after_image_columns(&self) -> Option<&[usize]> {
        self.after_image_columns.as_deref()
    }

    /// Table context the rows were decoded with.
    pub fn table(&self) -> &Arc<TableContext> {
        &self.table
    }

    pub fn rows(&self) -> &RowsEventRows {
        &self.rows
    }

    pub fn into_rows(self) -> RowsEventRows {
        self.rows
    }
}

/// Reads a bitmap of `width` bits and returns indexes of set bits.
fn read_columns_bitmap(buf: &mut ParseBuf<'_>, width: usize) -> Result<Vec<usize>, DecodeError> {
    let bitmap = buf.eat((width + 7) / 8)?;
    Ok(bitmap.view_bits::<Lsb0>()[..width].iter_ones().collect())
}

fn select_columns(table: &TableContext, indexes: &[usize]) -> Arc<[ColumnDescriptor]> {
    indexes
        .iter()
        .filter_map(|i| table.columns().get(*i).copied())
        .collect()
}
