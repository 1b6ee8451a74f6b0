// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{borrow::Cow, convert::TryFrom, sync::Arc};

use bitvec::prelude::*;

use crate::{
    binlog::{
        fields::{ColumnDescriptor, FieldDescriptor},
        raw::RawEvent,
    },
    constants::ColumnType,
    error::DecodeError,
    io::ParseBuf,
};

/// Optional metadata field holding column names (MySQL 8.0 with
/// `binlog_row_metadata=FULL`).
const OPTIONAL_METADATA_COLUMN_NAME: u8 = 4;

/// Schema of a single table as described by a table map event.
///
/// Rows events refer to it by table id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableContext {
    table_id: u64,
    flags: u16,
    database: Vec<u8>,
    table: Vec<u8>,
    columns: Arc<[ColumnDescriptor]>,
    column_names: Option<Vec<Vec<u8>>>,
    optional_metadata: Vec<u8>,
}

impl TableContext {
    pub fn new(
        table_id: u64,
        flags: u16,
        database: impl Into<Vec<u8>>,
        table: impl Into<Vec<u8>>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        Self {
            table_id,
            flags,
            database: database.into(),
            table: table.into(),
            columns: columns.into(),
            column_names: None,
            optional_metadata: Vec::new(),
        }
    }

    /// The number that identifies the table. Valid range is `[0, 1 << 48)`.
    pub fn table_id(&self) -> u64 {
        self.table_id
    }

    /// Reserved, currently always `0`.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn database_raw(&self) -> &[u8] {
        &self.database
    }

    /// Returns the database name as a string (lossy converted).
    pub fn database(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.database)
    }

    pub fn table_raw(&self) -> &[u8] {
        &self.table
    }

    /// Returns the table name as a string (lossy converted).
    pub fn table(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.table)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn columns_arc(&self) -> Arc<[ColumnDescriptor]> {
        self.columns.clone()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names if the server logged them.
    pub fn column_names(&self) -> Option<&[Vec<u8>]> {
        self.column_names.as_deref()
    }

    /// Returns the name of a column, if known.
    pub fn column_name(&self, index: usize) -> Option<Cow<'_, str>> {
        self.column_names
            .as_ref()
            .and_then(|names| names.get(index))
            .map(|name| String::from_utf8_lossy(name))
    }

    /// Undecoded optional metadata block.
    pub fn optional_metadata(&self) -> &[u8] {
        &self.optional_metadata
    }
}

/// In row-based mode, every rows event is preceded by a table map event which maps
/// a table definition to a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableMapEvent {
    context: Arc<TableContext>,
}

impl TableMapEvent {
    /// 6-byte table id and 2-byte flags.
    pub const POST_HEADER_LEN: usize = 6 + 2;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        let mut fixed = ParseBuf(raw.fixed_length_data());
        let table_id = fixed.eat_u48_le()?;
        let flags = fixed.eat_u16_le()?;

        let mut buf = ParseBuf(raw.variable_length_data());
        let database = buf.eat_u8_str()?.to_vec();
        if buf.eat_u8()? != 0 {
            return Err(DecodeError::invalid("database name is not null-terminated"));
        }
        let table = buf.eat_u8_str()?.to_vec();
        if buf.eat_u8()? != 0 {
            return Err(DecodeError::invalid("table name is not null-terminated"));
        }

        let column_count = buf.eat_lenenc_int()? as usize;
        let column_types = buf.eat(column_count)?;
        let mut metadata = ParseBuf(buf.eat_lenenc_str()?);
        let null_bitmap = buf.eat((column_count + 7) / 8)?;
        let null_bitmap = null_bitmap.view_bits::<Lsb0>();

        let mut columns = Vec::with_capacity(column_count);
        for (index, column_type) in column_types.iter().enumerate() {
            let column_type = ColumnType::try_from(*column_type)?;
            let field =
                FieldDescriptor::from_metadata(column_type, null_bitmap[index], &mut metadata)?;
            columns.push(ColumnDescriptor::new(index, field));
        }
        if !metadata.is_empty() {
            return Err(DecodeError::ExtraBytes(metadata.len()));
        }

        let optional_metadata = buf.eat_all().to_vec();
        let column_names = parse_column_names(&optional_metadata)?;

        Ok(Self {
            context: Arc::new(TableContext {
                table_id,
                flags,
                database,
                table,
                columns: columns.into(),
                column_names,
                optional_metadata,
            }),
        })
    }

    pub fn context(&self) -> &Arc<TableContext> {
        &self.context
    }

    pub fn into_context(self) -> Arc<TableContext> {
        self.context
    }

    pub fn table_id(&self) -> u64 {
        self.context.table_id
    }
}

/// Walks the type-length-value optional metadata looking for column names.
fn parse_column_names(optional_metadata: &[u8]) -> Result<Option<Vec<Vec<u8>>>, DecodeError> {
    let mut buf = ParseBuf(optional_metadata);
    while !buf.is_empty() {
        let field_type = buf.eat_u8()?;
        let value = buf.eat_lenenc_str()?;
        if field_type == OPTIONAL_METADATA_COLUMN_NAME {
            let mut value = ParseBuf(value);
            let mut names = Vec::new();
            while !value.is_empty() {
                names.push(value.eat_lenenc_str()?.to_vec());
            }
            return Ok(Some(names));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use crate::{
        binlog::{
            fields::FieldKind,
            test_utils::{frame, table_map_body},
        },
        constants::{ColumnType, EventType},
    };

    use super::*;

    fn raw_table_map(body: &[u8]) -> RawEvent {
        let mut raw = RawEvent::new("table_map".into(), 0, frame(EventType::TABLE_MAP_EVENT, 0, body))
            .unwrap();
        raw.set_fixed_length_data_size(TableMapEvent::POST_HEADER_LEN).unwrap();
        raw
    }

    #[test]
    fn should_parse_table_map() -> Result<(), DecodeError> {
        let body = table_map_body(
            0x0102_0304_0506,
            b"shop",
            b"orders",
            &[
                ColumnType::MYSQL_TYPE_LONG as u8,
                ColumnType::MYSQL_TYPE_VARCHAR as u8,
                ColumnType::MYSQL_TYPE_DATETIME2 as u8,
            ],
            &[0x2c, 0x01, 0x03],
            &[0b110],
        );
        let event = TableMapEvent::parse(&raw_table_map(&body))?;
        let context = event.context();

        assert_eq!(context.table_id(), 0x0102_0304_0506);
        assert_eq!(context.database(), "shop");
        assert_eq!(context.table(), "orders");
        assert_eq!(context.column_count(), 3);

        let columns = context.columns();
        assert_eq!(columns[0].field().kind(), FieldKind::Integer { size: 4 });
        assert!(!columns[0].is_nullable());
        assert_eq!(
            columns[1].field().kind(),
            FieldKind::VarChar { max_length: 300 }
        );
        assert!(columns[1].is_nullable());
        assert_eq!(columns[2].field().kind(), FieldKind::DateTime2 { precision: 3 });
        assert_eq!(columns[2].index(), 2);
        assert!(context.column_names().is_none());
        Ok(())
    }

    #[test]
    fn should_parse_column_names() -> Result<(), DecodeError> {
        let mut body = table_map_body(
            1,
            b"db",
            b"t",
            &[ColumnType::MYSQL_TYPE_TINY as u8, ColumnType::MYSQL_TYPE_TINY as u8],
            &[],
            &[0],
        );
        // signedness followed by column names
        body.extend_from_slice(&[1, 1, 0b1000_0000]);
        body.extend_from_slice(&[4, 6, 2, b'i', b'd', 2, b'v', b'l']);

        let event = TableMapEvent::parse(&raw_table_map(&body))?;
        assert_eq!(event.context().column_name(0).as_deref(), Some("id"));
        assert_eq!(event.context().column_name(1).as_deref(), Some("vl"));
        assert_eq!(event.context().optional_metadata().len(), 11);
        Ok(())
    }

    #[test]
    fn should_reject_leftover_metadata() {
        let body = table_map_body(1, b"db", b"t", &[ColumnType::MYSQL_TYPE_LONG as u8], &[0], &[0]);
        assert_eq!(
            TableMapEvent::parse(&raw_table_map(&body)),
            Err(DecodeError::ExtraBytes(1))
        );
    }

    #[test]
    fn should_reject_unknown_column_type() {
        let body = table_map_body(1, b"db", b"t", &[100], &[], &[0]);
        assert!(matches!(
            TableMapEvent::parse(&raw_table_map(&body)),
            Err(DecodeError::UnknownColumnType(_))
        ));
    }
}
