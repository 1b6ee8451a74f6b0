// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Column value decoders driven by table map metadata.

use std::fmt;

use crate::{
    binlog::time::MysqlTime,
    constants::ColumnType,
    error::DecodeError,
    io::ParseBuf,
};

mod decimal;
mod numeric;
mod string;
mod temporal;

/// A decoded column value.
///
/// Integers are returned as unsigned bit patterns, signedness is not known at this layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(u64),
    Float(f32),
    Double(f64),
    /// Strings, blobs, JSON and geometry values.
    Bytes(Vec<u8>),
    Bit(u64),
    /// `DECIMAL` value in its textual form.
    Decimal(String),
    Year(u16),
    /// `TIMESTAMP` value as seconds and microseconds since unix epoch, UTC.
    Timestamp { seconds: u32, micros: u32 },
    Date(MysqlTime),
    DateTime(MysqlTime),
    Time(MysqlTime),
    /// 1-based index of an `ENUM` member.
    Enum(u16),
    /// Bitmask of `SET` members.
    Set(u64),
}

impl Value {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(x) => Some(x),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(x) | Value::Bit(x) | Value::Set(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Bytes(x) => write!(f, "{}", String::from_utf8_lossy(x)),
            Value::Decimal(x) => f.write_str(x),
            Value::Year(x) => write!(f, "{:04}", x),
            Value::Timestamp { seconds, micros } if *micros > 0 => {
                write!(f, "{}.{:06}", seconds, micros)
            }
            Value::Timestamp { seconds, .. } => write!(f, "{}", seconds),
            Value::Date(x) | Value::DateTime(x) | Value::Time(x) => write!(f, "{:.6}", x),
            Value::Enum(x) => write!(f, "{}", x),
        }
    }
}

/// Wire-level decoding rule of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Little-endian integer of 1, 2, 3, 4 or 8 bytes.
    Integer { size: usize },
    Float,
    Double,
    Null,
    Year,
    Timestamp,
    DateTime,
    Date,
    Time,
    Timestamp2 { precision: u8 },
    DateTime2 { precision: u8 },
    Time2 { precision: u8 },
    /// Fixed-size string padded with `\0` up to `max_length`.
    String { max_length: usize },
    /// Variable-size string with a 1 or 2 byte length prefix.
    VarChar { max_length: usize },
    /// Blob with a `length_size`-byte length prefix.
    Blob { length_size: usize },
    Bit { bits: usize },
    NewDecimal { precision: u8, scale: u8 },
    Enum { size: usize },
    Set { size: usize },
    /// A type whose values can't be decoded.
    Unsupported,
}

/// Describes how to decode values of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    column_type: ColumnType,
    nullable: bool,
    kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(column_type: ColumnType, nullable: bool, kind: FieldKind) -> Self {
        Self {
            column_type,
            nullable,
            kind,
        }
    }

    /// Creates a descriptor consuming its metadata (if any) from `meta`.
    pub fn from_metadata(
        column_type: ColumnType,
        nullable: bool,
        meta: &mut ParseBuf<'_>,
    ) -> Result<Self, DecodeError> {
        use ColumnType::*;

        let kind = match column_type {
            MYSQL_TYPE_TINY => FieldKind::Integer { size: 1 },
            MYSQL_TYPE_SHORT => FieldKind::Integer { size: 2 },
            MYSQL_TYPE_INT24 => FieldKind::Integer { size: 3 },
            MYSQL_TYPE_LONG => FieldKind::Integer { size: 4 },
            MYSQL_TYPE_LONGLONG => FieldKind::Integer { size: 8 },
            MYSQL_TYPE_FLOAT => numeric::float_kind(meta)?,
            MYSQL_TYPE_DOUBLE => numeric::double_kind(meta)?,
            MYSQL_TYPE_NULL => FieldKind::Null,
            MYSQL_TYPE_YEAR => FieldKind::Year,
            MYSQL_TYPE_TIMESTAMP => FieldKind::Timestamp,
            MYSQL_TYPE_DATETIME => FieldKind::DateTime,
            MYSQL_TYPE_DATE => FieldKind::Date,
            MYSQL_TYPE_TIME => FieldKind::Time,
            MYSQL_TYPE_TIMESTAMP2 => FieldKind::Timestamp2 {
                precision: temporal::precision(meta)?,
            },
            MYSQL_TYPE_DATETIME2 => FieldKind::DateTime2 {
                precision: temporal::precision(meta)?,
            },
            MYSQL_TYPE_TIME2 => FieldKind::Time2 {
                precision: temporal::precision(meta)?,
            },
            MYSQL_TYPE_VARCHAR => string::varchar_kind(meta)?,
            MYSQL_TYPE_STRING | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_ENUM | MYSQL_TYPE_SET => {
                let (real_type, kind) = string::string_kind(column_type, meta)?;
                return Ok(Self::new(real_type, nullable, kind));
            }
            MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB
            | MYSQL_TYPE_BLOB | MYSQL_TYPE_JSON | MYSQL_TYPE_GEOMETRY => string::blob_kind(meta)?,
            MYSQL_TYPE_BIT => numeric::bit_kind(meta)?,
            MYSQL_TYPE_NEWDECIMAL => decimal::decimal_kind(meta)?,
            MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDATE => FieldKind::Unsupported,
        };

        Ok(Self::new(column_type, nullable, kind))
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Consumes a single non-null value from `buf`.
    pub fn parse_value(&self, buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
        match self.kind {
            FieldKind::Integer { size } => buf.eat_uint_le(size).map(Value::Int),
            FieldKind::Float => numeric::parse_float(buf),
            FieldKind::Double => numeric::parse_double(buf),
            FieldKind::Null => Ok(Value::Null),
            FieldKind::Year => numeric::parse_year(buf),
            FieldKind::Bit { bits } => numeric::parse_bit(buf, bits),
            FieldKind::Timestamp => temporal::parse_timestamp(buf),
            FieldKind::DateTime => temporal::parse_datetime(buf),
            FieldKind::Date => temporal::parse_date(buf),
            FieldKind::Time => temporal::parse_time(buf),
            FieldKind::Timestamp2 { precision } => temporal::parse_timestamp2(buf, precision),
            FieldKind::DateTime2 { precision } => temporal::parse_datetime2(buf, precision),
            FieldKind::Time2 { precision } => temporal::parse_time2(buf, precision),
            FieldKind::String { max_length } => string::parse_string(buf, max_length),
            FieldKind::VarChar { max_length } => string::parse_varchar(buf, max_length),
            FieldKind::Blob { length_size } => string::parse_blob(buf, length_size),
            FieldKind::Enum { size } => buf.eat_uint_le(size).map(|x| Value::Enum(x as u16)),
            FieldKind::Set { size } => buf.eat_uint_le(size).map(Value::Set),
            FieldKind::NewDecimal { precision, scale } => {
                decimal::parse_decimal(buf, precision, scale).map(Value::Decimal)
            }
            FieldKind::Unsupported => Err(DecodeError::UnsupportedColumnType(self.column_type)),
        }
    }
}

/// Field descriptor of a column at a known position within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnDescriptor {
    index: usize,
    field: FieldDescriptor,
}

impl ColumnDescriptor {
    pub fn new(index: usize, field: FieldDescriptor) -> Self {
        Self { index, field }
    }

    /// 0-based position of the column within its table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    pub fn column_type(&self) -> ColumnType {
        self.field.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.field.nullable
    }

    pub fn parse_value(&self, buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
        self.field.parse_value(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(column_type: ColumnType, meta: &[u8]) -> Result<FieldDescriptor, DecodeError> {
        let mut meta = ParseBuf(meta);
        let descriptor = FieldDescriptor::from_metadata(column_type, false, &mut meta)?;
        assert!(meta.is_empty(), "metadata left: {:?}", meta);
        Ok(descriptor)
    }

    #[test]
    fn should_decode_integers() -> Result<(), DecodeError> {
        let cases: &[(ColumnType, &[u8], u64)] = &[
            (ColumnType::MYSQL_TYPE_TINY, b"\xfe", 0xfe),
            (ColumnType::MYSQL_TYPE_SHORT, b"\x01\x02", 0x0201),
            (ColumnType::MYSQL_TYPE_INT24, b"\xff\xff\xff", 0xffffff),
            (ColumnType::MYSQL_TYPE_LONG, b"\x04\x03\x02\x01", 0x01020304),
            (
                ColumnType::MYSQL_TYPE_LONGLONG,
                b"\xff\xff\xff\xff\xff\xff\xff\xff",
                u64::MAX,
            ),
        ];
        for (column_type, bytes, expected) in cases {
            let descriptor = descriptor(*column_type, b"")?;
            let mut buf = ParseBuf(bytes);
            assert_eq!(descriptor.parse_value(&mut buf)?, Value::Int(*expected));
            assert!(buf.is_empty());
        }
        Ok(())
    }

    #[test]
    fn should_not_read_past_the_slice() -> Result<(), DecodeError> {
        let descriptor = descriptor(ColumnType::MYSQL_TYPE_LONGLONG, b"")?;
        let mut buf = ParseBuf(b"\x01\x02\x03");
        assert_eq!(
            descriptor.parse_value(&mut buf),
            Err(DecodeError::NotEnoughBytes {
                needed: 8,
                available: 3
            })
        );
        Ok(())
    }

    #[test]
    fn should_consume_metadata() -> Result<(), DecodeError> {
        let mut meta = ParseBuf(b"\x08\x03\x00\x02");
        let double = FieldDescriptor::from_metadata(ColumnType::MYSQL_TYPE_DOUBLE, true, &mut meta)?;
        assert_eq!(double.kind(), FieldKind::Double);
        assert!(double.is_nullable());
        let long = FieldDescriptor::from_metadata(ColumnType::MYSQL_TYPE_LONG, false, &mut meta)?;
        assert_eq!(long.kind(), FieldKind::Integer { size: 4 });
        let blob = FieldDescriptor::from_metadata(ColumnType::MYSQL_TYPE_BLOB, false, &mut meta)?;
        assert_eq!(blob.kind(), FieldKind::Blob { length_size: 3 });
        assert_eq!(meta.len(), 2);
        Ok(())
    }

    #[test]
    fn unsupported_type_fails_on_value() -> Result<(), DecodeError> {
        let descriptor = descriptor(ColumnType::MYSQL_TYPE_DECIMAL, b"")?;
        assert_eq!(
            descriptor.parse_value(&mut ParseBuf(b"\x00")),
            Err(DecodeError::UnsupportedColumnType(
                ColumnType::MYSQL_TYPE_DECIMAL
            ))
        );
        Ok(())
    }
}
