// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use crate::{constants::ColumnType, error::DecodeError, io::ParseBuf};

use super::{FieldKind, Value};

pub(super) fn varchar_kind(meta: &mut ParseBuf<'_>) -> Result<FieldKind, DecodeError> {
    let max_length = meta.eat_u16_le()? as usize;
    Ok(FieldKind::VarChar { max_length })
}

pub(super) fn blob_kind(meta: &mut ParseBuf<'_>) -> Result<FieldKind, DecodeError> {
    match meta.eat_u8()? {
        x @ 1..=4 => Ok(FieldKind::Blob {
            length_size: x as usize,
        }),
        x => Err(DecodeError::Invalid(format!("invalid blob pack length {}", x))),
    }
}

/// Decodes the two metadata bytes shared by `STRING`, `VAR_STRING`, `ENUM` and `SET`.
///
/// The first byte is the real type. For strings longer than 255 characters the two
/// spare bits of the real type hold bits 8 and 9 of the (inverted) max length.
pub(super) fn string_kind(
    column_type: ColumnType,
    meta: &mut ParseBuf<'_>,
) -> Result<(ColumnType, FieldKind), DecodeError> {
    let b1 = meta.eat_u8()?;
    let b2 = meta.eat_u8()?;

    let (real_type, max_length) = if b1 & 0x30 != 0x30 {
        (b1 | 0x30, b2 as usize | ((((b1 & 0x30) ^ 0x30) as usize) << 4))
    } else {
        (b1, b2 as usize)
    };

    let real_type = match real_type {
        0xf7 => ColumnType::MYSQL_TYPE_ENUM,
        0xf8 => ColumnType::MYSQL_TYPE_SET,
        0xfd => ColumnType::MYSQL_TYPE_VAR_STRING,
        0xfe => ColumnType::MYSQL_TYPE_STRING,
        x => {
            return Err(DecodeError::Invalid(format!(
                "invalid real type {:#04x} of a {:?} column",
                x, column_type
            )))
        }
    };

    if column_type == ColumnType::MYSQL_TYPE_VAR_STRING && real_type != column_type {
        return Err(DecodeError::Invalid(format!(
            "VAR_STRING column with real type {:?}",
            real_type
        )));
    }

    let kind = match real_type {
        ColumnType::MYSQL_TYPE_ENUM => FieldKind::Enum { size: max_length },
        ColumnType::MYSQL_TYPE_SET => FieldKind::Set { size: max_length },
        ColumnType::MYSQL_TYPE_VAR_STRING => FieldKind::VarChar { max_length },
        _ => FieldKind::String { max_length },
    };

    match kind {
        FieldKind::Enum { size } if size != 1 && size != 2 => Err(DecodeError::Invalid(
            format!("invalid ENUM pack length {}", size),
        )),
        FieldKind::Set { size } if size == 0 || size > 8 => Err(DecodeError::Invalid(format!(
            "invalid SET pack length {}",
            size
        ))),
        kind => Ok((real_type, kind)),
    }
}

fn length_prefix_size(max_length: usize) -> usize {
    if max_length < 256 {
        1
    } else {
        2
    }
}

pub(super) fn parse_varchar(
    buf: &mut ParseBuf<'_>,
    max_length: usize,
) -> Result<Value, DecodeError> {
    parse_blob(buf, length_prefix_size(max_length))
}

pub(super) fn parse_string(buf: &mut ParseBuf<'_>, max_length: usize) -> Result<Value, DecodeError> {
    let mut this = *buf;
    let len = this.eat_uint_le(length_prefix_size(max_length))? as usize;
    if len > max_length {
        return Err(DecodeError::Invalid(format!(
            "string of {} bytes exceeds max length {}",
            len, max_length
        )));
    }
    let mut value = this.eat(len)?.to_vec();
    value.resize(max_length, 0);
    *buf = this;
    Ok(Value::Bytes(value))
}

pub(super) fn parse_blob(buf: &mut ParseBuf<'_>, length_size: usize) -> Result<Value, DecodeError> {
    let mut this = *buf;
    let len = this.eat_uint_le(length_size)? as usize;
    let value = this.eat(len)?.to_vec();
    *buf = this;
    Ok(Value::Bytes(value))
}
