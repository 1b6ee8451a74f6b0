// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use crate::{error::DecodeError, io::ParseBuf};

use super::{FieldKind, Value};

pub(super) fn float_kind(meta: &mut ParseBuf<'_>) -> Result<FieldKind, DecodeError> {
    match meta.eat_u8()? {
        4 => Ok(FieldKind::Float),
        x => Err(DecodeError::Invalid(format!("invalid FLOAT pack length {}", x))),
    }
}

pub(super) fn double_kind(meta: &mut ParseBuf<'_>) -> Result<FieldKind, DecodeError> {
    match meta.eat_u8()? {
        8 => Ok(FieldKind::Double),
        x => Err(DecodeError::Invalid(format!("invalid DOUBLE pack length {}", x))),
    }
}

/// BIT metadata is the number of bits modulo 8 followed by the number of full bytes.
pub(super) fn bit_kind(meta: &mut ParseBuf<'_>) -> Result<FieldKind, DecodeError> {
    let bits = meta.eat_u8()? as usize;
    let bytes = meta.eat_u8()? as usize;
    let bits = bytes * 8 + bits;
    if bits == 0 || bits > 64 {
        return Err(DecodeError::Invalid(format!("invalid BIT width {}", bits)));
    }
    Ok(FieldKind::Bit { bits })
}

pub(super) fn parse_float(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let bits = buf.eat_u32_le()?;
    Ok(Value::Float(f32::from_bits(bits)))
}

pub(super) fn parse_double(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let bits = buf.eat_u64_le()?;
    Ok(Value::Double(f64::from_bits(bits)))
}

pub(super) fn parse_year(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let year = buf.eat_u8()?;
    Ok(Value::Year(1900 + year as u16))
}

pub(super) fn parse_bit(buf: &mut ParseBuf<'_>, bits: usize) -> Result<Value, DecodeError> {
    buf.eat_uint_be((bits + 7) / 8).map(Value::Bit)
}

#[cfg(test)]
mod tests {
    use crate::{binlog::fields::FieldDescriptor, constants::ColumnType};

    use super::*;

    fn parse(column_type: ColumnType, meta: &[u8], value: &[u8]) -> Result<Value, DecodeError> {
        let descriptor = FieldDescriptor::from_metadata(column_type, false, &mut ParseBuf(meta))?;
        let mut buf = ParseBuf(value);
        let value = descriptor.parse_value(&mut buf)?;
        assert!(buf.is_empty());
        Ok(value)
    }

    #[test]
    fn should_decode_floats() -> Result<(), DecodeError> {
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_FLOAT, &[4], &1.5f32.to_le_bytes())?,
            Value::Float(1.5)
        );
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_DOUBLE, &[8], &(-2.25f64).to_le_bytes())?,
            Value::Double(-2.25)
        );
        assert!(parse(ColumnType::MYSQL_TYPE_FLOAT, &[8], &[0; 8]).is_err());
        assert!(parse(ColumnType::MYSQL_TYPE_DOUBLE, &[4], &[0; 4]).is_err());
        Ok(())
    }

    #[test]
    fn should_decode_year() -> Result<(), DecodeError> {
        assert_eq!(parse(ColumnType::MYSQL_TYPE_YEAR, &[], &[114])?, Value::Year(2014));
        Ok(())
    }

    #[test]
    fn should_decode_bits() -> Result<(), DecodeError> {
        // BIT(12)
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_BIT, &[4, 1], &[0x0a, 0xbc])?,
            Value::Bit(0x0abc)
        );
        // BIT(1)
        assert_eq!(parse(ColumnType::MYSQL_TYPE_BIT, &[1, 0], &[1])?, Value::Bit(1));
        assert!(parse(ColumnType::MYSQL_TYPE_BIT, &[0, 9], &[]).is_err());
        Ok(())
    }
}
