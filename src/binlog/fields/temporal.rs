// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use crate::{
    binlog::time::{make_packed, MysqlTime},
    error::DecodeError,
    io::ParseBuf,
};

use super::Value;

const DATETIMEF_INT_OFS: i64 = 0x80_0000_0000;
const TIMEF_INT_OFS: i64 = 0x80_0000;
const TIMEF_OFS: i64 = 0x8000_0000_0000;

/// Reads fractional seconds precision of a `TIMESTAMP2`, `DATETIME2` or `TIME2` column.
pub(super) fn precision(meta: &mut ParseBuf<'_>) -> Result<u8, DecodeError> {
    match meta.eat_u8()? {
        x @ 0..=6 => Ok(x),
        x => Err(DecodeError::Invalid(format!(
            "invalid fractional seconds precision {}",
            x
        ))),
    }
}

/// Reads the big-endian fractional part of a v2 temporal value as microseconds.
fn parse_frac(buf: &mut ParseBuf<'_>, precision: u8) -> Result<i64, DecodeError> {
    let micros = match precision {
        1 | 2 => buf.eat_uint_be(1)? * 10_000,
        3 | 4 => buf.eat_uint_be(2)? * 100,
        5 | 6 => buf.eat_uint_be(3)?,
        _ => 0,
    };
    Ok(micros as i64)
}

pub(super) fn parse_timestamp(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let seconds = buf.eat_u32_le()?;
    Ok(Value::Timestamp { seconds, micros: 0 })
}

/// Old `DATETIME` is a little-endian `YYYYMMDDhhmmss` number.
pub(super) fn parse_datetime(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let value = buf.eat_u64_le()?;
    Ok(Value::DateTime(MysqlTime::from_datetime_number(value)))
}

pub(super) fn parse_date(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let value = buf.eat_u24_le()?;
    Ok(Value::Date(MysqlTime::date(
        value >> 9,
        (value >> 5) & 0x0f,
        value & 0x1f,
    )))
}

/// Old `TIME` is a signed little-endian `hhmmss` number.
pub(super) fn parse_time(buf: &mut ParseBuf<'_>) -> Result<Value, DecodeError> {
    let value = ((buf.eat_u24_le()? << 8) as i32) >> 8;
    let abs = value.unsigned_abs();
    Ok(Value::Time(MysqlTime::time(
        value < 0,
        abs / 10_000,
        abs / 100 % 100,
        abs % 100,
        0,
    )))
}

pub(super) fn parse_timestamp2(buf: &mut ParseBuf<'_>, precision: u8) -> Result<Value, DecodeError> {
    let mut this = *buf;
    let seconds = this.eat_uint_be(4)? as u32;
    let micros = parse_frac(&mut this, precision)? as u32;
    *buf = this;
    Ok(Value::Timestamp { seconds, micros })
}

pub(super) fn parse_datetime2(buf: &mut ParseBuf<'_>, precision: u8) -> Result<Value, DecodeError> {
    let mut this = *buf;
    let int_part = this.eat_uint_be(5)? as i64 - DATETIMEF_INT_OFS;
    let frac = parse_frac(&mut this, precision)?;
    *buf = this;
    Ok(Value::DateTime(MysqlTime::from_int64_datetime_packed(
        make_packed(int_part, frac),
    )))
}

pub(super) fn parse_time2(buf: &mut ParseBuf<'_>, precision: u8) -> Result<Value, DecodeError> {
    let mut this = *buf;
    let packed = match precision {
        1 | 2 => {
            let mut int_part = this.eat_uint_be(3)? as i64 - TIMEF_INT_OFS;
            let mut frac = this.eat_uint_be(1)? as i64;
            // negative values keep the fractional part in reverse order
            if int_part < 0 && frac != 0 {
                int_part += 1;
                frac -= 0x100;
            }
            make_packed(int_part, frac * 10_000)
        }
        3 | 4 => {
            let mut int_part = this.eat_uint_be(3)? as i64 - TIMEF_INT_OFS;
            let mut frac = this.eat_uint_be(2)? as i64;
            if int_part < 0 && frac != 0 {
                int_part += 1;
                frac -= 0x10000;
            }
            make_packed(int_part, frac * 100)
        }
        5 | 6 => this.eat_uint_be(6)? as i64 - TIMEF_OFS,
        _ => make_packed(this.eat_uint_be(3)? as i64 - TIMEF_INT_OFS, 0),
    };
    *buf = this;
    Ok(Value::Time(MysqlTime::from_int64_time_packed(packed)))
}

#[cfg(test)]
mod tests {
    use crate::{binlog::fields::FieldDescriptor, constants::ColumnType};

    use super::*;

    fn parse(column_type: ColumnType, meta: &[u8], value: &[u8]) -> Result<Value, DecodeError> {
        let descriptor = FieldDescriptor::from_metadata(column_type, false, &mut ParseBuf(meta))?;
        let mut buf = ParseBuf(value);
        let value = descriptor.parse_value(&mut buf)?;
        assert!(buf.is_empty(), "{} bytes left", buf.len());
        Ok(value)
    }

    fn datetime2_int(year: i64, month: i64, day: i64, hour: i64, minute: i64, second: i64) -> [u8; 5] {
        let ymd = ((year * 13 + month) << 5) | day;
        let hms = (hour << 12) | (minute << 6) | second;
        let value = ((ymd << 17) | hms) + DATETIMEF_INT_OFS;
        let bytes = value.to_be_bytes();
        let mut out = [0; 5];
        out.copy_from_slice(&bytes[3..]);
        out
    }

    #[test]
    fn should_decode_datetime2() -> Result<(), DecodeError> {
        let int = datetime2_int(2014, 3, 21, 17, 42, 9);
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_DATETIME2, &[0], &int)?,
            Value::DateTime(MysqlTime::datetime(2014, 3, 21, 17, 42, 9, 0))
        );

        let mut with_frac = int.to_vec();
        with_frac.extend_from_slice(&[0x04, 0xd2]);
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_DATETIME2, &[4], &with_frac)?,
            Value::DateTime(MysqlTime::datetime(2014, 3, 21, 17, 42, 9, 123_400))
        );

        let mut with_frac = int.to_vec();
        with_frac.extend_from_slice(&[0x01, 0xe2, 0x40]);
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_DATETIME2, &[6], &with_frac)?,
            Value::DateTime(MysqlTime::datetime(2014, 3, 21, 17, 42, 9, 123_456))
        );

        assert!(parse(ColumnType::MYSQL_TYPE_DATETIME2, &[1], &int).is_err());
        assert!(parse(ColumnType::MYSQL_TYPE_DATETIME2, &[7], &int).is_err());
        Ok(())
    }

    #[test]
    fn should_decode_timestamp2() -> Result<(), DecodeError> {
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_TIMESTAMP2, &[2], &[0x53, 0x2c, 0x7b, 0xa1, 0x0c])?,
            Value::Timestamp {
                seconds: 0x532c7ba1,
                micros: 120_000
            }
        );
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_TIMESTAMP2, &[0], &[0, 0, 0, 1])?,
            Value::Timestamp {
                seconds: 1,
                micros: 0
            }
        );
        Ok(())
    }

    #[test]
    fn should_decode_old_temporal_types() -> Result<(), DecodeError> {
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_TIMESTAMP, &[], &0x532c7ba1u32.to_le_bytes())?,
            Value::Timestamp {
                seconds: 0x532c7ba1,
                micros: 0
            }
        );
        assert_eq!(
            parse(
                ColumnType::MYSQL_TYPE_DATETIME,
                &[],
                &20_140_321_174_209u64.to_le_bytes()
            )?,
            Value::DateTime(MysqlTime::datetime(2014, 3, 21, 17, 42, 9, 0))
        );
        let date = (2014 << 9) | (3 << 5) | 21u32;
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_DATE, &[], &date.to_le_bytes()[..3])?,
            Value::Date(MysqlTime::date(2014, 3, 21))
        );
        let time = (-174_209i32).to_le_bytes();
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_TIME, &[], &time[..3])?,
            Value::Time(MysqlTime::time(true, 17, 42, 9, 0))
        );
        Ok(())
    }

    #[test]
    fn should_decode_time2() -> Result<(), DecodeError> {
        // 17:42:09
        let hms = (17 << 12) | (42 << 6) | 9;
        let int = ((hms + TIMEF_INT_OFS) as u32).to_be_bytes();
        assert_eq!(
            parse(ColumnType::MYSQL_TYPE_TIME2, &[0], &int[1..])?,
            Value::Time(MysqlTime::time(false, 17, 42, 9, 0))
        );

        // -00:00:01.5 with precision 1
        let packed = -make_packed(1, 500_000);
        let int_part = (packed >> 24) + TIMEF_INT_OFS;
        let frac = ((packed % (1 << 24)) / 10_000) as i8;
        let mut bytes = (int_part as u32).to_be_bytes()[1..].to_vec();
        bytes.push(frac as u8);
        let value = parse(ColumnType::MYSQL_TYPE_TIME2, &[1], &bytes)?;
        assert_eq!(value, Value::Time(MysqlTime::time(true, 0, 0, 1, 500_000)));
        Ok(())
    }
}
