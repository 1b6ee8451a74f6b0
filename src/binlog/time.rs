// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{
    cmp::min,
    fmt::{self, Write},
};

/// Kind of a temporal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum MysqlTimestampType {
    MYSQL_TIMESTAMP_DATE,
    MYSQL_TIMESTAMP_DATETIME,
    MYSQL_TIMESTAMP_TIME,
}

/// Broken-down temporal value as stored by the server.
///
/// Zero dates (`0000-00-00`) are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MysqlTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// microseconds
    pub second_part: u32,
    pub neg: bool,
    pub time_type: MysqlTimestampType,
}

const PACKED_FRAC_BITS: i64 = 24;

fn packed_int_part(packed: i64) -> i64 {
    packed >> PACKED_FRAC_BITS
}

fn packed_frac_part(packed: i64) -> i64 {
    packed % (1 << PACKED_FRAC_BITS)
}

/// Builds packed numeric representation from integer and fractional parts.
pub(crate) fn make_packed(int_part: i64, frac_part: i64) -> i64 {
    (int_part << PACKED_FRAC_BITS) + frac_part
}

impl MysqlTime {
    pub fn date(year: u32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            second_part: 0,
            neg: false,
            time_type: MysqlTimestampType::MYSQL_TIMESTAMP_DATE,
        }
    }

    pub fn datetime(
        year: u32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        second_part: u32,
    ) -> Self {
        Self {
            hour,
            minute,
            second,
            second_part,
            time_type: MysqlTimestampType::MYSQL_TIMESTAMP_DATETIME,
            ..Self::date(year, month, day)
        }
    }

    pub fn time(neg: bool, hour: u32, minute: u32, second: u32, second_part: u32) -> Self {
        Self {
            hour,
            minute,
            second,
            second_part,
            neg,
            time_type: MysqlTimestampType::MYSQL_TIMESTAMP_TIME,
            ..Self::date(0, 0, 0)
        }
    }

    /// Convert time packed numeric representation to [`MysqlTime`].
    pub fn from_int64_time_packed(mut packed_value: i64) -> Self {
        let neg = packed_value < 0;
        if neg {
            packed_value = -packed_value
        }

        let hms = packed_int_part(packed_value);

        let hour = (hms >> 12) as u32 % (1 << 10); /* 10 bits starting at 12th */
        let minute = (hms >> 6) as u32 % (1 << 6); /* 6 bits starting at 6th   */
        let second = hms as u32 % (1 << 6); /* 6 bits starting at 0th   */
        let second_part = packed_frac_part(packed_value);

        Self::time(neg, hour, minute, second, second_part as u32)
    }

    /// Convert packed numeric datetime representation to [`MysqlTime`].
    pub fn from_int64_datetime_packed(mut packed_value: i64) -> Self {
        let neg = packed_value < 0;
        if neg {
            packed_value = -packed_value
        }

        let second_part = packed_frac_part(packed_value);
        let ymdhms = packed_int_part(packed_value);

        let ymd = ymdhms >> 17;
        let ym = ymd >> 5;
        let hms = ymdhms % (1 << 17);

        let day = ymd % (1 << 5);
        let month = ym % 13;
        let year = ym / 13;

        let second = hms % (1 << 6);
        let minute = (hms >> 6) % (1 << 6);
        let hour = hms >> 12;

        let mut this = Self::datetime(
            year as u32,
            month as u32,
            day as u32,
            hour as u32,
            minute as u32,
            second as u32,
            second_part as u32,
        );
        this.neg = neg;
        this
    }

    /// Converts a `YYYYMMDDhhmmss` decimal number.
    pub fn from_datetime_number(value: u64) -> Self {
        let date = value / 1_000_000;
        let time = value % 1_000_000;
        Self::datetime(
            (date / 10_000) as u32,
            (date / 100 % 100) as u32,
            (date % 100) as u32,
            (time / 10_000) as u32,
            (time / 100 % 100) as u32,
            (time % 100) as u32,
            0,
        )
    }

    /// Converts to `chrono::NaiveDateTime`. Returns `None` for zero or invalid dates
    /// and for time values.
    #[cfg(feature = "chrono")]
    pub fn to_naive_datetime(&self) -> Option<chrono::NaiveDateTime> {
        if self.time_type == MysqlTimestampType::MYSQL_TIMESTAMP_TIME {
            return None;
        }
        chrono::NaiveDate::from_ymd_opt(self.year as i32, self.month, self.day)?
            .and_hms_micro_opt(self.hour, self.minute, self.second, self.second_part)
    }

    /// Converts a non-negative time of day to `chrono::NaiveTime`.
    #[cfg(feature = "chrono")]
    pub fn to_naive_time(&self) -> Option<chrono::NaiveTime> {
        if self.neg {
            return None;
        }
        chrono::NaiveTime::from_hms_micro_opt(self.hour, self.minute, self.second, self.second_part)
    }
}

impl fmt::Display for MysqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time_type {
            MysqlTimestampType::MYSQL_TIMESTAMP_DATETIME => {
                format_date(self, f)?;
                f.write_char(' ')?;
                write!(
                    f,
                    "{:02}:{:02}:{:02}",
                    trim_two_digits(self.hour),
                    trim_two_digits(self.minute),
                    trim_two_digits(self.second),
                )?;
                format_useconds(self.second_part, f)
            }
            MysqlTimestampType::MYSQL_TIMESTAMP_DATE => format_date(self, f),
            MysqlTimestampType::MYSQL_TIMESTAMP_TIME => {
                if self.neg {
                    f.write_char('-')?;
                }
                write!(
                    f,
                    "{:02}:{:02}:{:02}",
                    self.hour,
                    trim_two_digits(self.minute),
                    trim_two_digits(self.second),
                )?;
                format_useconds(self.second_part, f)
            }
        }
    }
}

fn trim_two_digits(value: u32) -> u32 {
    if value >= 100 {
        0
    } else {
        value
    }
}

/// Formats a date value as 'YYYY-MM-DD'.
fn format_date(time: &MysqlTime, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "{:02}{:02}-{:02}-{:02}",
        trim_two_digits(time.year / 100),
        trim_two_digits(time.year % 100),
        trim_two_digits(time.month),
        trim_two_digits(time.day),
    )
}

/// Only formats useconds if formatter precision is given (will be truncated to 6)
fn format_useconds(mut useconds: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let dec = match f.precision().map(|x| min(x, 6)) {
        Some(dec) if dec > 0 => dec,
        _ => return Ok(()),
    };

    useconds %= 1_000_000;

    for _ in 0..(6 - dec) {
        useconds /= 10;
    }

    write!(f, ".{:0width$}", useconds, width = dec)
}
