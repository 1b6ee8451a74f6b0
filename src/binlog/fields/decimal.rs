// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::fmt::Write;

use crate::{error::DecodeError, io::ParseBuf};

use super::FieldKind;

const DIG_PER_DEC: usize = 9;
const DIG2BYTES: [usize; DIG_PER_DEC + 1] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];

pub(super) fn decimal_kind(meta: &mut ParseBuf<'_>) -> Result<FieldKind, DecodeError> {
    let precision = meta.eat_u8()?;
    let scale = meta.eat_u8()?;
    if precision == 0 || scale > precision {
        return Err(DecodeError::Invalid(format!(
            "invalid DECIMAL({},{})",
            precision, scale
        )));
    }
    Ok(FieldKind::NewDecimal { precision, scale })
}

/// Binary size of a `DECIMAL(precision, scale)` value.
pub fn decimal_bin_size(precision: u8, scale: u8) -> usize {
    let intg = (precision - scale) as usize;
    let frac = scale as usize;
    (intg / DIG_PER_DEC) * 4
        + DIG2BYTES[intg % DIG_PER_DEC]
        + (frac / DIG_PER_DEC) * 4
        + DIG2BYTES[frac % DIG_PER_DEC]
}

/// Decodes the binary `DECIMAL` representation into its textual form.
///
/// Digits are stored in big-endian groups of nine, the sign is the inverted top bit
/// and negative values have all bits inverted.
pub(super) fn parse_decimal(
    buf: &mut ParseBuf<'_>,
    precision: u8,
    scale: u8,
) -> Result<String, DecodeError> {
    if precision == 0 || scale > precision {
        return Err(DecodeError::Invalid(format!(
            "invalid DECIMAL({},{})",
            precision, scale
        )));
    }

    let intg = (precision - scale) as usize;
    let frac = scale as usize;

    let mut bytes = buf.eat(decimal_bin_size(precision, scale))?.to_vec();
    let negative = bytes[0] & 0x80 == 0;
    bytes[0] ^= 0x80;
    if negative {
        bytes.iter_mut().for_each(|x| *x = !*x);
    }

    let mut digits = ParseBuf(&bytes);
    let mut int_part = String::new();
    let lead = intg % DIG_PER_DEC;
    if lead > 0 {
        let _ = write!(int_part, "{}", digits.eat_uint_be(DIG2BYTES[lead])?);
    }
    for _ in 0..intg / DIG_PER_DEC {
        let _ = write!(int_part, "{:09}", digits.eat_uint_be(4)?);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    match int_part.trim_start_matches('0') {
        "" => out.push('0'),
        x => out.push_str(x),
    }

    if frac > 0 {
        out.push('.');
        for _ in 0..frac / DIG_PER_DEC {
            let _ = write!(out, "{:09}", digits.eat_uint_be(4)?);
        }
        let tail = frac % DIG_PER_DEC;
        if tail > 0 {
            let _ = write!(
                out,
                "{:0width$}",
                digits.eat_uint_be(DIG2BYTES[tail])?,
                width = tail
            );
        }
    }

    Ok(out)
}
