// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use byteorder::{BigEndian as BE, ByteOrder, LittleEndian as LE};

use crate::error::DecodeError;

/// Cursor over a borrowed byte slice.
///
/// Every `eat_*` method either consumes exactly the bytes it needs or fails with
/// [`DecodeError::NotEnoughBytes`] leaving the cursor untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ParseBuf<'a>(pub &'a [u8]);

impl<'a> ParseBuf<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails if there are less than `n` bytes left.
    pub fn ensure(&self, n: usize) -> Result<(), DecodeError> {
        if self.0.len() < n {
            Err(DecodeError::NotEnoughBytes {
                needed: n,
                available: self.0.len(),
            })
        } else {
            Ok(())
        }
    }

    /// Consumes `n` bytes.
    pub fn eat(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(n)?;
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    /// Consumes the rest of the buffer.
    pub fn eat_all(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.0)
    }

    pub fn eat_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.eat(1)?[0])
    }

    pub fn eat_u16_le(&mut self) -> Result<u16, DecodeError> {
        self.eat(2).map(LE::read_u16)
    }

    pub fn eat_u24_le(&mut self) -> Result<u32, DecodeError> {
        self.eat(3).map(LE::read_u24)
    }

    pub fn eat_u32_le(&mut self) -> Result<u32, DecodeError> {
        self.eat(4).map(LE::read_u32)
    }

    pub fn eat_u48_le(&mut self) -> Result<u64, DecodeError> {
        self.eat(6).map(LE::read_u48)
    }

    pub fn eat_u64_le(&mut self) -> Result<u64, DecodeError> {
        self.eat(8).map(LE::read_u64)
    }

    /// Reads `n` (`1..=8`) bytes as an unsigned little-endian integer.
    pub fn eat_uint_le(&mut self, n: usize) -> Result<u64, DecodeError> {
        if n == 0 {
            return Ok(0);
        }
        self.eat(n).map(|bytes| LE::read_uint(bytes, n))
    }

    /// Reads `n` (`1..=8`) bytes as an unsigned big-endian integer.
    pub fn eat_uint_be(&mut self, n: usize) -> Result<u64, DecodeError> {
        if n == 0 {
            return Ok(0);
        }
        self.eat(n).map(|bytes| BE::read_uint(bytes, n))
    }

    /// Reads `n` (`1..=8`) bytes as a signed big-endian integer.
    pub fn eat_int_be(&mut self, n: usize) -> Result<i64, DecodeError> {
        if n == 0 {
            return Ok(0);
        }
        self.eat(n).map(|bytes| BE::read_int(bytes, n))
    }

    /// Reads a length-encoded integer.
    pub fn eat_lenenc_int(&mut self) -> Result<u64, DecodeError> {
        let mut this = *self;
        let value = match this.eat_u8()? {
            0xfc => this.eat_uint_le(2)?,
            0xfd => this.eat_uint_le(3)?,
            0xfe => this.eat_uint_le(8)?,
            x @ 0xfb | x @ 0xff => {
                return Err(DecodeError::Invalid(format!(
                    "invalid length-encoded integer prefix {:#04x}",
                    x
                )))
            }
            x => x as u64,
        };
        *self = this;
        Ok(value)
    }

    /// Reads a length-encoded byte string.
    pub fn eat_lenenc_str(&mut self) -> Result<&'a [u8], DecodeError> {
        let mut this = *self;
        let len = this.eat_lenenc_int()?;
        let bytes = this.eat(len as usize)?;
        *self = this;
        Ok(bytes)
    }

    /// Reads a byte string terminated by `\0`. The terminator is consumed but not returned.
    pub fn eat_null_str(&mut self) -> Result<&'a [u8], DecodeError> {
        match self.0.iter().position(|x| *x == 0) {
            Some(pos) => {
                let bytes = &self.0[..pos];
                self.0 = &self.0[pos + 1..];
                Ok(bytes)
            }
            None => Err(DecodeError::invalid("missing null terminator")),
        }
    }

    /// Reads a byte string prefixed with a one-byte length.
    pub fn eat_u8_str(&mut self) -> Result<&'a [u8], DecodeError> {
        let mut this = *self;
        let len = this.eat_u8()? as usize;
        let bytes = this.eat(len)?;
        *self = this;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_read_fixed_ints() -> Result<(), DecodeError> {
        let mut buf = ParseBuf(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 0xff]);
        assert_eq!(buf.eat_u16_le()?, 0x0201);
        assert_eq!(buf.eat_u24_le()?, 0x050403);
        assert_eq!(buf.eat_uint_be(2)?, 0x0607);
        assert_eq!(buf.eat_int_be(1)?, 8);
        assert_eq!(buf.eat_int_be(1)?, 9);
        assert_eq!(buf.eat_int_be(1)?, -1);
        assert!(buf.is_empty());
        Ok(())
    }

    #[test]
    fn should_not_overread() {
        let mut buf = ParseBuf(&[1, 2, 3]);
        assert_eq!(
            buf.eat_u32_le(),
            Err(DecodeError::NotEnoughBytes {
                needed: 4,
                available: 3
            })
        );
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn should_read_lenenc_int() -> Result<(), DecodeError> {
        let mut buf = ParseBuf(&[
            0xfa, 0xfc, 0x01, 0x02, 0xfd, 0x01, 0x02, 0x03, 0xfe, 1, 0, 0, 0, 0, 0, 0, 1,
        ]);
        assert_eq!(buf.eat_lenenc_int()?, 0xfa);
        assert_eq!(buf.eat_lenenc_int()?, 0x0201);
        assert_eq!(buf.eat_lenenc_int()?, 0x030201);
        assert_eq!(buf.eat_lenenc_int()?, 0x0100_0000_0000_0001);
        assert!(buf.is_empty());

        let mut buf = ParseBuf(&[0xfd, 0x01]);
        assert!(buf.eat_lenenc_int().is_err());
        assert_eq!(buf.len(), 2);
        assert!(ParseBuf(&[0xff]).eat_lenenc_int().is_err());
        Ok(())
    }

    #[test]
    fn should_read_strings() -> Result<(), DecodeError> {
        let mut buf = ParseBuf(b"\x03foo\x00bar\x00\x02hi");
        assert_eq!(buf.eat_lenenc_str()?, b"foo");
        assert_eq!(buf.eat_null_str()?, b"");
        assert_eq!(buf.eat_null_str()?, b"bar");
        assert_eq!(buf.eat_u8_str()?, b"hi");
        assert!(buf.eat_null_str().is_err());
        Ok(())
    }
}
