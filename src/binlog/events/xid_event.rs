// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use crate::{binlog::raw::RawEvent, error::DecodeError, io::ParseBuf};

/// Xid event is generated for a commit of a transaction that modifies one or more
/// tables of an XA-capable storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XidEvent {
    xid: u64,
}

impl XidEvent {
    pub const POST_HEADER_LEN: usize = 0;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        let mut buf = ParseBuf(raw.variable_length_data());
        let xid = buf.eat_u64_le()?;
        if !buf.is_empty() {
            return Err(DecodeError::ExtraBytes(buf.len()));
        }
        Ok(Self { xid })
    }

    pub fn xid(&self) -> u64 {
        self.xid
    }
}

#[cfg(test)]
mod tests {
    use crate::{binlog::test_utils::frame, constants::EventType};

    use super::*;

    fn raw_xid(body: &[u8]) -> RawEvent {
        RawEvent::new("xid".into(), 0, frame(EventType::XID_EVENT, 0, body)).unwrap()
    }

    #[test]
    fn should_parse_xid() -> Result<(), DecodeError> {
        let event = XidEvent::parse(&raw_xid(&0x0102_0304_0506_0708u64.to_le_bytes()))?;
        assert_eq!(event.xid(), 0x0102_0304_0506_0708);
        Ok(())
    }

    #[test]
    fn should_reject_wrong_length() {
        assert!(matches!(
            XidEvent::parse(&raw_xid(&[1, 2, 3])),
            Err(DecodeError::NotEnoughBytes { .. })
        ));
        assert_eq!(
            XidEvent::parse(&raw_xid(&[0; 9])),
            Err(DecodeError::ExtraBytes(1))
        );
    }
}
