// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::{convert::TryInto, fmt};

use crate::{
    binlog::{gtid::Sid, raw::RawEvent},
    error::DecodeError,
    io::ParseBuf,
};

/// Commit order info written by 5.7+ servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalTimestamp {
    /// Commit parent `sequence_number`.
    pub last_committed: u64,
    /// The transaction's logical timestamp assigned at prepare phase.
    pub sequence_number: u64,
}

/// GTID and anonymous GTID events. Both share the same layout.
///
/// An anonymous GTID event has a zero SID and GNO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GtidEvent {
    commit: bool,
    sid: Sid,
    gno: u64,
    logical_timestamp: Option<LogicalTimestamp>,
    extra: Vec<u8>,
}

impl GtidEvent {
    /// Commit flag, SID and GNO.
    pub const POST_HEADER_LEN: usize = 1 + Sid::LEN + 8;
    /// 5.7+ post-header also covers the logical timestamp.
    pub const POST_HEADER_LEN_WITH_LOGICAL_TIMESTAMP: usize =
        Self::POST_HEADER_LEN + 1 + 8 + 8;
    pub const LOGICAL_TIMESTAMP_TYPECODE: u8 = 2;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        let mut buf = ParseBuf(raw.fixed_length_data());
        let commit = match buf.eat_u8()? {
            0 => false,
            1 => true,
            x => {
                return Err(DecodeError::Invalid(format!(
                    "invalid GTID commit flag {}",
                    x
                )))
            }
        };
        let sid = buf.eat(Sid::LEN)?;
        let sid = Sid(sid.try_into().map_err(|_| DecodeError::invalid("bad SID"))?);
        let gno = buf.eat_u64_le()?;

        let mut buf = ParseBuf(raw.variable_length_data());
        let logical_timestamp = match buf.0.first() {
            Some(&typecode) if typecode == Self::LOGICAL_TIMESTAMP_TYPECODE && buf.len() >= 17 => {
                buf.eat_u8()?;
                Some(LogicalTimestamp {
                    last_committed: buf.eat_u64_le()?,
                    sequence_number: buf.eat_u64_le()?,
                })
            }
            _ => None,
        };

        Ok(Self {
            commit,
            sid,
            gno,
            logical_timestamp,
            extra: buf.eat_all().to_vec(),
        })
    }

    /// Returns `true` if the transaction is committed in a single statement.
    pub fn commit(&self) -> bool {
        self.commit
    }

    pub fn sid(&self) -> &Sid {
        &self.sid
    }

    /// Group number, second component of the GTID.
    pub fn gno(&self) -> u64 {
        self.gno
    }

    pub fn is_anonymous(&self) -> bool {
        self.sid == Sid([0; Sid::LEN]) && self.gno == 0
    }

    pub fn logical_timestamp(&self) -> Option<LogicalTimestamp> {
        self.logical_timestamp
    }

    /// Trailing fields this parser doesn't interpret (commit timestamps etc.).
    pub fn extra(&self) -> &[u8] {
        &self.extra
    }
}

impl fmt::Display for GtidEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sid, self.gno)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        binlog::test_utils::{frame, gtid_body},
        constants::EventType,
    };

    use super::*;

    const SID: &str = "3e11fa47-71ca-11e1-9e33-c80aa9429562";

    fn raw_gtid(body: &[u8]) -> RawEvent {
        let mut raw = RawEvent::new("gtid".into(), 0, frame(EventType::GTID_EVENT, 0, body)).unwrap();
        raw.set_fixed_length_data_size(GtidEvent::POST_HEADER_LEN).unwrap();
        raw
    }

    #[test]
    fn should_parse_5_6_gtid() -> Result<(), DecodeError> {
        let sid: Sid = SID.parse().unwrap();
        let event = GtidEvent::parse(&raw_gtid(&gtid_body(true, &sid, 23)))?;
        assert!(event.commit());
        assert_eq!(event.sid(), &sid);
        assert_eq!(event.gno(), 23);
        assert_eq!(event.logical_timestamp(), None);
        assert_eq!(event.to_string(), format!("{}:23", SID));
        assert!(!event.is_anonymous());
        Ok(())
    }

    #[test]
    fn should_parse_logical_timestamp() -> Result<(), DecodeError> {
        let sid: Sid = SID.parse().unwrap();
        let mut body = gtid_body(false, &sid, 5);
        body.push(GtidEvent::LOGICAL_TIMESTAMP_TYPECODE);
        body.extend_from_slice(&10u64.to_le_bytes());
        body.extend_from_slice(&11u64.to_le_bytes());
        body.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);

        let event = GtidEvent::parse(&raw_gtid(&body))?;
        assert!(!event.commit());
        assert_eq!(
            event.logical_timestamp(),
            Some(LogicalTimestamp {
                last_committed: 10,
                sequence_number: 11
            })
        );
        assert_eq!(event.extra(), &[1, 2, 3, 4, 5, 6, 7]);
        Ok(())
    }

    #[test]
    fn should_detect_anonymous() -> Result<(), DecodeError> {
        let event = GtidEvent::parse(&raw_gtid(&gtid_body(true, &Sid([0; 16]), 0)))?;
        assert!(event.is_anonymous());
        Ok(())
    }

    #[test]
    fn should_reject_bad_commit_flag() {
        let mut body = gtid_body(true, &Sid([0; 16]), 0);
        body[0] = 2;
        assert!(GtidEvent::parse(&raw_gtid(&body)).is_err());
    }
}
