// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::convert::TryInto;

use crate::{
    binlog::{
        gtid::{GtidInterval, GtidSet, Sid},
        raw::RawEvent,
    },
    error::DecodeError,
    io::ParseBuf,
};

/// Set of GTIDs executed before the current binlog file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviousGtidsEvent {
    gtid_set: GtidSet,
}

impl PreviousGtidsEvent {
    pub const POST_HEADER_LEN: usize = 0;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        let mut buf = ParseBuf(raw.variable_length_data());
        let mut gtid_set = GtidSet::new();

        let n_sids = buf.eat_u64_le()?;
        for _ in 0..n_sids {
            let sid = buf.eat(Sid::LEN)?;
            let sid = Sid(sid.try_into().map_err(|_| DecodeError::invalid("bad SID"))?);
            let n_intervals = buf.eat_u64_le()?;
            for _ in 0..n_intervals {
                let start = buf.eat_u64_le()?;
                let end = buf.eat_u64_le()?;
                if start >= end {
                    return Err(DecodeError::Invalid(format!(
                        "invalid GTID interval {}-{}",
                        start, end
                    )));
                }
                gtid_set.add_interval(sid, GtidInterval::new(start, end));
            }
        }

        if !buf.is_empty() {
            return Err(DecodeError::ExtraBytes(buf.len()));
        }

        Ok(Self { gtid_set })
    }

    pub fn gtid_set(&self) -> &GtidSet {
        &self.gtid_set
    }

    pub fn into_gtid_set(self) -> GtidSet {
        self.gtid_set
    }
}

#[cfg(test)]
mod tests {
    use crate::{binlog::test_utils::frame, constants::EventType};

    use super::*;

    fn raw_previous_gtids(body: &[u8]) -> RawEvent {
        RawEvent::new("prev".into(), 0, frame(EventType::PREVIOUS_GTIDS_EVENT, 0, body)).unwrap()
    }

    fn body(sid: &Sid, intervals: &[(u64, u64)]) -> Vec<u8> {
        let mut body = 1u64.to_le_bytes().to_vec();
        body.extend_from_slice(sid.as_bytes());
        body.extend_from_slice(&(intervals.len() as u64).to_le_bytes());
        for (start, end) in intervals {
            body.extend_from_slice(&start.to_le_bytes());
            body.extend_from_slice(&end.to_le_bytes());
        }
        body
    }

    #[test]
    fn should_parse_gtid_set() -> Result<(), DecodeError> {
        let sid: Sid = "3e11fa47-71ca-11e1-9e33-c80aa9429562".parse().unwrap();
        let event = PreviousGtidsEvent::parse(&raw_previous_gtids(&body(&sid, &[(1, 6), (7, 8)])))?;
        assert_eq!(
            event.gtid_set().to_string(),
            "3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5:7"
        );
        assert!(event.gtid_set().contains(&sid, 5));
        assert!(!event.gtid_set().contains(&sid, 6));
        Ok(())
    }

    #[test]
    fn should_parse_empty_set() -> Result<(), DecodeError> {
        let event = PreviousGtidsEvent::parse(&raw_previous_gtids(&0u64.to_le_bytes()))?;
        assert!(event.gtid_set().is_empty());
        Ok(())
    }

    #[test]
    fn should_reject_trailing_bytes() {
        let mut bytes = body(&Sid([1; 16]), &[(1, 2)]);
        bytes.push(0);
        assert_eq!(
            PreviousGtidsEvent::parse(&raw_previous_gtids(&bytes)),
            Err(DecodeError::ExtraBytes(1))
        );
    }
}
