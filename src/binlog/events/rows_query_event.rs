// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::borrow::Cow;

use crate::{binlog::raw::RawEvent, error::DecodeError};

/// Original text of the statement that produced the following rows events.
///
/// Written if `binlog_rows_query_log_events` is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowsQueryEvent {
    query: Vec<u8>,
}

impl RowsQueryEvent {
    pub const POST_HEADER_LEN: usize = 0;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        // The length byte is truncated to 255, so the rest of the body is the query.
        match raw.variable_length_data().split_first() {
            Some((_, query)) => Ok(Self {
                query: query.to_vec(),
            }),
            None => Err(DecodeError::NotEnoughBytes {
                needed: 1,
                available: 0,
            }),
        }
    }

    pub fn query_raw(&self) -> &[u8] {
        &self.query
    }

    pub fn query(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.query)
    }
}

#[cfg(test)]
mod tests {
    use crate::{binlog::test_utils::frame, constants::EventType};

    use super::*;

    fn raw_rows_query(body: &[u8]) -> RawEvent {
        RawEvent::new("rows_query".into(), 0, frame(EventType::ROWS_QUERY_EVENT, 0, body))
            .unwrap()
    }

    #[test]
    fn should_ignore_length_byte() -> Result<(), DecodeError> {
        let event = RowsQueryEvent::parse(&raw_rows_query(b"\x03INSERT INTO t VALUES (1)"))?;
        assert_eq!(event.query(), "INSERT INTO t VALUES (1)");
        Ok(())
    }

    #[test]
    fn should_reject_empty_body() {
        assert!(RowsQueryEvent::parse(&raw_rows_query(b"")).is_err());
    }
}
