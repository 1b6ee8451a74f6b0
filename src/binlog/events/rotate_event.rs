// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::borrow::Cow;

use crate::{binlog::raw::RawEvent, error::DecodeError, io::ParseBuf};

/// The rotate event is added to the binlog as last event to tell the reader what
/// binlog to request next.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RotateEvent {
    position: u64,
    name: Vec<u8>,
}

impl RotateEvent {
    pub const POST_HEADER_LEN: usize = 8;

    pub fn parse(raw: &RawEvent) -> Result<Self, DecodeError> {
        let position = ParseBuf(raw.fixed_length_data()).eat_u64_le()?;
        let name = raw.variable_length_data().to_vec();
        Ok(Self { position, name })
    }

    /// Position of the first event in the next log file.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the next log file name as a byte slice.
    pub fn name_raw(&self) -> &[u8] {
        &self.name
    }

    /// Returns the next log file name as a string (lossy converted).
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}
