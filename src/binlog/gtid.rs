// Copyright (c) 2021 Anatoly Ikorsky
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Global transaction identifiers and their sets.

use std::{collections::BTreeMap, fmt, str::FromStr};

use uuid::Uuid;

/// Source id of a GTID: the UUID of the server where a transaction originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sid(pub [u8; 16]);

impl Sid {
    pub const LEN: usize = 16;

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).hyphenated())
    }
}

impl FromStr for Sid {
    type Err = ParseGtidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(|uuid| Sid(*uuid.as_bytes()))
            .map_err(|_| ParseGtidError(format!("invalid source id `{}`", s)))
    }
}

/// Half-open interval of transaction numbers `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GtidInterval {
    pub start: u64,
    pub end: u64,
}

impl GtidInterval {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Renders the interval with inclusive bounds, i.e. `[5, 10)` as `5-9`.
impl fmt::Display for GtidInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end == self.start + 1 {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end.saturating_sub(1))
        }
    }
}

impl FromStr for GtidInterval {
    type Err = ParseGtidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |x: &str| {
            btoi::btou::<u64>(x.trim().as_bytes())
                .map_err(|_| ParseGtidError(format!("invalid interval `{}`", s)))
        };
        let (start, last) = match s.find('-') {
            Some(pos) => (parse(&s[..pos])?, parse(&s[pos + 1..])?),
            None => {
                let x = parse(s)?;
                (x, x)
            }
        };
        if last < start || last == u64::MAX {
            return Err(ParseGtidError(format!("invalid interval `{}`", s)));
        }
        Ok(GtidInterval::new(start, last + 1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseGtidError(pub String);

/// Mapping from source ids to ordered lists of transaction intervals.
///
/// Textual form is `uuid:interval[:interval...][,uuid:...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GtidSet {
    sids: BTreeMap<Sid, Vec<GtidInterval>>,
}

impl GtidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `interval` to the interval list of `sid`.
    pub fn add_interval(&mut self, sid: Sid, interval: GtidInterval) {
        self.sids.entry(sid).or_default().push(interval);
    }

    /// Returns intervals of the given source id.
    pub fn intervals(&self, sid: &Sid) -> Option<&[GtidInterval]> {
        self.sids.get(sid).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sid, &[GtidInterval])> {
        self.sids.iter().map(|(sid, intervals)| (sid, intervals.as_slice()))
    }

    /// Returns the number of source ids in the set.
    pub fn len(&self) -> usize {
        self.sids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }

    /// Returns `true` if the transaction `gno` of `sid` belongs to the set.
    pub fn contains(&self, sid: &Sid, gno: u64) -> bool {
        self.sids
            .get(sid)
            .map(|intervals| intervals.iter().any(|x| x.start <= gno && gno < x.end))
            .unwrap_or(false)
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sid, intervals)) in self.sids.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", sid)?;
            for interval in intervals {
                write!(f, ":{}", interval)?;
            }
        }
        Ok(())
    }
}

impl FromStr for GtidSet {
    type Err = ParseGtidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = GtidSet::new();
        for item in s.split(',').map(str::trim).filter(|x| !x.is_empty()) {
            let mut parts = item.split(':');
            let sid = parts.next().unwrap_or_default().trim().parse::<Sid>()?;
            let intervals = set.sids.entry(sid).or_default();
            for interval in parts {
                intervals.push(interval.parse()?);
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SID: &str = "3e11fa47-71ca-11e1-9e33-c80aa9429562";

    #[test]
    fn should_render_intervals() {
        assert_eq!(GtidInterval::new(5, 10).to_string(), "5-9");
        assert_eq!(GtidInterval::new(1, 2).to_string(), "1");
        assert_eq!(GtidSet::new().to_string(), "");
    }

    #[test]
    fn should_render_set() -> Result<(), ParseGtidError> {
        let sid: Sid = SID.parse()?;
        let mut set = GtidSet::new();
        set.add_interval(sid, GtidInterval::new(1, 6));
        set.add_interval(sid, GtidInterval::new(7, 8));
        set.add_interval(Sid([0; 16]), GtidInterval::new(1, 3));
        assert_eq!(
            set.to_string(),
            format!("00000000-0000-0000-0000-000000000000:1-2,{}:1-5:7", SID)
        );
        assert!(set.contains(&sid, 5));
        assert!(!set.contains(&sid, 6));
        assert!(set.contains(&sid, 7));
        Ok(())
    }

    #[test]
    fn should_parse_set() -> Result<(), ParseGtidError> {
        let set: GtidSet = format!("{}:1-5:7", SID).parse()?;
        let sid: Sid = SID.parse()?;
        assert_eq!(
            set.intervals(&sid),
            Some(&[GtidInterval::new(1, 6), GtidInterval::new(7, 8)][..])
        );
        assert!("".parse::<GtidSet>()?.is_empty());
        assert!("foo:1".parse::<GtidSet>().is_err());
        assert!(format!("{}:5-3", SID).parse::<GtidSet>().is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn text_form_is_stable(
            sid in any::<[u8; 16]>(),
            bounds in proptest::collection::vec((0u64..1_000_000, 1u64..1000), 1..8),
        ) {
            let mut set = GtidSet::new();
            for (start, len) in bounds {
                set.add_interval(Sid(sid), GtidInterval::new(start, start + len));
            }
            let text = set.to_string();
            let parsed: GtidSet = text.parse().unwrap();
            prop_assert_eq!(&parsed, &set);
            prop_assert_eq!(parsed.to_string(), text);
        }
    }
}
