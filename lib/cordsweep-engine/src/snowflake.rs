// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::{DateTime, Utc};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Milliseconds between the Unix epoch and the service's custom epoch
/// (2015-01-01T00:00:00Z).
pub const EPOCH_OFFSET_MS: i64 = 1_420_070_400_000;

/// Low bits of an id that hold worker, process and sequence data rather
/// than the timestamp.
const TIMESTAMP_SHIFT: u32 = 22;

/// A 64-bit identifier with the creation time encoded in its high bits.
///
/// Every entity the engine touches (messages, channels, guilds, users) is
/// addressed by one of these. The wire format is the plain decimal string.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snowflake(u64);

impl Snowflake {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The smallest id whose creation time is at or after the given moment.
    ///
    /// Useful as a search bound: every message written from `when` onwards
    /// compares greater or equal to the result.
    pub fn from_timestamp(when: DateTime<Utc>) -> Self {
        let ms = when.timestamp_millis().saturating_sub(EPOCH_OFFSET_MS).max(0) as u64;
        Self(ms << TIMESTAMP_SHIFT)
    }

    /// Milliseconds since the Unix epoch at which this id was minted.
    pub fn timestamp_ms(self) -> i64 {
        (self.0 >> TIMESTAMP_SHIFT) as i64 + EPOCH_OFFSET_MS
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_plus_one_milli() {
        let when = Utc.timestamp_millis_opt(EPOCH_OFFSET_MS + 1).unwrap();
        assert_eq!(Snowflake::from_timestamp(when), Snowflake::new(1 << 22));
    }

    #[test]
    fn known_id_round_trips() {
        // Id taken from the service's own documentation.
        let id = Snowflake::new(175_928_847_299_117_063);
        assert_eq!(id.timestamp_ms(), 1_462_015_105_796);

        let when = Utc.timestamp_millis_opt(id.timestamp_ms()).unwrap();
        let lower_bound = Snowflake::from_timestamp(when);
        assert!(lower_bound <= id);
        assert_eq!(lower_bound.timestamp_ms(), id.timestamp_ms());
    }

    #[test]
    fn before_the_epoch_clamps_to_zero() {
        let when = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(Snowflake::from_timestamp(when), Snowflake::new(0));
    }

    #[test]
    fn decimal_round_trip() {
        let id: Snowflake = "175928847299117063".parse().unwrap();
        assert_eq!(id.to_string(), "175928847299117063");
        assert!("not-an-id".parse::<Snowflake>().is_err());
    }
}
