// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::errors::BoundParseError;
use crate::snowflake::Snowflake;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::str::FromStr;
use std::time::Duration;

/// Pause between search pages unless the caller picks something else.
pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(100);

/// Pause between deletions unless the caller picks something else.
pub const DEFAULT_DELETE_DELAY: Duration = Duration::from_millis(1000);

/// Where a run searches for messages.
///
/// The service exposes two shapes of the search endpoint: guild-wide search
/// narrowed to one channel, and direct-message search addressed by channel
/// alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchScope {
    Guild {
        guild_id: Snowflake,
        channel_id: Snowflake,
    },
    DirectMessages {
        channel_id: Snowflake,
    },
}

impl SearchScope {
    pub fn channel_id(&self) -> Snowflake {
        match self {
            Self::Guild { channel_id, .. } => *channel_id,
            Self::DirectMessages { channel_id } => *channel_id,
        }
    }
}

/// A bound on the message range, given either as a raw id or as a point in
/// time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SnowflakeBound {
    Id(Snowflake),
    Date(DateTime<Utc>),
}

impl SnowflakeBound {
    /// The effective query parameter: ids pass through unchanged, dates
    /// become the smallest id at or after the timestamp.
    pub fn to_snowflake(self) -> Snowflake {
        match self {
            Self::Id(id) => id,
            Self::Date(when) => Snowflake::from_timestamp(when),
        }
    }
}

impl FromStr for SnowflakeBound {
    type Err = BoundParseError;

    /// Anything containing a `:` is a date-time (RFC 3339, or the bare
    /// `YYYY-MM-DDTHH:MM` form taken as UTC); everything else is a raw id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            let when = match DateTime::parse_from_rfc3339(s) {
                Ok(when) => when.with_timezone(&Utc),
                Err(_) => {
                    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")?;
                    Utc.from_utc_datetime(&naive)
                }
            };
            Ok(Self::Date(when))
        } else {
            Ok(Self::Id(s.parse()?))
        }
    }
}

/// Immutable input to one deletion run.
///
/// The authorization token is owned by the transport, not the request; the
/// engine never sees it.
#[derive(Clone, Debug)]
pub struct DeletionRequest {
    /// Only messages written by this author. `None` matches everyone.
    pub author_id: Option<Snowflake>,
    pub scope: SearchScope,
    /// Only messages strictly newer than this bound.
    pub min: Option<SnowflakeBound>,
    /// Only messages strictly older than this bound.
    pub max: Option<SnowflakeBound>,
    /// Only messages containing this text.
    pub content: Option<String>,
    /// Only messages containing a link.
    pub has_link: bool,
    /// Only messages containing an attached file.
    pub has_file: bool,
    /// Let the search look inside age-restricted channels.
    pub include_nsfw: bool,
    /// Also delete pinned messages that would otherwise be skipped.
    pub include_pinned: bool,
    /// Starting pause between search pages. Only ever grows during a run.
    pub search_delay: Duration,
    /// Starting pause between deletions. Adjusted to the service's hints
    /// during a run.
    pub delete_delay: Duration,
}

impl DeletionRequest {
    /// A request with no filters and the default pacing.
    pub fn new(scope: SearchScope) -> Self {
        Self {
            author_id: None,
            scope,
            min: None,
            max: None,
            content: None,
            has_link: false,
            has_file: false,
            include_nsfw: false,
            include_pinned: false,
            search_delay: DEFAULT_SEARCH_DELAY,
            delete_delay: DEFAULT_DELETE_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_ids_pass_through() {
        let bound: SnowflakeBound = "175928847299117063".parse().unwrap();
        assert_eq!(
            bound.to_snowflake(),
            Snowflake::new(175_928_847_299_117_063)
        );
    }

    #[test]
    fn date_and_equivalent_id_agree() {
        let by_date: SnowflakeBound = "2016-04-30T11:18:25.796+00:00".parse().unwrap();
        let by_id = SnowflakeBound::Id(Snowflake::new(
            (1_462_015_105_796 - 1_420_070_400_000) << 22,
        ));
        assert_eq!(by_date.to_snowflake(), by_id.to_snowflake());
    }

    #[test]
    fn bare_local_form_is_taken_as_utc() {
        let bound: SnowflakeBound = "2020-06-01T12:30".parse().unwrap();
        let SnowflakeBound::Date(when) = bound else {
            panic!("expected a date bound");
        };
        assert_eq!(when.to_rfc3339(), "2020-06-01T12:30:00+00:00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("yesterday:ish".parse::<SnowflakeBound>().is_err());
        assert!("12x34".parse::<SnowflakeBound>().is_err());
    }
}
