// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::snowflake::Snowflake;
use chrono::{DateTime, Utc};

/// A single message surfaced by the search endpoint.
///
/// This is a snapshot of what the search index knew when the page was
/// served; edits or deletions made afterwards are not reflected in it.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: Snowflake,
    /// The channel the message lives in. Deletion addresses the message
    /// through this, not through the channel the search was scoped to.
    pub channel_id: Snowflake,
    pub author_id: Snowflake,
    /// Display form of the author, e.g. `someone#1234`.
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub attachment_count: usize,
    pub pinned: bool,
    pub kind: MessageKind,
}

/// Wire-level message type, reduced to the cases the engine distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// An ordinary user message (wire type 0).
    Default,
    /// The service notice generated when a message is pinned (wire type 6).
    PinAdded,
    /// Any other service-generated message. Never deleted.
    Other(u8),
}

impl Message {
    /// Whether a run may delete this message.
    ///
    /// Ordinary messages and pin notices always qualify; a pinned message
    /// of any other kind only with the explicit opt-in. Everything else is
    /// a system message and stays.
    pub fn is_deletable(&self, include_pinned: bool) -> bool {
        matches!(self.kind, MessageKind::Default | MessageKind::PinAdded)
            || (self.pinned && include_pinned)
    }

    /// One line for the confirmation preview: the author plus the content,
    /// or a marker when the message carries attachments.
    pub fn preview_line(&self) -> String {
        if self.attachment_count > 0 {
            format!("{}: [ATTACHMENTS]", self.author_name)
        } else {
            format!("{}: {}", self.author_name, self.content)
        }
    }
}

/// One page of search results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPage {
    /// Server-reported number of matches still in the result set. Shrinks
    /// as messages are deleted out from under it.
    pub total_results: u64,
    /// The candidate messages on this page, newest first.
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(kind: MessageKind, pinned: bool) -> Message {
        Message {
            id: Snowflake::new(1),
            channel_id: Snowflake::new(2),
            author_id: Snowflake::new(3),
            author_name: "someone#1234".into(),
            timestamp: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            content: "hello".into(),
            attachment_count: 0,
            pinned,
            kind,
        }
    }

    #[test]
    fn ordinary_and_pin_notices_are_deletable() {
        assert!(message(MessageKind::Default, false).is_deletable(false));
        assert!(message(MessageKind::PinAdded, false).is_deletable(false));
    }

    #[test]
    fn other_kinds_need_the_pinned_opt_in() {
        let system = message(MessageKind::Other(7), false);
        assert!(!system.is_deletable(false));
        assert!(!system.is_deletable(true));

        let pinned_system = message(MessageKind::Other(7), true);
        assert!(!pinned_system.is_deletable(false));
        assert!(pinned_system.is_deletable(true));
    }

    #[test]
    fn preview_marks_attachments() {
        let mut with_file = message(MessageKind::Default, false);
        with_file.attachment_count = 2;
        assert_eq!(with_file.preview_line(), "someone#1234: [ATTACHMENTS]");

        let plain = message(MessageKind::Default, false);
        assert_eq!(plain.preview_line(), "someone#1234: hello");
    }
}
