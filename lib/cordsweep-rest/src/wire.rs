// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Wire format of the search endpoint.

use chrono::{DateTime, Utc};
use cordsweep_engine::{Message, MessageKind, SearchPage};
use std::error::Error;
use std::fmt;
use std::num::ParseIntError;
use std::time::Duration;

use serde::Deserialize;

/// Fallback when a throttle body carries no usable hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(1000);

#[derive(Debug, Deserialize)]
struct SearchBody {
    total_results: u64,
    /// Each entry is a conversation snippet around one hit; the hit itself
    /// is the message flagged `"hit": true`.
    messages: Vec<Vec<WireMessage>>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    channel_id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    content: String,
    timestamp: String,
    author: WireAuthor,
    #[serde(default)]
    attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    hit: bool,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    id: String,
    username: String,
    discriminator: String,
}

#[derive(Debug, Deserialize)]
struct ThrottleBody {
    retry_after: u64,
}

/// A search body that could not be mapped to the engine's page shape.
#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    BadId(ParseIntError),
    BadTimestamp(chrono::ParseError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed search body: {err}"),
            Self::BadId(err) => write!(f, "malformed id in search body: {err}"),
            Self::BadTimestamp(err) => write!(f, "malformed timestamp in search body: {err}"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::BadId(err) => Some(err),
            Self::BadTimestamp(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

impl From<ParseIntError> for DecodeError {
    fn from(error: ParseIntError) -> Self {
        Self::BadId(error)
    }
}

impl From<chrono::ParseError> for DecodeError {
    fn from(error: chrono::ParseError) -> Self {
        Self::BadTimestamp(error)
    }
}

/// Reads the millisecond backoff hint out of a 202/429 body.
pub(crate) fn retry_after(body: &str) -> Duration {
    serde_json::from_str::<ThrottleBody>(body)
        .map(|throttle| Duration::from_millis(throttle.retry_after))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Decodes a search body, keeping the one flagged hit out of every
/// conversation snippet. Snippets without a flagged hit are dropped.
pub(crate) fn decode_page(body: &str) -> Result<SearchPage, DecodeError> {
    let body: SearchBody = serde_json::from_str(body)?;
    let mut messages = Vec::with_capacity(body.messages.len());
    for snippet in body.messages {
        if let Some(hit) = snippet.into_iter().find(|message| message.hit) {
            messages.push(Message::try_from(hit)?);
        }
    }
    Ok(SearchPage {
        total_results: body.total_results,
        messages,
    })
}

impl TryFrom<WireMessage> for Message {
    type Error = DecodeError;

    fn try_from(wire: WireMessage) -> Result<Self, DecodeError> {
        Ok(Message {
            id: wire.id.parse()?,
            channel_id: wire.channel_id.parse()?,
            author_id: wire.author.id.parse()?,
            author_name: format!("{}#{}", wire.author.username, wire.author.discriminator),
            timestamp: DateTime::parse_from_rfc3339(&wire.timestamp)?.with_timezone(&Utc),
            content: wire.content,
            attachment_count: wire.attachments.len(),
            pinned: wire.pinned,
            kind: match wire.kind {
                0 => MessageKind::Default,
                6 => MessageKind::PinAdded,
                other => MessageKind::Other(other),
            },
        })
    }
}
