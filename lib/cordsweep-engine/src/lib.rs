// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The control loop for bulk-deleting a user's messages from Discord.
//!
//! The [`DeletionEngine`] repeatedly queries the paginated message-search
//! endpoint, filters the hits down to the messages the run may delete,
//! deletes them one at a time, and keeps going until the search comes back
//! empty. Along the way it obeys the service's flow-control answers: an
//! index-pending reply is waited out, a throttle hint raises the pacing
//! delays, and the very first destructive action is gated behind a one-shot
//! confirmation.
//!
//! The engine itself never talks HTTP. It calls out through the capability
//! traits in [`ports`]; the `cordsweep-rest` crate implements the two
//! network-facing ones against Discord's API, and the remaining ones
//! (confirmation, cancellation, logging, progress) are supplied by whatever
//! is driving the run.

#![allow(async_fn_in_trait)]

pub mod engine;
mod errors;
pub mod ports;
mod snowflake;
pub mod types;
mod utils;

pub use engine::{run, DeletionEngine};
pub use errors::{BoundParseError, RunError, TransportError};
pub use snowflake::Snowflake;
pub use types::{
    CancelReason, DeletionRequest, Message, MessageKind, RunOutcome, RunSummary, SearchPage,
    SearchScope, SnowflakeBound, DEFAULT_DELETE_DELAY, DEFAULT_SEARCH_DELAY,
};
