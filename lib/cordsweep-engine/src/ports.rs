// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Capabilities a run calls out to.
//!
//! Two of these face the network ([`Search`], [`Delete`]) and are
//! implemented by the `cordsweep-rest` crate; the rest are supplied by the
//! driver. Default implementations cover the non-interactive cases: logging
//! through the `log` facade, dropping progress reports, accepting the
//! confirmation, and never cancelling.

use crate::errors::TransportError;
use crate::snowflake::Snowflake;
use crate::types::{SearchPage, SearchScope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fully-built query for one search page.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    pub scope: SearchScope,
    pub author_id: Option<Snowflake>,
    pub min_id: Option<Snowflake>,
    pub max_id: Option<Snowflake>,
    pub content: Option<String>,
    pub has_link: bool,
    pub has_file: bool,
    pub include_nsfw: bool,
    /// Pagination cursor into the remaining result set.
    pub offset: u64,
}

/// Answer from the search endpoint.
///
/// Only unreachable-service failures are errors; everything the service
/// itself says, including throttling, comes back as a variant.
#[derive(Clone, Debug)]
pub enum SearchReply {
    Page(SearchPage),
    /// The channel's search index is still being built. Retry after the
    /// hint; this is warm-up latency, not a fault.
    IndexPending { retry_after: Duration },
    /// Searching too fast. Retry after the hint.
    RateLimited { retry_after: Duration },
    /// Any other non-success answer.
    ServerError { status: u16, body: String },
}

/// Answer from the delete endpoint.
#[derive(Clone, Debug)]
pub enum DeleteReply {
    Deleted,
    /// Deleting too fast. Retry the same message after the hint.
    RateLimited { retry_after: Duration },
    /// Any other non-success answer.
    ServerError { status: u16, body: String },
}

/// Paginated message search.
pub trait Search {
    async fn search(&mut self, query: &SearchQuery) -> Result<SearchReply, TransportError>;
}

/// Removal of a single message.
pub trait Delete {
    async fn delete(
        &mut self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<DeleteReply, TransportError>;
}

/// Go/no-go decision shown once per run, before the first destructive
/// action.
pub trait Confirm {
    async fn confirm(&mut self, preview: &str) -> bool;
}

/// Cooperatively polled stop signal.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Leveled sink for run events.
pub trait Logger {
    fn log(&mut self, level: LogLevel, message: &str);
}

/// Receives `(deleted so far, best-known total)` as the run advances. The
/// total is absent until the first page has been seen.
pub trait ProgressReporter {
    fn report(&mut self, current: u64, total: Option<u64>);
}

/// Severity of a run event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Verbose,
    Warn,
    Error,
    Success,
}

/// Bundle of every capability a run needs.
pub struct Ports<S, D, C, K, L, P> {
    pub search: S,
    pub delete: D,
    pub confirm: C,
    pub cancel: K,
    pub logger: L,
    pub progress: P,
}

/// Logger that forwards run events to the `log` facade. Verbose maps to
/// trace, success to info.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeLogger;

impl Logger for FacadeLogger {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => log::debug!("{message}"),
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Verbose => log::trace!("{message}"),
            LogLevel::Warn => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
            LogLevel::Success => log::info!("{message}"),
        }
    }
}

/// Progress sink that drops every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _current: u64, _total: Option<u64>) {}
}

/// Confirmation that always accepts, for non-interactive runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    async fn confirm(&mut self, _preview: &str) -> bool {
        true
    }
}

/// Token that never trips.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Token backed by a shared flag, so one side (a signal handler, another
/// task) can stop a run the other side is driving.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CancelToken for StopFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
