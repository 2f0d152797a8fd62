// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The deletion control loop.

use crate::errors::RunError;
use crate::ports::{
    CancelToken, Confirm, Delete, DeleteReply, LogLevel, Logger, Ports, ProgressReporter, Search,
    SearchQuery, SearchReply,
};
use crate::types::{
    CancelReason, DeletionRequest, Message, RunOutcome, RunSummary, SearchPage, SnowflakeBound,
};
use crate::utils::format_duration;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Search pages carry at most this many hits.
const PAGE_SIZE: u64 = 25;

/// The confirmation preview shows at most this many messages.
const PREVIEW_LINES: usize = 10;

/// Mutable bookkeeping for one run. Created when the run starts, discarded
/// when it ends; nothing survives across runs.
#[derive(Debug)]
struct RunState {
    /// Pagination cursor. Advances only past messages the run chose to
    /// skip; deletions shrink the remote result set instead.
    offset: u64,
    deleted: u64,
    failed: u64,
    /// Best-known count of deletable matches. Captured from the first page
    /// and lowered whenever system messages turn up in the results.
    grand_total: Option<u64>,
    throttled_count: u64,
    throttled_time: Duration,
    last_ping: Duration,
    /// Exponential moving average of request latency, in milliseconds, with
    /// a 0.1 weight for the newest sample.
    avg_ping_ms: f64,
    /// Pause before the next search page. Grows by each throttle hint and
    /// never shrinks for the rest of the run.
    search_delay: Duration,
    /// Pause after each deletion. Replaced outright by throttle hints.
    delete_delay: Duration,
    /// Latched once the operator has approved the run.
    confirmed: bool,
    started: Instant,
}

/// Drives one search→confirm→delete cycle to completion or cancellation.
///
/// All bookkeeping lives inside the engine; the caller keeps ownership of
/// the ports and may reuse them for the next run once this one returns.
/// Exactly one request is in flight at any time, and every wait point is a
/// suspension, so a run costs nothing while it backs off.
pub struct DeletionEngine<'p, S, D, C, K, L, P> {
    request: DeletionRequest,
    ports: &'p mut Ports<S, D, C, K, L, P>,
    state: RunState,
}

/// Runs one deletion request against the given ports.
pub async fn run<S, D, C, K, L, P>(
    request: DeletionRequest,
    ports: &mut Ports<S, D, C, K, L, P>,
) -> RunSummary
where
    S: Search,
    D: Delete,
    C: Confirm,
    K: CancelToken,
    L: Logger,
    P: ProgressReporter,
{
    DeletionEngine::new(request, ports).run().await
}

impl<'p, S, D, C, K, L, P> DeletionEngine<'p, S, D, C, K, L, P>
where
    S: Search,
    D: Delete,
    C: Confirm,
    K: CancelToken,
    L: Logger,
    P: ProgressReporter,
{
    pub fn new(request: DeletionRequest, ports: &'p mut Ports<S, D, C, K, L, P>) -> Self {
        let state = RunState {
            offset: 0,
            deleted: 0,
            failed: 0,
            grand_total: None,
            throttled_count: 0,
            throttled_time: Duration::ZERO,
            last_ping: Duration::ZERO,
            avg_ping_ms: 0.0,
            search_delay: request.search_delay,
            delete_delay: request.delete_delay,
            confirmed: false,
            started: Instant::now(),
        };
        Self {
            request,
            ports,
            state,
        }
    }

    /// Runs to completion, cancellation or fatal failure. Every termination
    /// path logs the summary block and yields the final statistics.
    pub async fn run(mut self) -> RunSummary {
        self.log(LogLevel::Success, "run started");
        let line = format!(
            "author={:?} scope={:?} min={:?} max={:?} has_link={} has_file={}",
            self.request.author_id,
            self.request.scope,
            self.request.min,
            self.request.max,
            self.request.has_link,
            self.request.has_file,
        );
        self.log(LogLevel::Debug, &line);
        self.ports.progress.report(0, None);

        let outcome = self.drive().await;
        self.finish(outcome)
    }

    async fn drive(&mut self) -> RunOutcome {
        loop {
            let page = match self.next_page().await {
                Ok(page) => page,
                Err(err) => return RunOutcome::Failed(err),
            };

            if self.state.grand_total.is_none() {
                self.state.grand_total = Some(page.total_results);
            }

            let total = page.total_results;
            let page_len = page.messages.len();
            let (deletable, skipped): (Vec<Message>, Vec<Message>) = page
                .messages
                .into_iter()
                .partition(|m| m.is_deletable(self.request.include_pinned));

            let eta = self.estimate_remaining(total);
            let line = format!(
                "{total} messages matched (page: {page_len}, deletable: {}, system: {}, offset: {})",
                deletable.len(),
                skipped.len(),
                self.state.offset,
            );
            self.log(LogLevel::Info, &line);
            self.log_delay_stats();
            let line = format!("estimated time remaining: {}", format_duration(eta));
            self.log(LogLevel::Verbose, &line);

            if deletable.is_empty() && skipped.is_empty() {
                if self.state.offset > 0 {
                    self.log(
                        LogLevel::Info,
                        "search came back empty at a nonzero offset",
                    );
                }
                return RunOutcome::Completed;
            }

            if !deletable.is_empty() && !self.state.confirmed {
                self.log(LogLevel::Verbose, "waiting for confirmation");
                let preview = self.preview(&deletable, total, eta);
                if !self.ports.confirm.confirm(&preview).await {
                    self.log(LogLevel::Error, "declined; nothing was deleted");
                    return RunOutcome::Cancelled(CancelReason::ConfirmationDeclined);
                }
                self.state.confirmed = true;
            }

            for message in &deletable {
                if let Err(reason) = self.delete_one(message).await {
                    return RunOutcome::Cancelled(reason);
                }
            }

            if !skipped.is_empty() {
                let lowered = self
                    .state
                    .grand_total
                    .unwrap_or(0)
                    .saturating_sub(skipped.len() as u64);
                self.state.grand_total = Some(lowered);
                self.state.offset += skipped.len() as u64;
                let line = format!(
                    "{} system messages on this page; total lowered to {lowered}, offset advanced to {}",
                    skipped.len(),
                    self.state.offset,
                );
                self.log(LogLevel::Verbose, &line);
            }

            let line = format!(
                "searching the next page in {}",
                format_duration(self.state.search_delay)
            );
            self.log(LogLevel::Verbose, &line);
            sleep(self.state.search_delay).await;

            if self.ports.cancel.is_cancelled() {
                self.log(LogLevel::Error, "stopped");
                return RunOutcome::Cancelled(CancelReason::Stopped);
            }
        }
    }

    /// Fetches the page at the current offset, waiting out warm-up and
    /// throttle hints. Transport failures and unexpected statuses are fatal
    /// for the run.
    async fn next_page(&mut self) -> Result<SearchPage, RunError> {
        loop {
            let query = self.build_query();
            let begun = Instant::now();
            let reply = match self.ports.search.search(&query).await {
                Ok(reply) => reply,
                Err(err) => {
                    let line = format!("search request failed: {err}");
                    self.log(LogLevel::Error, &line);
                    return Err(RunError::Transport(err));
                }
            };
            self.note_ping(begun.elapsed());

            match reply {
                SearchReply::Page(page) => return Ok(page),
                SearchReply::IndexPending { retry_after } => {
                    self.note_throttle(retry_after);
                    let line = format!(
                        "channel not indexed yet; giving the service {}",
                        format_duration(retry_after)
                    );
                    self.log(LogLevel::Warn, &line);
                    sleep(retry_after).await;
                }
                SearchReply::RateLimited { retry_after } => {
                    self.note_throttle(retry_after);
                    self.state.search_delay += retry_after;
                    let line = format!(
                        "search throttled for {}; search delay raised to {}",
                        format_duration(retry_after),
                        format_duration(self.state.search_delay)
                    );
                    self.log(LogLevel::Warn, &line);
                    self.log_delay_stats();
                    let line = format!(
                        "cooling down for {} before retrying",
                        format_duration(retry_after * 2)
                    );
                    self.log(LogLevel::Verbose, &line);
                    sleep(retry_after * 2).await;
                }
                SearchReply::ServerError { status, body } => {
                    let line = format!("search failed with status {status}: {body}");
                    self.log(LogLevel::Error, &line);
                    return Err(RunError::Server { status, body });
                }
            }
        }
    }

    /// Deletes one message, retrying for as long as the service throttles.
    /// `Err` means the cancellation token tripped before an attempt; the
    /// message stays where it is.
    async fn delete_one(&mut self, message: &Message) -> Result<(), CancelReason> {
        loop {
            if self.ports.cancel.is_cancelled() {
                self.log(LogLevel::Error, "stopped");
                return Err(CancelReason::Stopped);
            }

            if let Some(total) = self.state.grand_total {
                let shown = self.state.deleted + 1;
                let percent = if total > 0 {
                    shown as f64 / total as f64 * 100.0
                } else {
                    100.0
                };
                let line = format!(
                    "{percent:.2}% ({shown}/{total}) deleting {} ({}): {}",
                    message.id,
                    message.timestamp,
                    message.preview_line(),
                );
                self.log(LogLevel::Debug, &line);
            }

            let begun = Instant::now();
            match self.ports.delete.delete(message.channel_id, message.id).await {
                Ok(DeleteReply::Deleted) => {
                    self.note_ping(begun.elapsed());
                    self.state.deleted += 1;
                    self.ports
                        .progress
                        .report(self.state.deleted, self.state.grand_total);
                    break;
                }
                Ok(DeleteReply::RateLimited { retry_after }) => {
                    self.note_ping(begun.elapsed());
                    self.note_throttle(retry_after);
                    self.state.delete_delay = retry_after;
                    let line = format!(
                        "delete throttled; delete delay is now {}",
                        format_duration(retry_after)
                    );
                    self.log(LogLevel::Warn, &line);
                    self.log_delay_stats();
                    let line = format!(
                        "cooling down for {} before retrying",
                        format_duration(retry_after * 2)
                    );
                    self.log(LogLevel::Verbose, &line);
                    sleep(retry_after * 2).await;
                }
                Ok(DeleteReply::ServerError { status, body }) => {
                    self.note_ping(begun.elapsed());
                    self.state.failed += 1;
                    let line = format!("delete failed with status {status}: {body}");
                    self.log(LogLevel::Error, &line);
                    let line = format!("offending message: {message:?}");
                    self.log(LogLevel::Verbose, &line);
                    break;
                }
                Err(err) => {
                    self.state.failed += 1;
                    let line = format!("delete request failed: {err}");
                    self.log(LogLevel::Error, &line);
                    let line = format!("offending message: {message:?}");
                    self.log(LogLevel::Verbose, &line);
                    break;
                }
            }
        }

        sleep(self.state.delete_delay).await;
        Ok(())
    }

    fn build_query(&self) -> SearchQuery {
        SearchQuery {
            scope: self.request.scope.clone(),
            author_id: self.request.author_id,
            min_id: self.request.min.map(SnowflakeBound::to_snowflake),
            max_id: self.request.max.map(SnowflakeBound::to_snowflake),
            content: self.request.content.clone(),
            has_link: self.request.has_link,
            has_file: self.request.has_file,
            include_nsfw: self.request.include_nsfw,
            offset: self.state.offset,
        }
    }

    /// Rough time remaining: one paced search per page plus one paced,
    /// ping-weighted delete per message. Shown to the operator; never used
    /// for control decisions.
    fn estimate_remaining(&self, total: u64) -> Duration {
        let pages = total.div_ceil(PAGE_SIZE);
        let per_message =
            self.state.delete_delay + Duration::from_millis(self.state.avg_ping_ms as u64);
        self.state.search_delay * pages as u32 + per_message * total as u32
    }

    fn preview(&self, deletable: &[Message], total: u64, eta: Duration) -> String {
        let mut text = format!(
            "Delete ~{total} messages? Estimated time: {}\n---- preview ----\n",
            format_duration(eta)
        );
        for message in deletable.iter().take(PREVIEW_LINES) {
            text.push_str(&message.preview_line());
            text.push('\n');
        }
        if deletable.len() > PREVIEW_LINES {
            text.push_str(&format!(
                "... and {} more on this page\n",
                deletable.len() - PREVIEW_LINES
            ));
        }
        text
    }

    fn note_ping(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.state.last_ping = elapsed;
        self.state.avg_ping_ms = if self.state.avg_ping_ms > 0.0 {
            self.state.avg_ping_ms * 0.9 + ms * 0.1
        } else {
            ms
        };
    }

    fn note_throttle(&mut self, retry_after: Duration) {
        self.state.throttled_count += 1;
        self.state.throttled_time += retry_after;
    }

    fn log_delay_stats(&mut self) {
        let line = format!(
            "delete delay: {}ms, search delay: {}ms, last ping: {}ms, average ping: {}ms",
            self.state.delete_delay.as_millis(),
            self.state.search_delay.as_millis(),
            self.state.last_ping.as_millis(),
            self.state.avg_ping_ms as u64,
        );
        self.log(LogLevel::Verbose, &line);
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        self.ports.logger.log(level, message);
    }

    fn finish(mut self, outcome: RunOutcome) -> RunSummary {
        let elapsed = self.state.started.elapsed();
        let line = format!("run ended; total time {}", format_duration(elapsed));
        self.log(LogLevel::Success, &line);
        self.log_delay_stats();
        let line = format!(
            "throttled {} times for a total of {}",
            self.state.throttled_count,
            format_duration(self.state.throttled_time)
        );
        self.log(LogLevel::Verbose, &line);
        let line = format!(
            "{} messages deleted, {} failed",
            self.state.deleted, self.state.failed
        );
        self.log(LogLevel::Debug, &line);

        RunSummary {
            outcome,
            deleted: self.state.deleted,
            failed: self.state.failed,
            throttled_count: self.state.throttled_count,
            throttled_time: self.state.throttled_time,
            elapsed,
            search_delay: self.state.search_delay,
            delete_delay: self.state.delete_delay,
            last_ping: self.state.last_ping,
            avg_ping: Duration::from_millis(self.state.avg_ping_ms as u64),
        }
    }
}
