// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Command-line driver for the deletion engine.
//!
//! Channels are swept strictly sequentially, sharing one cancellation
//! token, so the whole batch stays under a single credential's rate-limit
//! budget.

use clap::Parser;
use cordsweep_engine::ports::{
    CancelToken, Confirm, FacadeLogger, Ports, ProgressReporter, StopFlag,
};
use cordsweep_engine::{
    engine, DeletionRequest, RunOutcome, RunSummary, SearchScope, Snowflake, SnowflakeBound,
    DEFAULT_DELETE_DELAY, DEFAULT_SEARCH_DELAY,
};
use cordsweep_rest::RestClient;
use log::{error, info, LevelFilter};
use serde::Deserialize;
use simple_logger::SimpleLogger;
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, about = "Bulk-delete your own messages from Discord channels")]
struct Arguments {
    /// Authorization token. Falls back to the config file.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Only delete messages written by this author id.
    #[arg(long)]
    author_id: Option<Snowflake>,

    /// Guild id, or `@me` to sweep direct-message channels.
    #[arg(long)]
    guild: String,

    /// Channel id to sweep; repeat to sweep several, one after another.
    #[arg(long = "channel", required_unless_present = "channels_file")]
    channels: Vec<Snowflake>,

    /// JSON file whose top-level keys are channel ids, as produced by
    /// channel-map exports.
    #[arg(long)]
    channels_file: Option<PathBuf>,

    /// Ignore messages older than this message id or `:`-separated
    /// date-time.
    #[arg(long)]
    min: Option<SnowflakeBound>,

    /// Ignore messages newer than this message id or `:`-separated
    /// date-time.
    #[arg(long)]
    max: Option<SnowflakeBound>,

    /// Only messages containing this text.
    #[arg(long)]
    content: Option<String>,

    /// Only messages containing a link.
    #[arg(long)]
    has_link: bool,

    /// Only messages containing an attached file.
    #[arg(long)]
    has_file: bool,

    /// Search inside age-restricted channels too.
    #[arg(long)]
    include_nsfw: bool,

    /// Also delete pinned messages.
    #[arg(long)]
    include_pinned: bool,

    /// Milliseconds to pause between search pages.
    #[arg(long)]
    search_delay: Option<u64>,

    /// Milliseconds to pause between deletions.
    #[arg(long)]
    delete_delay: Option<u64>,

    /// Skip the interactive confirmation.
    #[arg(long, short = 'y')]
    yes: bool,

    /// TOML file providing the token and default delays.
    #[arg(long)]
    config: Option<PathBuf>,

    /// More `-v`s, more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    token: Option<String>,
    search_delay: Option<u64>,
    delete_delay: Option<u64>,
}

/// Confirmation port of the CLI: a stdin prompt, or a rubber stamp when
/// `--yes` was given.
enum CliConfirm {
    Prompt,
    Always,
}

impl Confirm for CliConfirm {
    async fn confirm(&mut self, preview: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Prompt => {
                let preview = preview.to_owned();
                // Reading stdin blocks, so keep it off the runtime threads.
                tokio::task::spawn_blocking(move || {
                    println!("{preview}");
                    print!("proceed? [y/N] ");
                    let _ = io::stdout().flush();
                    let mut answer = String::new();
                    if io::stdin().lock().read_line(&mut answer).is_err() {
                        return false;
                    }
                    matches!(answer.trim(), "y" | "Y" | "yes")
                })
                .await
                .unwrap_or(false)
            }
        }
    }
}

/// Renders progress as an occasional info line.
struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn report(&mut self, current: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|total| *total > 0) {
            info!("progress: {current}/{total} ({}%)", current * 100 / total);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Making errors (unbalanced blocks) inside a `tokio::main` produces
    // confusing diagnostics. So the "real main" is wrapped by this.
    real_main().await
}

async fn real_main() -> ExitCode {
    let args = Arguments::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if SimpleLogger::new().with_level(level).init().is_err() {
        eprintln!("failed to initialise logging");
        return ExitCode::FAILURE;
    }

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("cannot read config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let Some(token) = args.token.clone().or(config.token) else {
        error!("no token given; use --token, DISCORD_TOKEN or the config file");
        return ExitCode::FAILURE;
    };

    let guild_id = if args.guild == "@me" {
        None
    } else {
        match args.guild.parse::<Snowflake>() {
            Ok(id) => Some(id),
            Err(err) => {
                error!("invalid guild id {:?}: {err}", args.guild);
                return ExitCode::FAILURE;
            }
        }
    };

    let channels = match channel_list(&args) {
        Ok(channels) if channels.is_empty() => {
            error!("no channels to sweep");
            return ExitCode::FAILURE;
        }
        Ok(channels) => channels,
        Err(err) => {
            error!("cannot read channel list: {err}");
            return ExitCode::FAILURE;
        }
    };

    let search_delay = args
        .search_delay
        .or(config.search_delay)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_SEARCH_DELAY);
    let delete_delay = args
        .delete_delay
        .or(config.delete_delay)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_DELETE_DELAY);

    let cancel = StopFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received; finishing the current request");
                cancel.stop();
            }
        });
    }

    let rest = RestClient::new(token);
    let mut ports = Ports {
        search: rest.clone(),
        delete: rest,
        confirm: if args.yes {
            CliConfirm::Always
        } else {
            CliConfirm::Prompt
        },
        cancel: cancel.clone(),
        logger: FacadeLogger,
        progress: ConsoleProgress,
    };

    let mut fatal = false;
    for channel_id in channels {
        if cancel.is_cancelled() {
            info!("stopping before channel {channel_id}");
            break;
        }

        info!("sweeping channel {channel_id}");
        let mut request = DeletionRequest::new(match guild_id {
            Some(guild_id) => SearchScope::Guild {
                guild_id,
                channel_id,
            },
            None => SearchScope::DirectMessages { channel_id },
        });
        request.author_id = args.author_id;
        request.min = args.min;
        request.max = args.max;
        request.content = args.content.clone();
        request.has_link = args.has_link;
        request.has_file = args.has_file;
        request.include_nsfw = args.include_nsfw;
        request.include_pinned = args.include_pinned;
        request.search_delay = search_delay;
        request.delete_delay = delete_delay;

        let summary = engine::run(request, &mut ports).await;
        report(channel_id, &summary);
        fatal |= summary.outcome.is_fatal();
    }

    if fatal {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report(channel_id: Snowflake, summary: &RunSummary) {
    match &summary.outcome {
        RunOutcome::Completed => info!(
            "channel {channel_id}: {} deleted, {} failed",
            summary.deleted, summary.failed
        ),
        RunOutcome::Cancelled(reason) => info!(
            "channel {channel_id}: {reason} after {} deletions",
            summary.deleted
        ),
        RunOutcome::Failed(err) => error!(
            "channel {channel_id}: {err} ({} deleted before the failure)",
            summary.deleted
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<ConfigFile, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(ConfigFile::default());
    };
    Ok(toml::from_str(&fs::read_to_string(path)?)?)
}

fn channel_list(args: &Arguments) -> Result<Vec<Snowflake>, Box<dyn Error>> {
    let mut channels = args.channels.clone();
    if let Some(path) = &args.channels_file {
        channels.extend(channels_from_json(&fs::read_to_string(path)?)?);
    }
    Ok(channels)
}

/// Channel ids from an exported channel map: a JSON object whose keys are
/// the ids.
fn channels_from_json(text: &str) -> Result<Vec<Snowflake>, Box<dyn Error>> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    let mut channels = Vec::with_capacity(map.len());
    for key in map.keys() {
        channels.push(key.parse()?);
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_maps_yield_their_keys() {
        let channels =
            channels_from_json(r#"{"200": {"name": "general"}, "201": null}"#).unwrap();
        assert_eq!(channels, vec![Snowflake::new(200), Snowflake::new(201)]);
        assert!(channels_from_json(r#"{"general": {}}"#).is_err());
    }

    #[test]
    fn config_files_are_partial() {
        let config: ConfigFile = toml::from_str("token = \"secret\"").unwrap();
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.search_delay, None);

        let config: ConfigFile = toml::from_str("search_delay = 250\ndelete_delay = 1500").unwrap();
        assert_eq!(config.search_delay, Some(250));
        assert_eq!(config.delete_delay, Some(1500));
    }
}
