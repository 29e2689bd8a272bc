// Copyright (c) Contributors to the stackhost project.
// SPDX-License-Identifier: Apache-2.0

//! Log output for the command line.
//!
//! Verbosity flags raise the level of the stackhost crates only. Anything
//! else stays at warnings unless a filter is given explicitly.

use clap::{Args, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose level follows the verbosity flags.
const OWN_TARGETS: &[&str] = &["stackhost", "stackhost_cli"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Timestamps, levels and targets
    #[default]
    Full,
    /// Levels and messages only
    Compact,
}

#[derive(Debug, Args)]
pub struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[clap(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Filter directives that replace the verbosity flags, eg: stackhost::deployment=trace
    #[clap(long, global = true, env = "STACKHOST_LOG", value_name = "DIRECTIVES")]
    log_filter: Option<String>,

    /// How log lines are laid out on stderr
    #[clap(long, global = true, value_enum, default_value_t)]
    log_format: LogFormat,
}

impl Logging {
    pub fn level(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        }
    }

    /// The filter directives in effect.
    pub fn directives(&self) -> String {
        if let Some(filter) = self.log_filter.as_deref().filter(|f| !f.trim().is_empty()) {
            return filter.to_string();
        }
        let level = self.level().to_string().to_ascii_lowercase();
        let others = if self.quiet { "error" } else { "warn" };
        std::iter::once(others.to_string())
            .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Install the global subscriber, writing to stderr.
    pub fn init(&self) -> miette::Result<()> {
        let filter = EnvFilter::try_new(self.directives())
            .map_err(|err| miette::miette!("invalid log filter: {err}"))?;
        let registry = tracing_subscriber::registry().with(filter);
        let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        let installed = match self.log_format {
            LogFormat::Full => registry.with(layer).try_init(),
            LogFormat::Compact => registry
                .with(layer.compact().without_time().with_target(false))
                .try_init(),
        };
        installed.map_err(|err| miette::miette!("logging is already set up: {err}"))
    }
}

#[cfg(test)]
#[path = "./logging_test.rs"]
mod logging_test;
