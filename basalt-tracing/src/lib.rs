//! This crate configures tracing; because the basalt crates perform logging
//! through the tracing subsystem, logging is configured here as well.
//!
//! For most purposes, you can use the normal set of primitives from the
//! [tracing] family of crates, such as the
//! [`#[instrument]`](tracing::instrument) macro, and simply allow this crate
//! to deal with configuration.
//!
//! Binaries embedding the planner flatten [`Options`] into their own `clap`
//! command and call [`Options::init`] once, early in `main`:
//!
//! ```rust,no_run
//! use clap::Parser;
//!
//! #[derive(Debug, Parser)]
//! struct Command {
//!     #[command(flatten)]
//!     logging: basalt_tracing::Options,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let command = Command::parse();
//!     command.logging.init()?;
//!     Ok(())
//! }
//! ```
//!
//! Tests call [`init_test_logging`] instead.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod error;
pub use error::Error;
mod logformat;
pub use logformat::LogFormat;

fn warn_if_debug_build() {
    #[cfg(debug_assertions)]
    tracing::warn!("Running a debug build")
}

#[derive(Debug, Args)]
#[group(id = "logging")]
pub struct Options {
    /// Optional path of a file to write logs to instead of stderr. The
    /// process must have write permissions to it; file output is never
    /// colored.
    #[arg(long, env = "LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Format to use when emitting log events.
    #[arg(long, env = "LOG_FORMAT", default_value = "full", value_enum)]
    pub log_format: LogFormat,

    /// Disable colors in all log output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log level filter for spans and events. The log level filter string is
    /// a comma separated list of directives.
    /// See [`tracing_subscriber::EnvFilter`] for full documentation on the
    /// directive syntax.
    ///
    /// Examples:
    ///
    /// Log at INFO level for all crates and dependencies.
    /// ```bash
    /// LOG_LEVEL=info
    /// ```
    ///
    /// Log at INFO level generally but at TRACE level for the rewrite
    /// driver.
    /// ```bash
    /// LOG_LEVEL=info,basalt_optimizer=trace
    /// ```
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_path: None,
            log_format: LogFormat::Full,
            no_color: false,
            log_level: "info".to_owned(),
        }
    }
}

// Initializes the subscriber for self.log_format. This is a macro rather
// than a fn because the subscriber builder embeds its layering types into
// the type itself.
macro_rules! log_format_init {
    ($self:expr, $subscriber:expr, $fmt_layer:expr) => {
        match $self.log_format {
            LogFormat::Compact => $subscriber.with($fmt_layer.compact()).init(),
            LogFormat::Full => $subscriber.with($fmt_layer).init(),
            LogFormat::Pretty => $subscriber.with($fmt_layer.pretty()).init(),
            LogFormat::Json => $subscriber
                .with($fmt_layer.json().with_current_span(true))
                .init(),
        }
    };
}

impl Options {
    /// Installs the global subscriber described by these options.
    ///
    /// Call this once per process; it panics if a global subscriber is
    /// already set. Events go to stderr, or to `log_path` if one is
    /// configured.
    pub fn init(&self) -> Result<(), Error> {
        let subscriber =
            tracing_subscriber::registry().with(EnvFilter::try_new(&self.log_level)?);
        match &self.log_path {
            Some(path) => {
                let file = File::create(path)?;
                let fmt_layer = fmt::layer().with_ansi(false).with_writer(Arc::new(file));
                log_format_init!(self, subscriber, fmt_layer);
            }
            None => {
                let fmt_layer = fmt::layer().with_ansi(!self.no_color);
                log_format_init!(self, subscriber, fmt_layer);
            }
        }

        warn_if_debug_build();

        Ok(())
    }
}

/// Configure the global tracing subscriber for logging inside of tests
pub fn init_test_logging() {
    // This errors out if it's already been called within the scope of a
    // process, which we don't care about, so we just discard the result
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("LOG_LEVEL"))
        .with_test_writer()
        .try_init();
}
