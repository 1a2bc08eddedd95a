//! Structured logging setup
//!
//! Logs go to stderr so that answers on stdout stay pipeable. The filter
//! comes from `RUST_LOG` when set, otherwise from configuration adjusted by
//! the command-line verbosity.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Verbosity;
use crate::errors::{RagError, Result};

/// HTTP and document-parsing crates are noisy below warn
pub const DEFAULT_LOG_FILTER: &str =
    "warn,ragbuddy=info,hyper=warn,h2=warn,reqwest=warn,tower=warn,html5ever=error,selectors=error,pdf_extract=error,lopdf=error";

/// Filter directives for a configured base and a verbosity flag
pub fn filter_for(base: &str, verbosity: Verbosity) -> String {
    match verbosity {
        Verbosity::Quiet => "error".to_string(),
        Verbosity::Normal => base.to_string(),
        Verbosity::Verbose => format!("{},ragbuddy=debug", base),
        Verbosity::VeryVerbose => format!("{},ragbuddy=trace", base),
    }
}

fn env_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .map_err(|e| RagError::Config(format!("invalid log filter {:?}: {}", directives, e)))
}

/// Install the global subscriber; fails if one is already set
pub fn init(directives: &str) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(directives)?)
        .try_init()
        .map_err(|e| RagError::Config(format!("failed to initialize tracing: {}", e)))
}
