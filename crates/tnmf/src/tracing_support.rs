//! Structured logging setup for applications using tnmf
//!
//! The library crates only emit `tracing` events; this module installs a
//! subscriber for binaries, examples and tests that want to see them.
//!
//! # Events
//!
//! - `info`: fit start and end (shapes, backend, status, final objective)
//! - `debug`: one event per iteration, the initialization seed
//! - `warn`: objective increases that stop a fit
//! - `trace`: transform cache hits
//!
//! # Example
//!
//! ```no_run
//! use tnmf::tracing_support::{init_tracing, TracingConfig, TracingFormat};
//!
//! init_tracing(TracingConfig {
//!     format: TracingFormat::Compact,
//!     filter: "tnmf_decomp=debug,info".to_string(),
//!     ..TracingConfig::default()
//! })?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directive (e.g. `RUST_LOG=tnmf_decomp=debug`)
//! - `TNMF_LOG_FORMAT`: `pretty` (default), `compact` or `json`

use std::str::FromStr;
#[cfg(feature = "tracing-subscriber")]
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "tnmf_decomp=info,tnmf_kernels=warn,warn";

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(TracingFormat::Pretty),
            "compact" => Ok(TracingFormat::Compact),
            "json" => Ok(TracingFormat::Json),
            other => Err(format!("unknown log format `{}`", other)),
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: TracingFormat,
    /// `EnvFilter` directive
    pub filter: String,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        // Unknown values fall back to pretty output
        let format = std::env::var("TNMF_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        Self {
            format,
            filter,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// Install a global subscriber
///
/// Call once at startup; fails if the filter does not parse or a global
/// subscriber is already installed.
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing(config: TracingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;
    tracing_subscriber::registry()
        .with(format_layer(&config).with_filter(filter))
        .try_init()?;
    Ok(())
}

#[cfg(feature = "tracing-subscriber")]
fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_ansi(config.with_ansi)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number);
    match config.format {
        TracingFormat::Pretty => layer.pretty().boxed(),
        TracingFormat::Compact => layer.compact().boxed(),
        TracingFormat::Json => layer.json().boxed(),
    }
}

/// No-op when the subscriber feature is disabled
#[cfg(not(feature = "tracing-subscriber"))]
pub fn init_tracing(_config: TracingConfig) -> anyhow::Result<()> {
    Ok(())
}
