//! Native log subscriber for the CLI and local runs

use tracing_subscriber::{fmt, EnvFilter};

/// Env var selecting the stderr line format.
pub const LOG_FORMAT_ENV: &str = "BEEDAPP_LOG_JSON";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `1` or `true` selects JSON lines; anything else (or unset) is pretty.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case("true") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Filter used when `RUST_LOG` is unset: session transitions at info, dependencies at warn.
pub fn default_directives() -> String {
    format!("warn,{}=info", env!("CARGO_CRATE_NAME"))
}

/// Install the stderr subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives()));
    let format = LogFormat::from_setting(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}
