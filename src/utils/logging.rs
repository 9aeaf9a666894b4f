use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
pub const DAEMON_PREFIX: &str = "daemon";

const KEPT_LOG_FILES: usize = 5;

pub struct LoggingOptions<'a> {
    /// Prefix of the rotated file names, one of [CLI_PREFIX] or [DAEMON_PREFIX].
    pub prefix: &'a str,
    pub level: Option<LevelFilter>,
    /// Mirror everything to stderr. Stdout is kept clean for command output.
    pub console: bool,
}

/// Diagnostics go into daily rotated files under `<application dir>/logs`. This is separate from
/// the audit log, which is meant for the user and never rotated.
pub fn enable_logging(application_dir: &Path, options: LoggingOptions) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(options.prefix)
        .build(application_dir.join("logs"))?;

    let console = options.console;
    let stderr = std::io::stderr.with_filter(move |_| console);

    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(options.level))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stderr.and(appender))
        .pretty()
        .init();
    Ok(())
}

/// Only this crate's events pass. Explicit level wins over `RUST_LOG`, `debug` is the fallback.
fn crate_filter(level: Option<LevelFilter>) -> EnvFilter {
    let level = level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".into()));
    EnvFilter::new(format!(
        "{}={level}",
        env!("CARGO_PKG_NAME").replace("-", "_"),
    ))
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(Some(LevelFilter::TRACE)))
        .with_test_writer()
        .pretty()
        .init()
});
