//! Logging setup for the `textpad` binary.
//!
//! The console layer writes to stderr and follows `RUST_LOG` (default `warn`).
//! When a configuration directory is known, a second layer writes
//! `logs/textpad.<date>.log` with daily rotation, keeping the last three files.
//! The file layer records `info` and above, or `debug` with `--debug` or a
//! non-empty `TEXTPAD_DEBUG`.

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEBUG_ENV: &str = "TEXTPAD_DEBUG";

const LOG_PREFIX: &str = "textpad";
const LOG_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 3;

/// 安裝全域 subscriber；只應呼叫一次。 / Installs the global subscriber; call once at startup.
pub fn init(log_dir: Option<&Path>, debug: bool) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_filter(console_filter);

    let file_level = if debug || debug_requested() { "debug" } else { "info" };
    let file_layer = log_dir.and_then(|dir| match file_appender(dir) {
        Ok(appender) => Some(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new(file_level)),
        ),
        Err(err) => {
            eprintln!("Warning: could not initialize file logging: {err:#}");
            None
        }
    });

    // A subscriber installed by an embedding process stays in charge.
    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn debug_requested() -> bool {
    env::var_os(DEBUG_ENV).is_some_and(|value| !value.is_empty())
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))
}
