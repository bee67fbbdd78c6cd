//! Stderr logger for the capture tools.
//!
//! Lines look like `[  1.250s  INFO procam_calib::camera] 6 ids 5 captures`:
//! time since installation, level, module, message. Install it once with
//! [`init_with_level`], or with [`init_from_env`] to read the level from
//! `PROCAM_LOG`. The `tracing` feature adds [`init_tracing`].

use std::fmt::Arguments;
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, fmt::format::FmtSpan, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log level (`error` .. `trace`, `off`).
pub const LOG_ENV: &str = "PROCAM_LOG";

struct StderrLogger {
    max: LevelFilter,
    since: Instant,
}

fn format_line(secs: f64, level: Level, target: &str, args: &Arguments<'_>) -> String {
    format!("[{secs:7.3}s {level:>5} {target}] {args}")
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.since.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static INSTALLED: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger at `level`.
///
/// Only the first call installs anything; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let logger = INSTALLED.get_or_init(|| StderrLogger {
        max: level,
        since: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Parse a level name; unknown or empty values fall back to `default`.
pub fn level_from_str(raw: Option<&str>, default: LevelFilter) -> LevelFilter {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| LevelFilter::from_str(s).ok())
        .unwrap_or(default)
}

/// Install the stderr logger at the level named by `PROCAM_LOG` (default `info`).
pub fn init_from_env() -> Result<(), log::SetLoggerError> {
    let raw = std::env::var(LOG_ENV).ok();
    init_with_level(level_from_str(raw.as_deref(), LevelFilter::Info))
}

/// Install a `tracing` subscriber filtered by `PROCAM_LOG`; spans report
/// their duration on close. `json` switches to one JSON object per line.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
