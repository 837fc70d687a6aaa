//! Tracing setup: stderr always, plus an optional non-blocking rolling
//! file layer under the process-wide log folder (spec §3's
//! `CLOUDXFER_LOG_LOCATION`). Mirrors the donor's `init_logging`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Returns the `WorkerGuard` for the file layer, if one was set up; the
/// caller must hold it for the process lifetime or buffered lines are
/// dropped on exit.
pub fn init_logging(log_dir: &camino::Utf8Path, job_id: cloudxfer_core::JobId) -> Option<WorkerGuard> {
    let stderr_logs = fmt::Layer::new().with_target(false).with_writer(std::io::stderr);

    let disable_file_logging = std::env::var("CLOUDXFER_DISABLE_FILE_LOGGING")
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if disable_file_logging {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(stderr_logs)
            .init();
        return None;
    }

    let file_name = format!("{job_id}.log");
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir.as_std_path(), file_name));
    let file_logs = fmt::Layer::new()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_logs)
        .with(file_logs)
        .init();
    Some(guard)
}
