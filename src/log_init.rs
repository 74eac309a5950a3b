#![allow(dead_code)]
use chrono::Local;
use colored::Colorize;
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Initialize logging into a file with timestamped, colored records.
///
/// # Arguments
///
/// * `log_path`: where the log file goes
/// * `level`: log level filter
///
/// # Examples
///
/// ```
/// init_logger_with_path("log.txt", LevelFilter::Info);
/// ```
pub(crate) fn init_logger_with_path(log_path: impl AsRef<Path>, level: LevelFilter) {
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] [{}:{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level().to_string().color(match record.level() {
                    log::Level::Trace => "blue",
                    log::Level::Debug => "cyan",
                    log::Level::Info => "green",
                    log::Level::Warn => "yellow",
                    log::Level::Error => "red",
                }),
                record.target(),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(log_path)
                .expect("unable to open the log file"),
        )))
        .init();
}

/// Initialize console logging at the Info level.
pub(crate) fn init_logger_with_default() {
    env_logger::builder().filter_level(LevelFilter::Info).init();
}
