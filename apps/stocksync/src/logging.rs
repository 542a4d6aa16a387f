//! Tracing setup: console output plus a dated log file.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,stocksync=debug";

/// Name of the log file written on `date`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("stocksync_{}.log", date.format("%Y-%m-%d"))
}

/// Install the global subscriber and return the path of the log file.
///
/// Runs on the same day append to the same file.
pub fn init(log_dir: &Path) -> CliResult<PathBuf> {
    fs::create_dir_all(log_dir)?;

    let path = log_dir.join(log_file_name(Local::now().date_naive()));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(log_file_name(date), "stocksync_2024-03-07.log");
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
