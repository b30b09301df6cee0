//! Runtime configuration.
//!
//! Values come from command-line flags, falling back to `COURSE_BILLING_*`
//! environment variables and then to the defaults below. Library callers
//! that do not go through the CLI use [`BillingConfig::default`].

use crate::error::{BillingError, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_RENTAL_PERIOD_DAYS: i64 = 7;
pub const DEFAULT_EXPIRY_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_NOTIFY_INTERVAL_SECS: u64 = 3600;
pub const MAX_RENTAL_PERIOD_DAYS: i64 = 3650;
pub const MAX_EXPIRY_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct BillingConfig {
    /// Length of a rental window in days
    #[arg(long, env = "COURSE_BILLING_RENTAL_PERIOD_DAYS", default_value_t = DEFAULT_RENTAL_PERIOD_DAYS)]
    pub rental_period_days: i64,

    /// How far ahead the expiry notifier looks, in hours
    #[arg(long, env = "COURSE_BILLING_EXPIRY_WINDOW_HOURS", default_value_t = DEFAULT_EXPIRY_WINDOW_HOURS)]
    pub expiry_window_hours: i64,

    /// Seconds between two scheduled notifier runs
    #[arg(long, env = "COURSE_BILLING_NOTIFY_INTERVAL_SECS", default_value_t = DEFAULT_NOTIFY_INTERVAL_SECS)]
    pub notify_interval_secs: u64,

    /// Fallback log filter when RUST_LOG is unset
    #[arg(long, env = "COURSE_BILLING_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "COURSE_BILLING_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "COURSE_BILLING_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            rental_period_days: DEFAULT_RENTAL_PERIOD_DAYS,
            expiry_window_hours: DEFAULT_EXPIRY_WINDOW_HOURS,
            notify_interval_secs: DEFAULT_NOTIFY_INTERVAL_SECS,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            db_path: None,
        }
    }
}

impl BillingConfig {
    /// Rental window length, clamped to the accepted range.
    pub fn rental_period(&self) -> chrono::Duration {
        chrono::Duration::days(self.rental_period_days.clamp(1, MAX_RENTAL_PERIOD_DAYS))
    }

    /// Notifier look-ahead, clamped to the accepted range.
    pub fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expiry_window_hours.clamp(1, MAX_EXPIRY_WINDOW_HOURS))
    }

    pub fn notify_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notify_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_RENTAL_PERIOD_DAYS).contains(&self.rental_period_days) {
            return Err(BillingError::ValidationError(format!(
                "Rental period must be between 1 and {MAX_RENTAL_PERIOD_DAYS} days"
            )));
        }
        if !(1..=MAX_EXPIRY_WINDOW_HOURS).contains(&self.expiry_window_hours) {
            return Err(BillingError::ValidationError(format!(
                "Expiry window must be between 1 and {MAX_EXPIRY_WINDOW_HOURS} hours"
            )));
        }
        if self.notify_interval_secs == 0 {
            return Err(BillingError::ValidationError(
                "Notify interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
