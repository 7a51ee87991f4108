use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;

use crate::error::MonitorError;

const DAY: Duration = Duration::from_secs(24 * 3600);
const MAX_AVERAGING_WINDOW: Duration = Duration::from_secs(7 * 24 * 3600);
const MAX_RETENTION_HOURS: u64 = 366 * 24;

const OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorBackend {
    Simulated,
    Iio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorBackend {
    Log,
    Gpio,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub http_host: String,
    pub http_port: u16,
    pub history_file: PathBuf,
    pub sample_interval: Duration,
    pub sensor_timeout: Duration,
    pub averaging_window: Duration,
    pub max_history_points: usize,
    pub retention: Duration,
    pub prune_interval: Duration,
    pub alarm_threshold: f32,
    pub utc_offset: UtcOffset,
    pub sensor_backend: SensorBackend,
    pub iio_device: PathBuf,
    pub actuator_backend: ActuatorBackend,
    pub buzzer_gpio: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            http_host: "0.0.0.0".to_string(),
            http_port: 5000,
            history_file: PathBuf::from("historicaldata/historical_data.json"),
            sample_interval: Duration::from_secs(5),
            sensor_timeout: Duration::from_secs(3),
            averaging_window: Duration::from_secs(300),
            max_history_points: 288,
            retention: Duration::from_secs(24 * 3600),
            prune_interval: Duration::from_secs(3600),
            alarm_threshold: 38.0,
            utc_offset: UtcOffset::UTC,
            sensor_backend: SensorBackend::Simulated,
            iio_device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            actuator_backend: ActuatorBackend::Log,
            buzzer_gpio: 17,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Result<Self, MonitorError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source, falling back
    /// to defaults for anything unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MonitorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MonitorConfig::default();

        let config = MonitorConfig {
            http_host: lookup("HTTP_HOST").unwrap_or(defaults.http_host),
            http_port: parse_var(&lookup, "HTTP_PORT", defaults.http_port)?,
            history_file: lookup("HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_file),
            sample_interval: parse_secs(&lookup, "SAMPLE_INTERVAL_SECS", defaults.sample_interval)?,
            sensor_timeout: parse_secs(&lookup, "SENSOR_TIMEOUT_SECS", defaults.sensor_timeout)?,
            averaging_window: parse_secs(&lookup, "AVERAGING_WINDOW_SECS", defaults.averaging_window)?,
            max_history_points: parse_var(&lookup, "MAX_HISTORY_POINTS", defaults.max_history_points)?,
            retention: parse_retention(&lookup)?,
            prune_interval: parse_secs(&lookup, "PRUNE_INTERVAL_SECS", defaults.prune_interval)?,
            alarm_threshold: parse_var(&lookup, "ALARM_THRESHOLD", defaults.alarm_threshold)?,
            utc_offset: match lookup("UTC_OFFSET") {
                Some(value) => parse_offset(&value)?,
                None => defaults.utc_offset,
            },
            sensor_backend: match lookup("SENSOR_BACKEND").as_deref().map(str::trim) {
                None | Some("simulated") => SensorBackend::Simulated,
                Some("iio") => SensorBackend::Iio,
                Some(other) => {
                    return Err(MonitorError::Config(format!(
                        "SENSOR_BACKEND must be 'simulated' or 'iio', got '{}'",
                        other
                    )))
                }
            },
            iio_device: lookup("IIO_DEVICE")
                .map(PathBuf::from)
                .unwrap_or(defaults.iio_device),
            actuator_backend: match lookup("ACTUATOR_BACKEND").as_deref().map(str::trim) {
                None | Some("log") => ActuatorBackend::Log,
                Some("gpio") => ActuatorBackend::Gpio,
                Some(other) => {
                    return Err(MonitorError::Config(format!(
                        "ACTUATOR_BACKEND must be 'log' or 'gpio', got '{}'",
                        other
                    )))
                }
            },
            buzzer_gpio: parse_var(&lookup, "BUZZER_GPIO", defaults.buzzer_gpio)?,
        };

        if config.max_history_points == 0 {
            return Err(MonitorError::Config(
                "MAX_HISTORY_POINTS must be at least 1".into(),
            ));
        }
        check_period("SAMPLE_INTERVAL_SECS", config.sample_interval, DAY)?;
        check_period("SENSOR_TIMEOUT_SECS", config.sensor_timeout, DAY)?;
        check_period("AVERAGING_WINDOW_SECS", config.averaging_window, MAX_AVERAGING_WINDOW)?;
        check_period("PRUNE_INTERVAL_SECS", config.prune_interval, DAY)?;

        info!(
            "Configuration: history={} window={}s interval={}s threshold={:.1}°C sensor={:?} actuator={:?}",
            config.history_file.display(),
            config.averaging_window.as_secs(),
            config.sample_interval.as_secs(),
            config.alarm_threshold,
            config.sensor_backend,
            config.actuator_backend,
        );

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, MonitorError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            MonitorError::Config(format!("{} has an invalid value: '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, MonitorError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_var(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn parse_retention<F>(lookup: &F) -> Result<Duration, MonitorError>
where
    F: Fn(&str) -> Option<String>,
{
    let hours: u64 = parse_var(lookup, "RETENTION_HOURS", 24)?;
    if hours == 0 || hours > MAX_RETENTION_HOURS {
        return Err(MonitorError::Config(format!(
            "RETENTION_HOURS must be between 1 and {}, got {}",
            MAX_RETENTION_HOURS, hours
        )));
    }
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| MonitorError::Config(format!("RETENTION_HOURS is too large: {}", hours)))
}

/// Reject zero and oversized periods
fn check_period(key: &str, value: Duration, max: Duration) -> Result<(), MonitorError> {
    if value.is_zero() || value > max {
        return Err(MonitorError::Config(format!(
            "{} must be between 1 and {} seconds, got {}",
            key,
            max.as_secs(),
            value.as_secs()
        )));
    }
    Ok(())
}

fn parse_offset(value: &str) -> Result<UtcOffset, MonitorError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(value, OFFSET_FORMAT).map_err(|_| {
        MonitorError::Config(format!(
            "UTC_OFFSET must look like +02:00 or -05:30, got '{}'",
            value
        ))
    })
}
