//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use storyloom_task_store::retention::RetentionPolicy;

use crate::error::AppError;
use crate::telemetry::TelemetryConfig;

/// Default number of stories a single batch analysis may cover.
pub const DEFAULT_BATCH_MAX_STORIES: usize = 3;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address to bind.
    pub addr: SocketAddr,
    /// How long and how many finished tasks are kept.
    pub retention: RetentionPolicy,
    /// Delay between two retention sweeps.
    pub sweep_interval: Duration,
    /// Upper bound on stories per batch analysis.
    pub batch_max_stories: usize,
    /// Origins allowed to make cross-origin requests. Empty allows any.
    pub cors_origins: Vec<HeaderValue>,
    /// Trace export settings.
    pub telemetry: TelemetryConfig,
}

impl ApiConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `STORYLOOM_TASK_MAX_AGE_SECS` | `86400` |
    /// | `STORYLOOM_TASK_MAX_ENTRIES` | `10000` |
    /// | `STORYLOOM_RETENTION_SWEEP_SECS` | `300` |
    /// | `STORYLOOM_BATCH_MAX_STORIES` | `3` |
    /// | `STORYLOOM_CORS_ORIGINS` | unset (any origin) |
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable or `None` if it is unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        let max_age_secs: u64 = parse_or(&lookup, "STORYLOOM_TASK_MAX_AGE_SECS", 86_400)?;
        let max_entries: usize = parse_or(&lookup, "STORYLOOM_TASK_MAX_ENTRIES", 10_000)?;
        let sweep_secs: u64 = parse_or(&lookup, "STORYLOOM_RETENTION_SWEEP_SECS", 300)?;
        if sweep_secs == 0 {
            return Err(AppError::Config(
                "STORYLOOM_RETENTION_SWEEP_SECS must be greater than zero".into(),
            ));
        }
        let batch_max_stories: usize = parse_or(
            &lookup,
            "STORYLOOM_BATCH_MAX_STORIES",
            DEFAULT_BATCH_MAX_STORIES,
        )?;
        if batch_max_stories == 0 {
            return Err(AppError::Config(
                "STORYLOOM_BATCH_MAX_STORIES must be greater than zero".into(),
            ));
        }

        let cors_origins = parse_origins(lookup("STORYLOOM_CORS_ORIGINS").as_deref())?;

        Ok(Self {
            addr,
            retention: RetentionPolicy {
                max_age: Duration::from_secs(max_age_secs),
                max_entries,
            },
            sweep_interval: Duration::from_secs(sweep_secs),
            batch_max_stories,
            cors_origins,
            telemetry: TelemetryConfig::from_lookup(&lookup),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
    }
}

/// Splits a comma-separated origin list, skipping blank items.
fn parse_origins(raw: Option<&str>) -> Result<Vec<HeaderValue>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| {
                AppError::Config(format!(
                    "STORYLOOM_CORS_ORIGINS has an invalid origin ({origin:?}): {e}"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ApiConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.retention.max_age, Duration::from_secs(86_400));
        assert_eq!(config.retention.max_entries, 10_000);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.batch_max_stories, 3);
        assert!(config.cors_origins.is_empty());
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_values_are_read_from_environment() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("STORYLOOM_TASK_MAX_AGE_SECS", "60"),
            ("STORYLOOM_TASK_MAX_ENTRIES", "5"),
            ("STORYLOOM_BATCH_MAX_STORIES", "10"),
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.retention.max_age, Duration::from_secs(60));
        assert_eq!(config.retention.max_entries, 5);
        assert_eq!(config.batch_max_stories, 10);
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        let result = config_from(&[("PORT", "eighty")]);

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = config_from(&[("STORYLOOM_BATCH_MAX_STORIES", "0")]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_cors_origins_are_split_on_commas() {
        let config = config_from(&[(
            "STORYLOOM_CORS_ORIGINS",
            "https://app.example, http://localhost:5173,",
        )])
        .unwrap();

        assert_eq!(
            config.cors_origins,
            vec![
                HeaderValue::from_static("https://app.example"),
                HeaderValue::from_static("http://localhost:5173"),
            ]
        );
    }

    #[test]
    fn test_unprintable_cors_origin_is_rejected() {
        let result = config_from(&[("STORYLOOM_CORS_ORIGINS", "https://bad\u{7f}.example")]);

        assert!(
            matches!(result, Err(AppError::Config(msg)) if msg.contains("STORYLOOM_CORS_ORIGINS"))
        );
    }
}
