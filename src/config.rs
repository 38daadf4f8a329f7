use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::payment::gateway::RazorpayCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other}, expected compact or json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub nearby_candidate_limit: usize,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    pub razorpay_api_base: String,
    pub gateway_timeout: Duration,
    pub presence_timeout: Duration,
    pub presence_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let nearby_candidate_limit = require_positive(
            "NEARBY_CANDIDATE_LIMIT",
            parse_or_default("NEARBY_CANDIDATE_LIMIT", 10usize)?,
        )?;
        let event_buffer_size = require_positive(
            "EVENT_BUFFER_SIZE",
            parse_or_default("EVENT_BUFFER_SIZE", 1024usize)?,
        )?;
        let presence_sweep_secs = require_positive(
            "PRESENCE_SWEEP_INTERVAL_SECS",
            parse_or_default("PRESENCE_SWEEP_INTERVAL_SECS", 30u64)?,
        )?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size,
            nearby_candidate_limit,
            razorpay_key_id: non_empty("RAZORPAY_KEY_ID"),
            razorpay_key_secret: non_empty("RAZORPAY_KEY_SECRET"),
            razorpay_api_base: env::var("RAZORPAY_API_BASE")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            gateway_timeout: Duration::from_secs(parse_or_default("GATEWAY_TIMEOUT_SECS", 15)?),
            presence_timeout: Duration::from_secs(parse_or_default("PRESENCE_TIMEOUT_SECS", 300)?),
            presence_sweep_interval: Duration::from_secs(presence_sweep_secs),
        })
    }

    /// Both halves of the key pair, or nothing.
    pub fn razorpay_credentials(&self) -> Option<RazorpayCredentials> {
        match (&self.razorpay_key_id, &self.razorpay_key_secret) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayCredentials {
                key_id: key_id.clone(),
                key_secret: key_secret.clone(),
            }),
            _ => None,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn require_positive<T>(key: &str, value: T) -> Result<T, AppError>
where
    T: Default + PartialOrd,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(AppError::Internal(format!("invalid {key}: must be > 0")))
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{require_positive, Config, LogFormat};
    use crate::error::AppError;

    fn config(key_id: Option<&str>, key_secret: Option<&str>) -> Config {
        Config {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 16,
            nearby_candidate_limit: 10,
            razorpay_key_id: key_id.map(str::to_string),
            razorpay_key_secret: key_secret.map(str::to_string),
            razorpay_api_base: "https://api.razorpay.com".to_string(),
            gateway_timeout: Duration::from_secs(15),
            presence_timeout: Duration::from_secs(300),
            presence_sweep_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn credentials_need_both_keys() {
        assert!(config(Some("rzp_test"), None).razorpay_credentials().is_none());
        assert!(config(None, Some("secret")).razorpay_credentials().is_none());

        let credentials = config(Some("rzp_test"), Some("secret"))
            .razorpay_credentials()
            .unwrap();
        assert_eq!(credentials.key_id, "rzp_test");
        assert_eq!(credentials.key_secret, "secret");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(matches!(
            require_positive("EVENT_BUFFER_SIZE", 0usize),
            Err(AppError::Internal(msg)) if msg.contains("EVENT_BUFFER_SIZE")
        ));
        assert!(require_positive("PRESENCE_SWEEP_INTERVAL_SECS", 0u64).is_err());
        assert_eq!(require_positive("EVENT_BUFFER_SIZE", 1024usize).unwrap(), 1024);
    }
}
