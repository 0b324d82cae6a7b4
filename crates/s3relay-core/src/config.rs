//! Runtime configuration for a relay run
//!
//! Built once at startup and handed by reference to the limiters and the
//! pipeline. Every check happens here, before the first transfer starts.

use crate::error::RelayError;
use s3relay_types::{StoreSettings, ThrottleMode};
use std::time::Duration;

/// Pause between two consecutive items, on top of the byte-rate limits
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_secs(1);

/// Connect timeout for origin requests. Bodies are not bounded in time,
/// a throttled download can legitimately run for a long while.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated configuration for the transfer engine
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Destination bucket
    pub store: StoreSettings,
    /// Download ceiling in bytes per second
    pub download_rate: u64,
    /// Upload ceiling in bytes per second
    pub upload_rate: u64,
    pub throttle_mode: ThrottleMode,
    pub item_delay: Duration,
    pub user_agent: String,
    pub connect_timeout: Duration,
}

impl RelayConfig {
    /// Create a configuration with default pacing options
    pub fn new(store: StoreSettings, download_rate: u64, upload_rate: u64) -> Result<Self, RelayError> {
        let config = Self {
            store,
            download_rate,
            upload_rate,
            throttle_mode: ThrottleMode::default(),
            item_delay: DEFAULT_ITEM_DELAY,
            user_agent: format!("s3relay/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_throttle_mode(mut self, mode: ThrottleMode) -> Self {
        self.throttle_mode = mode;
        self
    }

    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Check every field that would otherwise fail mid-run
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.download_rate == 0 {
            return Err(RelayError::Configuration(
                "download rate must be greater than zero".into(),
            ));
        }
        if self.upload_rate == 0 {
            return Err(RelayError::Configuration(
                "upload rate must be greater than zero".into(),
            ));
        }

        let required = [
            ("store endpoint", &self.store.endpoint),
            ("bucket name", &self.store.bucket),
            ("access key", &self.store.access_key),
            ("secret key", &self.store.secret_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(RelayError::Configuration(format!("{} is not set", name)));
            }
        }

        url::Url::parse(&self.store.endpoint).map_err(|e| {
            RelayError::Configuration(format!(
                "invalid store endpoint '{}': {}",
                self.store.endpoint, e
            ))
        })?;

        Ok(())
    }
}

/// Resolve the download and upload ceilings.
///
/// A phase-specific rate wins over the shared network rate. Each phase must
/// end up with a rate, otherwise the run is rejected.
pub fn resolve_rates(
    network: Option<&str>,
    download: Option<&str>,
    upload: Option<&str>,
) -> Result<(u64, u64), RelayError> {
    let pick = |phase: &str, specific: Option<&str>| -> Result<u64, RelayError> {
        match specific.or(network) {
            Some(value) => parse_rate(value),
            None => Err(RelayError::Configuration(format!(
                "no {} rate configured (set a {} rate or a network rate)",
                phase, phase
            ))),
        }
    };

    Ok((pick("download", download)?, pick("upload", upload)?))
}

/// Parse a bandwidth string into bytes per second.
///
/// A bare number is bytes per second. Byte units (`KB/s`, `MiB/s`, ...) and
/// bit units (`kbps`, `Mbps`, `Gbps`) are accepted, case-insensitively.
///
/// ```
/// use s3relay_core::parse_rate;
///
/// assert_eq!(parse_rate("2048").unwrap(), 2048);
/// assert_eq!(parse_rate("8 Mbps").unwrap(), 1_000_000);
/// assert_eq!(parse_rate("1MiB/s").unwrap(), 1_048_576);
/// ```
pub fn parse_rate(input: &str) -> Result<u64, RelayError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| RelayError::Configuration(format!("unparsable rate '{}'", input)))?;

    let factor = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" | "b/s" => 1.0,
        "kb" | "kb/s" => 1_000.0,
        "mb" | "mb/s" => 1_000_000.0,
        "gb" | "gb/s" => 1_000_000_000.0,
        "kib" | "kib/s" => 1_024.0,
        "mib" | "mib/s" => 1_048_576.0,
        "gib" | "gib/s" => 1_073_741_824.0,
        "kbps" | "kbit/s" => 125.0,
        "mbps" | "mbit/s" => 125_000.0,
        "gbps" | "gbit/s" => 125_000_000.0,
        other => {
            return Err(RelayError::Configuration(format!(
                "unknown rate unit '{}' in '{}'",
                other, input
            )))
        }
    };

    let bytes_per_second = value * factor;
    if !bytes_per_second.is_finite() || bytes_per_second < 1.0 {
        return Err(RelayError::Configuration(format!(
            "rate '{}' must be at least 1 byte per second",
            input
        )));
    }

    Ok(bytes_per_second as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreSettings {
        StoreSettings {
            endpoint: "https://account.r2.cloudflarestorage.com".into(),
            region: "auto".into(),
            bucket: "media".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            path_style: false,
        }
    }

    #[test]
    fn test_parse_rate_units() {
        assert_eq!(parse_rate("1500").unwrap(), 1500);
        assert_eq!(parse_rate("10 KB/s").unwrap(), 10_000);
        assert_eq!(parse_rate("2kib/s").unwrap(), 2048);
        assert_eq!(parse_rate("1.5 MB/s").unwrap(), 1_500_000);
        assert_eq!(parse_rate("100Mbps").unwrap(), 12_500_000);
        assert_eq!(parse_rate("1 Gbps").unwrap(), 125_000_000);
        assert_eq!(parse_rate("64 kbps").unwrap(), 8_000);
    }

    #[test]
    fn test_parse_rate_rejects_non_positive() {
        assert!(matches!(parse_rate("0"), Err(RelayError::Configuration(_))));
        assert!(matches!(parse_rate("-10"), Err(RelayError::Configuration(_))));
        assert!(matches!(parse_rate("0.5"), Err(RelayError::Configuration(_))));
    }

    #[test]
    fn test_parse_rate_rejects_garbage() {
        assert!(parse_rate("").is_err());
        assert!(parse_rate("fast").is_err());
        assert!(parse_rate("10 furlongs").is_err());
    }

    #[test]
    fn test_resolve_rates_prefers_specific() {
        let (down, up) = resolve_rates(Some("1000"), Some("2000"), None).unwrap();
        assert_eq!(down, 2000);
        assert_eq!(up, 1000);
    }

    #[test]
    fn test_resolve_rates_requires_each_phase() {
        let err = resolve_rates(None, Some("2000"), None).unwrap_err();
        assert!(err.to_string().contains("upload"));
    }

    #[test]
    fn test_config_rejects_zero_rate() {
        assert!(RelayConfig::new(store(), 0, 100).is_err());
        assert!(RelayConfig::new(store(), 100, 0).is_err());
    }

    #[test]
    fn test_config_requires_credentials() {
        let mut settings = store();
        settings.secret_key = String::new();
        let err = RelayConfig::new(settings, 100, 100).unwrap_err();
        assert!(err.to_string().contains("secret key"));
    }

    #[test]
    fn test_config_rejects_bad_endpoint() {
        let mut settings = store();
        settings.endpoint = "not a url".into();
        assert!(RelayConfig::new(settings, 100, 100).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = RelayConfig::new(store(), 100, 200).unwrap();
        assert_eq!(config.throttle_mode, ThrottleMode::Scoped);
        assert_eq!(config.item_delay, DEFAULT_ITEM_DELAY);
        assert!(config.user_agent.starts_with("s3relay/"));
    }
}
