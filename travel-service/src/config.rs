use crate::api_client::ProviderSettings;
use common::http_client::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub struct Config {
    pub port: u16,
    pub weather_url: String,
    pub air_quality_url: String,
    pub weather_cache_ttl_seconds: u64,
    pub air_quality_cache_ttl_seconds: u64,
    pub forecast_days: u8,
    pub timezone: String,
    pub coordinate_precision: u32,
    pub http_timeout_seconds: u64,
    pub http_max_attempts: u32,
    pub rate_limit_per_minute: u32,
    pub refresh_interval_seconds: u64,
    pub districts_path: Option<PathBuf>,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            port: parse_or(lookup("PORT"), 3002),
            weather_url: lookup("WEATHER_FORECAST_URL")
                .unwrap_or_else(|| "https://api.open-meteo.com/v1/forecast".to_string()),
            air_quality_url: lookup("AIR_QUALITY_URL").unwrap_or_else(|| {
                "https://air-quality-api.open-meteo.com/v1/air-quality".to_string()
            }),
            weather_cache_ttl_seconds: parse_or(lookup("WEATHER_CACHE_TTL"), 1800), // 30 min
            air_quality_cache_ttl_seconds: parse_or(lookup("AIR_QUALITY_CACHE_TTL"), 1800),
            forecast_days: parse_or(lookup("FORECAST_DAYS"), 7),
            timezone: lookup("FORECAST_TIMEZONE").unwrap_or_else(|| "auto".to_string()),
            coordinate_precision: parse_or(lookup("COORDINATE_PRECISION"), 2),
            http_timeout_seconds: parse_or(lookup("HTTP_TIMEOUT_SECONDS"), 20),
            http_max_attempts: parse_or(lookup("HTTP_MAX_ATTEMPTS"), 3),
            rate_limit_per_minute: parse_or(lookup("RATE_LIMIT_PER_MINUTE"), 600),
            refresh_interval_seconds: parse_or(lookup("REFRESH_INTERVAL_SECONDS"), 3600),
            districts_path: lookup("DISTRICTS_PATH").map(PathBuf::from),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            weather_url: self.weather_url.clone(),
            air_quality_url: self.air_quality_url.clone(),
            weather_ttl: Duration::from_secs(self.weather_cache_ttl_seconds),
            air_quality_ttl: Duration::from_secs(self.air_quality_cache_ttl_seconds),
            forecast_days: self.forecast_days,
            timezone: self.timezone.clone(),
            precision: self.coordinate_precision,
            rate_limit_per_minute: self.rate_limit_per_minute,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.http_max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// `None` disables the periodic refresh.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0).then(|| Duration::from_secs(self.refresh_interval_seconds))
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
