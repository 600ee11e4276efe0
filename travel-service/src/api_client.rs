use crate::cache::ForecastCache;
use crate::geo::{CacheKey, Endpoint, RequestShape};
use crate::series::{ForecastSeries, PM25_FIELD, RawPayload, TEMPERATURE_FIELD};
use common::errors::{AppError, FetchErrorKind};
use common::http_client::HttpClient;
use common::models::Coordinate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

pub type PayloadCache = ForecastCache<Arc<ForecastSeries>>;

/// Endpoint URLs, TTLs and request shape for the Open-Meteo APIs
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub weather_url: String,
    pub air_quality_url: String,
    pub weather_ttl: Duration,
    pub air_quality_ttl: Duration,
    pub forecast_days: u8,
    pub timezone: String,
    pub precision: u32,
    pub rate_limit_per_minute: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            weather_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            air_quality_url: "https://air-quality-api.open-meteo.com/v1/air-quality".to_string(),
            weather_ttl: Duration::from_secs(1800),
            air_quality_ttl: Duration::from_secs(1800),
            forecast_days: 7,
            timezone: "auto".to_string(),
            precision: crate::geo::DEFAULT_PRECISION,
            rate_limit_per_minute: 600,
        }
    }
}

pub struct OpenMeteoClient {
    http_client: HttpClient,
    cache: Arc<PayloadCache>,
    settings: ProviderSettings,
    rate_limiter: Arc<Semaphore>,
    last_request_time: Arc<tokio::sync::Mutex<Option<Instant>>>,
    min_request_interval: Duration,
}

impl OpenMeteoClient {
    pub fn new(http_client: HttpClient, cache: Arc<PayloadCache>, settings: ProviderSettings) -> Self {
        let per_minute = settings.rate_limit_per_minute.max(1);
        let min_request_interval = Duration::from_millis(60_000 / per_minute as u64);
        Self {
            http_client,
            cache,
            rate_limiter: Arc::new(Semaphore::new(per_minute as usize)),
            last_request_time: Arc::new(tokio::sync::Mutex::new(None)),
            min_request_interval,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<PayloadCache> {
        &self.cache
    }

    fn weather_shape(&self) -> RequestShape {
        RequestShape {
            forecast_days: self.settings.forecast_days,
            timezone: Some(self.settings.timezone.clone()),
        }
    }

    fn air_quality_shape(&self) -> RequestShape {
        RequestShape {
            forecast_days: self.settings.forecast_days,
            timezone: None,
        }
    }

    /// Hourly `temperature_2m` forecast, served from cache when fresh.
    #[instrument(skip(self), fields(lat = coord.latitude(), lon = coord.longitude()))]
    pub async fn fetch_weather(&self, coord: Coordinate) -> Result<Arc<ForecastSeries>, AppError> {
        let shape = self.weather_shape();
        let key = CacheKey::new(
            Endpoint::Weather,
            coord.latitude(),
            coord.longitude(),
            self.settings.precision,
            &shape,
        );
        let url = build_url(&self.settings.weather_url, coord, TEMPERATURE_FIELD, &shape);

        self.cache
            .get_or_populate(&key, self.settings.weather_ttl, || self.download(url))
            .await
    }

    /// Hourly `pm2_5` forecast, served from cache when fresh.
    #[instrument(skip(self), fields(lat = coord.latitude(), lon = coord.longitude()))]
    pub async fn fetch_air_quality(
        &self,
        coord: Coordinate,
    ) -> Result<Arc<ForecastSeries>, AppError> {
        let shape = self.air_quality_shape();
        let key = CacheKey::new(
            Endpoint::AirQuality,
            coord.latitude(),
            coord.longitude(),
            self.settings.precision,
            &shape,
        );
        let url = build_url(&self.settings.air_quality_url, coord, PM25_FIELD, &shape);

        self.cache
            .get_or_populate(&key, self.settings.air_quality_ttl, || self.download(url))
            .await
    }

    async fn download(&self, url: String) -> Result<Arc<ForecastSeries>, AppError> {
        // Rate limiting: acquire permit
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| AppError::internal(format!("Rate limiter error: {}", e)))?;

        self.debounce().await;

        info!(url = %url, "Fetching forecast from API");

        let (raw, attempts): (RawPayload, u32) =
            self.http_client.get_json_with_attempts(&url).await?;
        let series = ForecastSeries::from_raw(raw)
            .map_err(|e| AppError::fetch(FetchErrorKind::Permanent, attempts, e))?;

        Ok(Arc::new(series))
    }

    async fn debounce(&self) {
        let mut last_request = self.last_request_time.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_request_interval {
                let wait_time = self.min_request_interval - elapsed;
                warn!(wait_ms = wait_time.as_millis(), "Debouncing request");
                tokio::time::sleep(wait_time).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

/// The unrounded coordinate goes to the provider; rounding is only for keys.
fn build_url(base: &str, coord: Coordinate, field: &str, shape: &RequestShape) -> String {
    let mut url = format!(
        "{}?latitude={}&longitude={}&hourly={}&forecast_days={}",
        base, coord.latitude(), coord.longitude(), field, shape.forecast_days
    );
    if let Some(tz) = &shape.timezone {
        url.push_str("&timezone=");
        url.push_str(&urlencoding::encode(tz));
    }
    url
}
