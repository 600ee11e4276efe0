use crate::aggregator::{SNAPSHOT_HOUR, weekly_avg_pm25, weekly_avg_temperature_at_2pm};
use crate::api_client::OpenMeteoClient;
use crate::series::{ForecastSeries, PM25_FIELD, TEMPERATURE_FIELD};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::errors::AppError;
use common::models::{Coordinate, LocationMetrics, WeeklySummary};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Forecast accessors for one coordinate.
///
/// Every accessor goes through the shared payload cache, so repeated calls
/// within a TTL window do not hit the provider again. `Ok(None)` means the
/// provider answered but had no reading; `Err` means the fetch failed.
#[derive(Clone)]
pub struct LocationService {
    coordinate: Coordinate,
    label: Option<String>,
    client: Arc<OpenMeteoClient>,
}

impl LocationService {
    pub fn new(coordinate: Coordinate, client: Arc<OpenMeteoClient>) -> Self {
        Self {
            coordinate,
            label: None,
            client,
        }
    }

    /// Validates the raw coordinate before building the service.
    pub fn at(latitude: f64, longitude: f64, client: Arc<OpenMeteoClient>) -> Result<Self, AppError> {
        Ok(Self::new(Coordinate::new(latitude, longitude)?, client))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub async fn fetch_weather(&self) -> Result<Arc<ForecastSeries>, AppError> {
        self.client.fetch_weather(self.coordinate).await
    }

    pub async fn fetch_air_quality(&self) -> Result<Arc<ForecastSeries>, AppError> {
        self.client.fetch_air_quality(self.coordinate).await
    }

    pub async fn weather_timeseries(&self) -> Result<BTreeMap<NaiveDateTime, Option<f64>>, AppError> {
        Ok(self.fetch_weather().await?.hourly_map(TEMPERATURE_FIELD))
    }

    pub async fn air_quality_timeseries(
        &self,
    ) -> Result<BTreeMap<NaiveDateTime, Option<f64>>, AppError> {
        Ok(self.fetch_air_quality().await?.hourly_map(PM25_FIELD))
    }

    pub async fn temperature_on(&self, date: NaiveDate, hour: u32) -> Result<Option<f64>, AppError> {
        Ok(self.fetch_weather().await?.value_at(TEMPERATURE_FIELD, date, hour))
    }

    pub async fn pm25_on(&self, date: NaiveDate, hour: u32) -> Result<Option<f64>, AppError> {
        Ok(self.fetch_air_quality().await?.value_at(PM25_FIELD, date, hour))
    }

    pub async fn weekly_avg_temp_2pm(&self) -> Result<Option<f64>, AppError> {
        Ok(weekly_avg_temperature_at_2pm(&*self.fetch_weather().await?))
    }

    pub async fn weekly_avg_pm25(&self) -> Result<Option<f64>, AppError> {
        Ok(weekly_avg_pm25(&*self.fetch_air_quality().await?))
    }

    /// Both weekly aggregates; the two fetches run concurrently.
    #[instrument(skip(self), fields(lat = self.coordinate.latitude(), lon = self.coordinate.longitude()))]
    pub async fn weekly_summary(&self) -> Result<WeeklySummary, AppError> {
        let (weather, air) = tokio::try_join!(self.fetch_weather(), self.fetch_air_quality())?;

        Ok(WeeklySummary {
            latitude: self.coordinate.latitude(),
            longitude: self.coordinate.longitude(),
            avg_temp_2pm: weekly_avg_temperature_at_2pm(&weather),
            avg_pm2_5: weekly_avg_pm25(&air),
        })
    }

    /// Point readings at `hour` on `date` plus the weekly aggregates.
    #[instrument(skip(self), fields(lat = self.coordinate.latitude(), lon = self.coordinate.longitude()))]
    pub async fn metrics_on(&self, date: NaiveDate, hour: u32) -> Result<LocationMetrics, AppError> {
        let (weather, air) = tokio::try_join!(self.fetch_weather(), self.fetch_air_quality())?;
        let time = NaiveTime::from_hms_opt(hour, 0, 0)
            .ok_or_else(|| AppError::validation(format!("hour {} is not in 0..=23", hour)))?;

        Ok(LocationMetrics {
            label: self.label.clone(),
            latitude: self.coordinate.latitude(),
            longitude: self.coordinate.longitude(),
            temperature_c: weather.value_at(TEMPERATURE_FIELD, date, hour),
            pm25: air.value_at(PM25_FIELD, date, hour),
            weekly_avg_temp_2pm: weekly_avg_temperature_at_2pm(&weather),
            weekly_avg_pm25: weekly_avg_pm25(&air),
            measured_at: date.and_time(time),
        })
    }

    pub async fn snapshot_on(&self, date: NaiveDate) -> Result<LocationMetrics, AppError> {
        self.metrics_on(date, SNAPSHOT_HOUR).await
    }
}
