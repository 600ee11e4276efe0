use crate::errors::AppError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A validated geographic point.
///
/// Fields are private so every instance, deserialized ones included, has gone
/// through [`Coordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::validation(format!(
                "latitude {} is outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::validation(format!(
                "longitude {} is outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = AppError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

/// Outcome of comparing two locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Verdict {
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

/// How large a differential is, for narrative purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Slightly,
    Moderately,
    Significantly,
}

impl Magnitude {
    pub fn as_str(&self) -> &'static str {
        match self {
            Magnitude::Slightly => "slightly",
            Magnitude::Moderately => "moderately",
            Magnitude::Significantly => "significantly",
        }
    }
}

/// Readings for one side of a comparison
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LocationMetrics {
    pub label: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Temperature (°C) at the measurement hour
    pub temperature_c: Option<f64>,
    /// PM2.5 (µg/m³) at the measurement hour
    pub pm25: Option<f64>,
    pub weekly_avg_temp_2pm: Option<f64>,
    pub weekly_avg_pm25: Option<f64>,
    #[schema(value_type = String, example = "2025-08-13T14:00:00")]
    pub measured_at: NaiveDateTime,
}

/// Travel recommendation response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecommendationResult {
    pub recommendation: Verdict,
    pub reason: String,
    pub current: LocationMetrics,
    pub destination: LocationMetrics,
    /// destination minus current; negative means cooler
    pub temperature_diff: Option<f64>,
    /// destination minus current; negative means cleaner air
    pub pm25_diff: Option<f64>,
    pub temperature_magnitude: Option<Magnitude>,
    pub pm25_magnitude: Option<Magnitude>,
}

/// Weekly aggregates for one coordinate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeeklySummary {
    pub latitude: f64,
    pub longitude: f64,
    pub avg_temp_2pm: Option<f64>,
    pub avg_pm2_5: Option<f64>,
}

/// A district with its most recently refreshed averages
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DistrictSummary {
    pub id: u32,
    pub name: String,
    pub local_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub avg_temp_2pm: Option<f64>,
    pub avg_pm2_5: Option<f64>,
    #[schema(value_type = Option<String>)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Counts from one batch refresh run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RefreshReport {
    pub total: usize,
    pub updated: usize,
    pub incomplete: usize,
    pub failed: usize,
}
