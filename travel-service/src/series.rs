//! Open-Meteo hourly payloads and the time series extracted from them.
//!
//! The raw JSON is converted once, at the fetch boundary, into a
//! [`ForecastSeries`]: parsed timestamps plus named columns whose entries may
//! be missing. Everything downstream works on that schema.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::errors::AppError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

pub const TEMPERATURE_FIELD: &str = "temperature_2m";
pub const PM25_FIELD: &str = "pm2_5";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Raw provider response; only the `hourly` block is used.
#[derive(Debug, Default, Deserialize)]
pub struct RawPayload {
    #[serde(default)]
    pub hourly: Option<RawHourly>,
}

/// Columns are kept as loose JSON; anything that is not an array of numbers
/// or nulls is treated as an absent column.
#[derive(Debug, Default, Deserialize)]
pub struct RawHourly {
    #[serde(default)]
    pub time: Option<Vec<String>>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

/// One hourly reading; `value` is `None` when the provider sent null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// Parsed hourly forecast: ordered timestamps and parallel value columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    times: Vec<NaiveDateTime>,
    fields: HashMap<String, Vec<Option<f64>>>,
}

impl ForecastSeries {
    pub fn from_raw(raw: RawPayload) -> Result<Self, AppError> {
        let hourly = raw.hourly.unwrap_or_default();
        let times = hourly
            .time
            .unwrap_or_default()
            .iter()
            .map(|t| parse_timestamp(t))
            .collect::<Result<Vec<_>, _>>()?;

        let fields = hourly
            .fields
            .into_iter()
            .filter_map(|(name, value)| numeric_column(value).map(|column| (name, column)))
            .collect();

        Ok(Self { times, fields })
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let raw: RawPayload = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Zip timestamps with the named column.
    ///
    /// When the two arrays differ in length the series is truncated to the
    /// shorter one and the mismatch is logged. An unknown field yields an
    /// empty series.
    pub fn hourly_series(&self, field: &str) -> Vec<HourlyPoint> {
        let Some(values) = self.fields.get(field) else {
            return Vec::new();
        };

        if values.len() != self.times.len() {
            warn!(
                field,
                times = self.times.len(),
                values = values.len(),
                "Hourly arrays differ in length, truncating to the shorter one"
            );
        }

        self.times
            .iter()
            .zip(values)
            .map(|(timestamp, value)| HourlyPoint {
                timestamp: *timestamp,
                value: *value,
            })
            .collect()
    }

    /// Timestamp to value map, missing readings included as `None`.
    pub fn hourly_map(&self, field: &str) -> BTreeMap<NaiveDateTime, Option<f64>> {
        self.hourly_series(field)
            .into_iter()
            .map(|p| (p.timestamp, p.value))
            .collect()
    }

    /// Reading at exactly `date` + `hour`:00. `None` means no reading, which
    /// is not an error.
    pub fn value_at(&self, field: &str, date: NaiveDate, hour: u32) -> Option<f64> {
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        let needle = date.and_time(time);
        self.hourly_series(field)
            .into_iter()
            .find(|p| p.timestamp == needle)
            .and_then(|p| p.value)
    }
}

fn numeric_column(value: Value) -> Option<Vec<Option<f64>>> {
    match value {
        Value::Array(items) => Some(items.iter().map(Value::as_f64).collect()),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| AppError::malformed(format!("invalid hourly timestamp '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> ForecastSeries {
        ForecastSeries::from_json(json!({
            "latitude": 23.8,
            "longitude": 90.4,
            "hourly_units": { "time": "iso8601", "temperature_2m": "°C" },
            "hourly": {
                "time": ["2025-08-13T13:00", "2025-08-13T14:00", "2025-08-14T14:00"],
                "temperature_2m": [31.2, 33.4, null]
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_times_and_columns() {
        let series = sample();
        assert_eq!(series.len(), 3);
        let points = series.hourly_series(TEMPERATURE_FIELD);
        assert_eq!(points[1].timestamp.hour(), 14);
        assert_eq!(points[1].value, Some(33.4));
        assert_eq!(points[2].value, None);
    }

    #[test]
    fn value_at_exact_hour() {
        let series = sample();
        assert_eq!(
            series.value_at(TEMPERATURE_FIELD, date(2025, 8, 13), 14),
            Some(33.4)
        );
        // null reading and absent timestamp are both "no data"
        assert_eq!(series.value_at(TEMPERATURE_FIELD, date(2025, 8, 14), 14), None);
        assert_eq!(series.value_at(TEMPERATURE_FIELD, date(2025, 8, 20), 14), None);
        assert_eq!(series.value_at(TEMPERATURE_FIELD, date(2025, 8, 13), 24), None);
        assert_eq!(series.value_at(PM25_FIELD, date(2025, 8, 13), 14), None);
    }

    #[test]
    fn mismatched_lengths_truncate() {
        let series = ForecastSeries::from_json(json!({
            "hourly": {
                "time": ["2025-08-13T00:00", "2025-08-13T01:00", "2025-08-13T02:00"],
                "pm2_5": [12.0, 14.0]
            }
        }))
        .unwrap();
        assert_eq!(series.hourly_series(PM25_FIELD).len(), 2);
        assert_eq!(series.hourly_map(PM25_FIELD).len(), 2);
    }

    #[test]
    fn missing_hourly_block_is_empty() {
        let series = ForecastSeries::from_json(json!({ "latitude": 1.0 })).unwrap();
        assert!(series.is_empty());
        assert!(series.hourly_series(TEMPERATURE_FIELD).is_empty());
    }

    #[test]
    fn null_hourly_block_is_empty() {
        let series = ForecastSeries::from_json(json!({ "hourly": null })).unwrap();
        assert!(series.is_empty());
        assert!(series.hourly_map(PM25_FIELD).is_empty());
    }

    #[test]
    fn null_column_is_no_data() {
        let series = ForecastSeries::from_json(json!({
            "hourly": { "time": ["2025-08-13T14:00"], "pm2_5": null }
        }))
        .unwrap();
        assert_eq!(series.len(), 1);
        assert!(series.hourly_series(PM25_FIELD).is_empty());
        assert_eq!(series.value_at(PM25_FIELD, date(2025, 8, 13), 14), None);
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        let series = ForecastSeries::from_json(json!({
            "hourly": {
                "time": ["2025-08-13T14:00", "2025-08-13T15:00"],
                "pm2_5": [12.5, "n/a"],
                "pm10_flag": "x",
                "units": { "pm2_5": "μg/m³" }
            }
        }))
        .unwrap();
        assert_eq!(series.value_at(PM25_FIELD, date(2025, 8, 13), 14), Some(12.5));
        assert_eq!(series.value_at(PM25_FIELD, date(2025, 8, 13), 15), None);
        assert!(series.hourly_series("pm10_flag").is_empty());
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let err = ForecastSeries::from_json(json!({
            "hourly": { "time": ["yesterday"], "pm2_5": [1.0] }
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload(_)));
    }
}
