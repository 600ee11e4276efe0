//! Weekly statistics over a forecast window.
//!
//! Missing readings never contribute, and an aggregate with nothing to
//! average is `None` rather than zero. Public results are rounded to one
//! decimal place exactly once, on the final number.

use crate::series::{ForecastSeries, HourlyPoint, PM25_FIELD, TEMPERATURE_FIELD};
use chrono::{NaiveDate, Timelike};
use std::collections::BTreeMap;

/// Local hour used for the daily comparison snapshot.
pub const SNAPSHOT_HOUR: u32 = 14;

/// Round to one decimal place, half away from zero (22.25 -> 22.3).
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0 + 0.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Non-missing values grouped by calendar date.
pub fn daily_groups(points: &[HourlyPoint]) -> BTreeMap<NaiveDate, Vec<f64>> {
    let mut groups: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for point in points {
        if let Some(value) = point.value {
            groups.entry(point.timestamp.date()).or_default().push(value);
        }
    }
    groups
}

/// Average of every reading at exactly `hour` across the window.
pub fn weekly_avg_at_hour(series: &ForecastSeries, field: &str, hour: u32) -> Option<f64> {
    let values: Vec<f64> = series
        .hourly_series(field)
        .into_iter()
        .filter(|p| p.timestamp.hour() == hour && p.timestamp.minute() == 0)
        .filter_map(|p| p.value)
        .collect();

    mean(&values).map(round1)
}

/// Mean of per-day means, so days with more samples do not dominate.
pub fn weekly_avg_daily_mean(series: &ForecastSeries, field: &str) -> Option<f64> {
    let daily_means: Vec<f64> = daily_groups(&series.hourly_series(field))
        .values()
        .filter_map(|values| mean(values))
        .collect();

    mean(&daily_means).map(round1)
}

/// Weekly average temperature at 2 PM.
pub fn weekly_avg_temperature_at_2pm(weather: &ForecastSeries) -> Option<f64> {
    weekly_avg_at_hour(weather, TEMPERATURE_FIELD, SNAPSHOT_HOUR)
}

/// Daily-then-weekly average PM2.5.
pub fn weekly_avg_pm25(air_quality: &ForecastSeries) -> Option<f64> {
    weekly_avg_daily_mean(air_quality, PM25_FIELD)
}
