//! Compare two locations at 2 PM on a travel date.
//!
//! A destination is recommended only when it is both cooler and has lower
//! PM2.5 than the current location. Missing readings produce a
//! `NotRecommended` verdict; a failed fetch is returned as an error instead.

use crate::aggregator::round1;
use crate::location::LocationService;
use chrono::NaiveDate;
use common::errors::AppError;
use common::models::{LocationMetrics, Magnitude, RecommendationResult, Verdict};
use tracing::{info, instrument};

pub const INSUFFICIENT_DATA_REASON: &str =
    "Insufficient data to compare temperature or air quality.";

/// Temperature delta magnitude, in °C.
pub fn qualify_temperature(delta: f64) -> Magnitude {
    let d = delta.abs();
    if d >= 5.0 {
        Magnitude::Significantly
    } else if d >= 2.0 {
        Magnitude::Moderately
    } else {
        Magnitude::Slightly
    }
}

/// PM2.5 delta magnitude, in µg/m³.
pub fn qualify_pm25(delta: f64) -> Magnitude {
    let d = delta.abs();
    if d >= 20.0 {
        Magnitude::Significantly
    } else if d >= 10.0 {
        Magnitude::Moderately
    } else {
        Magnitude::Slightly
    }
}

#[instrument(skip(current, destination), fields(
    current_lat = current.coordinate().latitude(),
    current_lon = current.coordinate().longitude(),
    destination_lat = destination.coordinate().latitude(),
    destination_lon = destination.coordinate().longitude(),
))]
pub async fn recommend(
    current: &LocationService,
    destination: &LocationService,
    travel_date: NaiveDate,
) -> Result<RecommendationResult, AppError> {
    let (current_metrics, destination_metrics) = tokio::try_join!(
        current.snapshot_on(travel_date),
        destination.snapshot_on(travel_date),
    )?;

    let result = evaluate(current_metrics, destination_metrics);
    info!(recommendation = ?result.recommendation, "Recommendation computed");
    Ok(result)
}

/// Apply the comparison rules to already fetched readings.
pub fn evaluate(current: LocationMetrics, destination: LocationMetrics) -> RecommendationResult {
    let (Some(cur_temp), Some(dest_temp), Some(cur_pm), Some(dest_pm)) = (
        current.temperature_c,
        destination.temperature_c,
        current.pm25,
        destination.pm25,
    ) else {
        return RecommendationResult {
            recommendation: Verdict::NotRecommended,
            reason: INSUFFICIENT_DATA_REASON.to_string(),
            current,
            destination,
            temperature_diff: None,
            pm25_diff: None,
            temperature_magnitude: None,
            pm25_magnitude: None,
        };
    };

    // negative means the destination is cooler / cleaner
    let temp_diff = round1(dest_temp - cur_temp);
    let pm25_diff = round1(dest_pm - cur_pm);
    let is_cooler = dest_temp < cur_temp;
    let cleaner_air = dest_pm < cur_pm;

    let temp_magnitude = qualify_temperature(temp_diff);
    let pm_magnitude = qualify_pm25(pm25_diff);

    let (recommendation, reason) = if is_cooler && cleaner_air {
        (
            Verdict::Recommended,
            format!(
                "Your destination is {:.1}°C {} cooler and has {} better air quality. Enjoy your trip!",
                temp_diff.abs(),
                temp_magnitude.as_str(),
                pm_magnitude.as_str(),
            ),
        )
    } else {
        let mut parts = Vec::with_capacity(2);
        if !is_cooler {
            parts.push(if temp_diff > 0.0 {
                "hotter"
            } else {
                "the same temperature"
            });
        }
        if !cleaner_air {
            parts.push(if pm25_diff > 0.0 {
                "worse air quality"
            } else {
                "the same air quality"
            });
        }
        (
            Verdict::NotRecommended,
            format!(
                "Your destination is {} than your current location. It’s better to stay where you are.",
                parts.join(" and ")
            ),
        )
    };

    RecommendationResult {
        recommendation,
        reason,
        current,
        destination,
        temperature_diff: Some(temp_diff),
        pm25_diff: Some(pm25_diff),
        temperature_magnitude: Some(temp_magnitude),
        pm25_magnitude: Some(pm_magnitude),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn metrics(temperature_c: Option<f64>, pm25: Option<f64>) -> LocationMetrics {
        LocationMetrics {
            label: None,
            latitude: 23.81,
            longitude: 90.41,
            temperature_c,
            pm25,
            weekly_avg_temp_2pm: None,
            weekly_avg_pm25: None,
            measured_at: NaiveDateTime::parse_from_str("2025-08-13T14:00", "%Y-%m-%dT%H:%M")
                .unwrap(),
        }
    }

    #[test]
    fn cooler_and_cleaner_is_recommended() {
        let result = evaluate(metrics(Some(30.0), Some(40.0)), metrics(Some(25.0), Some(20.0)));

        assert_eq!(result.recommendation, Verdict::Recommended);
        assert_eq!(result.temperature_diff, Some(-5.0));
        assert_eq!(result.pm25_diff, Some(-20.0));
        assert_eq!(result.temperature_magnitude, Some(Magnitude::Significantly));
        assert_eq!(result.pm25_magnitude, Some(Magnitude::Significantly));
        assert_eq!(
            result.reason,
            "Your destination is 5.0°C significantly cooler and has significantly better air quality. Enjoy your trip!"
        );
    }

    #[test]
    fn hotter_destination_is_not_recommended() {
        for dest_pm in [5.0, 40.0, 90.0] {
            let result = evaluate(metrics(Some(20.0), Some(40.0)), metrics(Some(22.0), Some(dest_pm)));
            assert_eq!(result.recommendation, Verdict::NotRecommended);
            assert_eq!(result.temperature_diff, Some(2.0));
            assert!(result.reason.contains("hotter"));
        }
    }

    #[test]
    fn failing_axes_are_described() {
        let result = evaluate(metrics(Some(20.0), Some(30.0)), metrics(Some(20.0), Some(45.0)));
        assert_eq!(result.recommendation, Verdict::NotRecommended);
        assert_eq!(
            result.reason,
            "Your destination is the same temperature and worse air quality than your current location. It’s better to stay where you are."
        );

        let result = evaluate(metrics(Some(30.0), Some(30.0)), metrics(Some(24.0), Some(30.0)));
        assert_eq!(result.recommendation, Verdict::NotRecommended);
        assert!(result.reason.starts_with("Your destination is the same air quality than"));
        assert_eq!(result.temperature_magnitude, Some(Magnitude::Significantly));
    }

    #[test]
    fn any_missing_value_is_insufficient_data() {
        let cases = [
            (metrics(None, Some(40.0)), metrics(Some(25.0), Some(20.0))),
            (metrics(Some(30.0), None), metrics(Some(25.0), Some(20.0))),
            (metrics(Some(30.0), Some(40.0)), metrics(None, Some(20.0))),
            (metrics(Some(30.0), Some(40.0)), metrics(Some(25.0), None)),
        ];
        for (current, destination) in cases {
            let result = evaluate(current, destination);
            assert_eq!(result.recommendation, Verdict::NotRecommended);
            assert_eq!(result.reason, INSUFFICIENT_DATA_REASON);
            assert_eq!(result.temperature_diff, None);
            assert_eq!(result.pm25_diff, None);
        }
    }

    #[test]
    fn magnitude_thresholds() {
        assert_eq!(qualify_temperature(-1.9), Magnitude::Slightly);
        assert_eq!(qualify_temperature(2.0), Magnitude::Moderately);
        assert_eq!(qualify_temperature(-4.9), Magnitude::Moderately);
        assert_eq!(qualify_temperature(5.0), Magnitude::Significantly);
        assert_eq!(qualify_pm25(9.9), Magnitude::Slightly);
        assert_eq!(qualify_pm25(-10.0), Magnitude::Moderately);
        assert_eq!(qualify_pm25(20.0), Magnitude::Significantly);
    }

    #[test]
    fn differentials_are_rounded() {
        let result = evaluate(metrics(Some(30.04), Some(40.0)), metrics(Some(27.83), Some(31.26)));
        assert_eq!(result.recommendation, Verdict::Recommended);
        assert_eq!(result.temperature_diff, Some(-2.2));
        assert_eq!(result.pm25_diff, Some(-8.7));
        assert_eq!(result.temperature_magnitude, Some(Magnitude::Moderately));
        assert_eq!(result.pm25_magnitude, Some(Magnitude::Slightly));
    }
}
