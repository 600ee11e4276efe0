//! Coordinate normalization and cache-key derivation.
//!
//! Nearby points are collapsed onto one cache entry by rounding each axis to a
//! fixed number of decimals (2 dp is roughly 1.1 km). Rounding is half away
//! from zero, and a rounded `-0.0` is folded into `0.0` so both sides of the
//! equator and the prime meridian produce the same key.

use std::fmt;

/// Decimal places used for cache keys unless configured otherwise.
pub const DEFAULT_PRECISION: u32 = 2;

/// Round a single axis to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    // adding 0.0 turns -0.0 into 0.0
    (value * factor).round() / factor + 0.0
}

pub fn normalize(lat: f64, lon: f64, precision: u32) -> (f64, f64) {
    (round_to(lat, precision), round_to(lon, precision))
}

/// Which provider endpoint a cached payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Weather,
    AirQuality,
}

impl Endpoint {
    pub fn tag(&self) -> &'static str {
        match self {
            Endpoint::Weather => "openmeteo:weather",
            Endpoint::AirQuality => "openmeteo:air_quality",
        }
    }
}

/// Parameters that change the provider's answer besides the coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestShape {
    pub forecast_days: u8,
    pub timezone: Option<String>,
}

impl RequestShape {
    pub fn discriminator(&self) -> String {
        match &self.timezone {
            Some(tz) => format!("fd={}|tz={}", self.forecast_days, tz),
            None => format!("fd={}", self.forecast_days),
        }
    }
}

/// Cache key: `{tag}:{lat},{lon}:{shape}` with both axes normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        endpoint: Endpoint,
        lat: f64,
        lon: f64,
        precision: u32,
        shape: &RequestShape,
    ) -> Self {
        let (lat_n, lon_n) = normalize(lat, lon, precision);
        let p = precision as usize;
        Self(format!(
            "{}:{:.p$},{:.p$}:{}",
            endpoint.tag(),
            lat_n,
            lon_n,
            shape.discriminator(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
