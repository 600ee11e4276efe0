use chrono::{DateTime, Utc};
use common::errors::AppError;
use common::models::{Coordinate, DistrictSummary, WeeklySummary};
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, warn};

const BUNDLED_DISTRICTS: &str = include_str!("../data/districts.json");

/// District as listed in the source file
#[derive(Debug, Clone, Deserialize)]
pub struct DistrictRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub local_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// In-memory district list with the latest weekly averages.
///
/// Averages live only for the lifetime of the process.
pub struct DistrictRegistry {
    districts: RwLock<Vec<DistrictSummary>>,
}

impl DistrictRegistry {
    pub fn from_records(records: Vec<DistrictRecord>) -> Result<Self, AppError> {
        let mut districts = Vec::with_capacity(records.len());
        for record in records {
            Coordinate::new(record.latitude, record.longitude).map_err(|e| {
                AppError::validation(format!("district {} ({}): {}", record.id, record.name, e))
            })?;
            districts.push(DistrictSummary {
                id: record.id,
                name: record.name,
                local_name: record.local_name,
                latitude: record.latitude,
                longitude: record.longitude,
                avg_temp_2pm: None,
                avg_pm2_5: None,
                updated_at: None,
            });
        }

        Ok(Self {
            districts: RwLock::new(districts),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let records: Vec<DistrictRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Load from `path`, or the bundled list when no path is given.
    pub async fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let registry = match path {
            Some(path) => {
                let json = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AppError::internal(format!("reading {}: {}", path.display(), e))
                })?;
                Self::from_json(&json)?
            }
            None => Self::from_json(BUNDLED_DISTRICTS)?,
        };

        info!(count = registry.len().await, "District registry loaded");
        Ok(registry)
    }

    pub async fn len(&self) -> usize {
        self.districts.read().await.len()
    }

    pub async fn all(&self) -> Vec<DistrictSummary> {
        self.districts.read().await.clone()
    }

    pub async fn get(&self, id: u32) -> Option<DistrictSummary> {
        self.districts
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Record fresh averages for a district; returns false if the id is unknown.
    pub async fn update_averages(&self, id: u32, summary: &WeeklySummary, at: DateTime<Utc>) -> bool {
        let mut districts = self.districts.write().await;
        let Some(district) = districts.iter_mut().find(|d| d.id == id) else {
            warn!(district_id = id, "Refresh for unknown district");
            return false;
        };
        district.avg_temp_2pm = summary.avg_temp_2pm;
        district.avg_pm2_5 = summary.avg_pm2_5;
        district.updated_at = Some(at);
        true
    }

    /// Coolest districts first, ties broken by lower PM2.5; districts with no
    /// data sort last.
    pub async fn top(&self, limit: usize) -> Vec<DistrictSummary> {
        let mut districts = self.all().await;
        districts.sort_by(|a, b| {
            cmp_missing_last(a.avg_temp_2pm, b.avg_temp_2pm)
                .then_with(|| cmp_missing_last(a.avg_pm2_5, b.avg_pm2_5))
                .then_with(|| a.id.cmp(&b.id))
        });
        districts.truncate(limit);
        districts
    }
}

fn cmp_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
