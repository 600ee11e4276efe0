use crate::api_client::OpenMeteoClient;
use crate::districts::DistrictRegistry;
use crate::location::LocationService;
use chrono::Utc;
use common::errors::AppError;
use common::models::{Coordinate, DistrictSummary, RefreshReport, WeeklySummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, instrument, warn};

const MAX_IN_FLIGHT: usize = 10;

enum DistrictOutcome {
    Updated,
    Incomplete,
    Failed,
}

/// Periodically recomputes weekly averages for every district.
///
/// A failing district is logged and counted; it never aborts the run.
pub struct RefreshTask {
    client: Arc<OpenMeteoClient>,
    registry: Arc<DistrictRegistry>,
    semaphore: Arc<Semaphore>,
    running: Mutex<()>,
    cancellation_token: CancellationToken,
}

impl RefreshTask {
    pub fn new(
        client: Arc<OpenMeteoClient>,
        registry: Arc<DistrictRegistry>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            client,
            registry,
            semaphore: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
            running: Mutex::new(()),
            cancellation_token,
        }
    }

    /// Run one refresh pass. Returns `None` when a pass is already running.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Option<RefreshReport> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Refresh already in progress, skipping");
            return None;
        };

        let purged = self.client.cache().purge_expired().await;
        let districts = self.registry.all().await;
        info!(count = districts.len(), purged, "Starting district refresh");

        let mut handles = Vec::with_capacity(districts.len());
        for district in districts {
            let semaphore = self.semaphore.clone();
            let client = self.client.clone();
            let registry = self.registry.clone();
            let cancel = self.cancellation_token.clone();

            let handle: JoinHandle<DistrictOutcome> = tokio::spawn(
                async move {
                    if cancel.is_cancelled() {
                        return DistrictOutcome::Failed;
                    }

                    let _permit = match semaphore.acquire().await {
                        Ok(p) => p,
                        Err(_) => return DistrictOutcome::Failed,
                    };

                    tokio::select! {
                        outcome = refresh_district(&district, client, &registry) => outcome,
                        _ = cancel.cancelled() => DistrictOutcome::Failed,
                    }
                }
                .in_current_span(),
            );
            handles.push(handle);
        }

        let mut report = RefreshReport {
            total: handles.len(),
            ..RefreshReport::default()
        };

        for handle in handles {
            match handle.await {
                Ok(DistrictOutcome::Updated) => report.updated += 1,
                Ok(DistrictOutcome::Incomplete) => report.incomplete += 1,
                Ok(DistrictOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Task join error");
                    report.failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            updated = report.updated,
            incomplete = report.incomplete,
            failed = report.failed,
            "District refresh completed"
        );
        Some(report)
    }

    /// Run a pass every `interval` until cancelled. Ticks that land while a
    /// pass is still running are skipped.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = self.cancellation_token.cancelled() => {
                        info!("Refresh loop stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[instrument(skip(district, client, registry), fields(district = %district.name))]
async fn refresh_district(
    district: &DistrictSummary,
    client: Arc<OpenMeteoClient>,
    registry: &DistrictRegistry,
) -> DistrictOutcome {
    match fetch_summary(district, client).await {
        Ok(summary) if summary.avg_temp_2pm.is_some() && summary.avg_pm2_5.is_some() => {
            registry.update_averages(district.id, &summary, Utc::now()).await;
            DistrictOutcome::Updated
        }
        Ok(_) => {
            warn!(district = %district.name, "No usable readings, keeping previous averages");
            DistrictOutcome::Incomplete
        }
        Err(e) => {
            warn!(district = %district.name, error = %e, "Failed to fetch district forecast");
            DistrictOutcome::Failed
        }
    }
}

async fn fetch_summary(
    district: &DistrictSummary,
    client: Arc<OpenMeteoClient>,
) -> Result<WeeklySummary, AppError> {
    let coordinate = Coordinate::new(district.latitude, district.longitude)?;
    LocationService::new(coordinate, client)
        .with_label(district.name.clone())
        .weekly_summary()
        .await
}
