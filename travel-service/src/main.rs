use common::http_client::HttpClient;
use common::tracing::init_tracing_for;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use travel_service::api_client::{OpenMeteoClient, PayloadCache};
use travel_service::config::Config;
use travel_service::districts::DistrictRegistry;
use travel_service::handlers::AppState;
use travel_service::refresh::RefreshTask;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_tracing_for(&config.log_format);

    let cancellation_token = CancellationToken::new();

    let http_client = HttpClient::new(config.http_timeout(), config.retry_policy())?;
    let cache = Arc::new(PayloadCache::new());
    let client = Arc::new(OpenMeteoClient::new(
        http_client,
        cache,
        config.provider_settings(),
    ));
    let registry = Arc::new(DistrictRegistry::load(config.districts_path.as_deref()).await?);
    let refresh = Arc::new(RefreshTask::new(
        client.clone(),
        registry.clone(),
        cancellation_token.clone(),
    ));

    let refresh_handle = match config.refresh_interval() {
        Some(interval) => {
            info!(interval_secs = interval.as_secs(), "Scheduling district refresh");
            Some(refresh.clone().spawn_periodic(interval))
        }
        None => {
            warn!("Periodic district refresh disabled");
            None
        }
    };

    let state = AppState {
        client,
        registry,
        refresh,
    };
    let app = travel_service::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Travel service starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancellation_token))
        .await?;

    if let Some(handle) = refresh_handle {
        let _ = handle.await;
    }

    info!("Travel service stopped");
    Ok(())
}

async fn shutdown_signal(cancellation_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }

    // Stop the refresh loop and any in-flight district fetches
    cancellation_token.cancel();
    warn!("Cancelled background refresh, shutting down gracefully...");
}
