use anyhow::{Context, Result};
use std::sync::Arc;

use hindsight::config::Config;
use hindsight::scheduler::StartupOutcome;
use hindsight::selector::SelectionCache;
use hindsight::server::{AppState, HindsightServer};

/// Configuration parameters for the serve command
pub struct ServeParams {
    pub cors: bool,
}

/// Establish the first selection, start the refresh timer and serve readers
pub async fn serve(config: Config, params: ServeParams) -> Result<()> {
    let ServeParams { cors } = params;

    let cache = Arc::new(SelectionCache::new());
    let scheduler = Arc::new(super::build_scheduler(&config, cache.clone(), true)?);

    println!("Starting hindsight");
    println!("==================");
    println!("  Bind: {}", config.bind_addr());
    println!("  Candidates: {}", config.candidates.len());
    println!("  Timezone: {}", scheduler.schedule().timezone);
    println!("  Day Offset: {}m", config.refresh.day_offset_minutes);
    println!("  Backup: {}", config.backup.path.display());
    println!(
        "  CORS: {}",
        if cors { "enabled" } else { "disabled" }
    );
    println!();

    let startup = scheduler.initialize().await;
    match &startup {
        StartupOutcome::Restored(selection) | StartupOutcome::Refreshed(selection) => {
            tracing::info!(
                outcome = startup.label(),
                candidate = %selection.candidate,
                selected_at = %selection.selected_at,
                "Startup selection ready"
            );
        }
        StartupOutcome::Unavailable(reason) => {
            tracing::warn!(reason = %reason, "Starting without a selection");
        }
    }

    let handle = scheduler.clone().spawn(startup.selected_at());

    let state = AppState::new(cache)
        .context("Failed to create server state")?
        .with_status(scheduler.clone());
    let server = HindsightServer::new(state).with_cors(cors);

    println!("Endpoints:");
    println!("  GET  /                - Current selection page");
    println!("  GET  /api/selection   - Current selection as JSON");
    println!("  GET  /api/status      - Cache and refresh status");
    println!("  GET  /health          - Health check");
    println!("  GET  /metrics         - Prometheus metrics endpoint");
    println!();
    println!("Listening on http://{}", config.bind_addr());
    println!("Press Ctrl+C to stop.\n");

    let served = server
        .serve(&config.bind_addr(), async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await;

    handle.shutdown().await;
    served?;

    println!("{}", scheduler.status().await.display());
    println!("hindsight stopped.");
    Ok(())
}
