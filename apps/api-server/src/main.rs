//! # Sheetwise API Server
//!
//! Actix-web server exposing the quota-gated AI tool endpoints.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use middleware::cors;
use state::AppState;
use telemetry::TelemetryConfig;

#[cfg(feature = "scheduler")]
async fn start_sweeper(config: &AppConfig, state: &AppState) -> Option<background::Scheduler> {
    if !config.sweeper.enabled {
        tracing::info!("Counter sweeper disabled");
        return None;
    }
    let store = state.sweeper.clone()?;

    let started = async {
        let scheduler = background::Scheduler::new().await?;
        background::sweeper::schedule(
            &scheduler,
            store,
            config.rate_limit.window,
            &config.sweeper.schedule,
        )
        .await?;
        scheduler.start().await?;
        Ok::<_, tokio_cron_scheduler::JobSchedulerError>(scheduler)
    };

    match started.await {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            tracing::error!("Failed to start counter sweeper: {}", e);
            None
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Sheetwise API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    #[cfg(feature = "scheduler")]
    let mut sweeper = start_sweeper(&config, &state).await;

    let server_state = state.clone();
    let result = HttpServer::new(move || {
        let state = server_state.clone();
        App::new()
            .wrap(cors::policy())
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| handlers::configure_routes(cfg, &state))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    #[cfg(feature = "scheduler")]
    if let Some(scheduler) = sweeper.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Counter sweeper did not stop cleanly: {}", e);
        }
    }

    result
}
