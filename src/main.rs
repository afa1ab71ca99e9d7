use migration::MigratorTrait;
use opzen::{app_state::AppState, config::Config, routes::create_router};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,opzen=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Opzen credit & settlement core");

    // Load configuration
    let config = Config::load()?;

    tracing::info!(
        "Loaded configuration - Server: {}:{}",
        config.server.host,
        config.server.port
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    // Bring the schema up to date before accepting traffic
    migration::Migrator::up(&state.db, None).await?;

    tracing::info!("Initialized application state");

    // Background stale-job sweep: refunds are guaranteed even when a worker
    // never calls back and the user never reopens a session.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(sweep_state.config.jobs.sweep_interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = sweep_state.job_service.sweep_stale_all().await {
                tracing::error!("Stale job sweep failed: {}", e);
            }
        }
    });

    // Settlement polling fallback for providers that cannot reach the webhook
    if state.settlement_service.poll_enabled() {
        let poll_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                poll_state.config.settlement.poll_interval_secs,
            ));
            loop {
                interval.tick().await;
                if let Err(e) = poll_state.settlement_service.poll_once().await {
                    tracing::error!("Settlement poll failed: {}", e);
                }
            }
        });
    }

    // Create router
    let app = create_router(state);

    // Create server address
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
