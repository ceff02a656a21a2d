use std::net::SocketAddr;
use std::sync::Arc;

use cabshare_api::{
    app,
    state::{AppState, AuthConfig},
};
use cabshare_booking::{EscrowConfig, EscrowOrchestrator};
use cabshare_catalog::{RideCatalog, SeatInventory};
use cabshare_core::payment::MockGateway;
use cabshare_store::{
    DbClient, PgBookingStore, PgIntentStore, PgLedger, PgRideStore, PgSettlementStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cabshare_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cabshare_store::Config::load()?;
    tracing::info!("Starting Cabshare API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;

    // One ride store serves both read and reservation traits.
    let rides = Arc::new(PgRideStore::new(db.pool.clone()));
    let catalog: Arc<dyn RideCatalog> = rides.clone();
    let inventory: Arc<dyn SeatInventory> = rides;
    let ledger = Arc::new(PgLedger::new(db.pool.clone()));
    let bookings = Arc::new(PgBookingStore::new(db.pool.clone()));
    let intents = Arc::new(PgIntentStore::new(db.pool.clone()));
    let settlements = Arc::new(PgSettlementStore::new(db.pool.clone()));

    let orchestrator = Arc::new(EscrowOrchestrator::new(
        catalog,
        inventory,
        ledger.clone(),
        bookings,
        EscrowConfig {
            compensation_attempts: config.business_rules.compensation_attempts,
            compensation_backoff_ms: config.business_rules.compensation_backoff_ms,
        },
    ));

    let app_state = AppState {
        orchestrator,
        ledger,
        settlements,
        intents,
        gateway: Arc::new(MockGateway),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        business_rules: config.business_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
