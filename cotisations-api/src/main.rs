//! # Cotisations API Server
//!
//! HTTP server for the community contribution tracker: document CRUD over
//! the territorial hierarchy, members and payments, leaderboards, snapshots
//! and the server-side navigation shell.
//!
//! ## Startup
//!
//! 1. Load configuration (`.env`, optional `cotisations.toml`, environment)
//! 2. Open the SQLite database, migrate and seed it; failure here is fatal
//! 3. Resume the navigation session on the last visited route
//! 4. Serve until Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p cotisations-api
//! ```

use cotisations_api::{
    app::{build_router, AppState},
    config::Config,
};
use cotisations_shared::db::pool::close_pool;
use cotisations_shared::events::EventBus;
use cotisations_shared::store::Store;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cotisations_api=debug,cotisations_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Cotisations API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let events = EventBus::default();

    let (store, seeded) = match Store::initialize(config.database_config(), events.clone()).await {
        Ok(initialized) => initialized,
        Err(e) => {
            tracing::error!(error = %e, fatal = e.is_fatal(), "Database initialization failed");
            return Err(e.into());
        }
    };

    if !seeded.is_empty() {
        tracing::info!(
            cantons = seeded.cantons,
            contribution_types = seeded.contribution_types,
            "Reference data seeded"
        );
    }

    let bind_address = config.bind_address();
    let pool = store.pool().clone();
    let state = AppState::new(store, events.clone(), config);

    // Keep the mounted view in sync with store mutations
    let listener_task = Arc::clone(&state.shell).spawn_listener(&events);

    let transition = state.shell.navigator().await.resume(None).await?;
    tracing::info!(?transition, "Navigation session ready");

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    listener_task.abort();
    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, exiting..."),
        Err(e) => tracing::error!(error = %e, "Failed to listen for the shutdown signal"),
    }
}
