/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use cotisations_api::{app::AppState, config::Config};
/// use cotisations_shared::events::EventBus;
/// use cotisations_shared::store::Store;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let events = EventBus::default();
/// let (store, _seeded) = Store::initialize(config.database_config(), events.clone()).await?;
/// let state = AppState::new(store, events, config);
/// let app = cotisations_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::security::SecurityHeadersLayer,
    shell::{view::StaticPrompt, Shell, ViewContext},
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use cotisations_shared::events::EventBus;
use cotisations_shared::ranking::RankingService;
use cotisations_shared::store::Store;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Document store
    pub store: Store,

    /// Leaderboards over the territories
    pub ranking: RankingService,

    /// Navigation session
    pub shell: Arc<Shell>,

    /// In-process notifications
    pub events: EventBus,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state with a fresh navigation session
    ///
    /// Native confirmations are answered "yes": the HTTP client confirms
    /// destructive actions through the modal flow instead.
    pub fn new(store: Store, events: EventBus, config: Config) -> Self {
        let ranking = RankingService::new(store.clone(), config.ranking.amount_source);
        let context = ViewContext::new(store.clone(), ranking.clone(), Arc::new(StaticPrompt(true)));
        let shell = Shell::new(context, events.clone(), config.shell.mount_timeout());

        Self {
            store,
            ranking,
            shell: Arc::new(shell),
            events,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// The router is organized as follows:
/// ```text
/// /
/// ├── /health                         # Health check
/// ├── /v1/                            # API v1 (versioned)
/// │   ├── /collections/:collection
/// │   │   ├── GET    /                # List documents
/// │   │   ├── POST   /                # Add a document
/// │   │   ├── POST   /search          # Filter documents
/// │   │   ├── GET    /:id
/// │   │   ├── PUT    /:id
/// │   │   └── DELETE /:id
/// │   ├── /settings/:key              # GET, PUT, DELETE
/// │   ├── /rankings/                  # ?critere=&ordre=
/// │   │   ├── GET /cantons
/// │   │   ├── GET /cantons/:id/villages
/// │   │   └── GET /villages/:id/quartiers
/// │   ├── /snapshot                   # GET export, POST import
/// │   └── /shell/                     # Navigation session
/// │       ├── GET  /
/// │       ├── POST /navigate
/// │       ├── POST /back
/// │       ├── POST /events
/// │       └── POST /state
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
pub fn build_router(state: AppState) -> Router {
    // Import route handlers
    use crate::routes;

    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check));

    let collection_routes = Router::new()
        .route(
            "/:collection",
            get(routes::collections::list_documents).post(routes::collections::add_document),
        )
        .route("/:collection/search", post(routes::collections::search_documents))
        .route(
            "/:collection/:id",
            get(routes::collections::get_document)
                .put(routes::collections::update_document)
                .delete(routes::collections::delete_document),
        );

    let setting_routes = Router::new().route(
        "/:key",
        get(routes::settings::get_setting)
            .put(routes::settings::put_setting)
            .delete(routes::settings::delete_setting),
    );

    let ranking_routes = Router::new()
        .route("/cantons", get(routes::rankings::rank_cantons))
        .route("/cantons/:id/villages", get(routes::rankings::rank_villages))
        .route("/villages/:id/quartiers", get(routes::rankings::rank_quarters));

    let shell_routes = Router::new()
        .route("/", get(routes::shell::current))
        .route("/navigate", post(routes::shell::navigate))
        .route("/back", post(routes::shell::back))
        .route("/events", post(routes::shell::dispatch_event))
        .route("/state", post(routes::shell::update_state));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/collections", collection_routes)
        .nest("/settings", setting_routes)
        .nest("/rankings", ranking_routes)
        .route(
            "/snapshot",
            get(routes::snapshot::export_snapshot).post(routes::snapshot::import_snapshot),
        )
        .nest("/shell", shell_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
