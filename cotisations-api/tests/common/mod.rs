/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - A fresh, migrated and seeded SQLite database per test
/// - The full application router over it
/// - JSON request helpers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cotisations_api::app::{build_router, AppState};
use cotisations_api::config::Config;
use cotisations_shared::events::EventBus;
use cotisations_shared::models::canton::Canton;
use cotisations_shared::store::Store;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Test context containing all necessary resources
pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    pub config: Config,
    _dir: TempDir,
}

impl TestContext {
    /// Creates a new test context with a fresh database
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_env(&[]).await
    }

    /// Creates a test context with extra configuration variables
    pub async fn with_env(vars: &[(&str, &str)]) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let url = format!("sqlite://{}", dir.path().join("cotisations.db").display());

        let config = Config::load(|key| {
            if key == "DATABASE_URL" {
                return Some(url.clone());
            }
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
        })?;

        let events = EventBus::default();
        let (store, _) = Store::initialize(config.database_config(), events.clone()).await?;
        let state = AppState::new(store, events, config.clone());
        let app = build_router(state.clone());

        Ok(Self {
            state,
            app,
            config,
            _dir: dir,
        })
    }

    pub fn store(&self) -> &Store {
        &self.state.store
    }

    /// Sends a request and returns the status and the JSON body
    /// (`Value::Null` for an empty body)
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Response is not JSON: {}", String::from_utf8_lossy(&bytes))
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, None).await
    }

    /// Id of a seeded canton
    pub async fn canton_id(&self, name: &str) -> i64 {
        let found: Vec<Canton> = self
            .store()
            .search(json!({ "nom": name }).as_object().unwrap())
            .await
            .unwrap();
        found
            .into_iter()
            .find(|c| c.name == name)
            .and_then(|c| c.id)
            .unwrap_or_else(|| panic!("Canton {} not seeded", name))
    }

    /// Creates a village and one of its quarters; returns their ids
    pub async fn village_with_quarter(&self, canton_id: i64, village: &str, quarter: &str) -> (i64, i64) {
        let (status, body) = self
            .post("/v1/collections/villages", json!({ "nom": village, "canton_id": canton_id }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let village_id = body["id"].as_i64().unwrap();

        let (status, body) = self
            .post("/v1/collections/quartiers", json!({ "nom": quarter, "village_id": village_id }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        (village_id, body["id"].as_i64().unwrap())
    }
}
