/// Navigation session endpoints
///
/// The server hosts a single navigation session. Clients drive it with
/// fragments (`#cotisants?village_id=3`), forward DOM events to the mounted
/// view and render the returned document.
///
/// # Endpoints
///
/// - `GET /v1/shell` - Current document, route table and history
/// - `POST /v1/shell/navigate` - Open a route or a raw fragment
/// - `POST /v1/shell/back` - Return to the previous route
/// - `POST /v1/shell/events` - Dispatch a DOM event to the mounted view
/// - `POST /v1/shell/state` - Merge a partial state into the mounted view

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    shell::{
        router::{Document, HistoryEntry, RouteInfo},
        DispatchOutcome, DomEvent, NavigateOptions, Navigator, Transition,
    },
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// What the client needs to draw the shell
#[derive(Debug, Serialize)]
pub struct ShellSnapshot {
    /// Active route, if any
    pub route: Option<String>,

    /// Current fragment, `#route?query`
    pub fragment: String,

    /// Title, navigation highlight, breadcrumb and view markup
    pub document: Document,

    /// Sidebar entries
    pub routes: Vec<RouteInfo>,

    /// Previously active routes, oldest first
    pub history: Vec<HistoryEntry>,
}

impl ShellSnapshot {
    fn of(navigator: &Navigator) -> Self {
        Self {
            route: navigator.current_route().map(str::to_string),
            fragment: navigator.fragment().to_string(),
            document: navigator.document().clone(),
            routes: navigator.routes(),
            history: navigator.history(),
        }
    }
}

/// Navigation request
///
/// Either `fragment` (raw, as typed in the address bar) or `route` with
/// optional `query` and `replace`.
#[derive(Debug, Default, Deserialize)]
pub struct NavigateRequest {
    #[serde(default)]
    pub fragment: Option<String>,

    #[serde(default)]
    pub route: Option<String>,

    #[serde(default)]
    pub query: BTreeMap<String, String>,

    #[serde(default)]
    pub replace: bool,
}

/// Result of a route change
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub transition: Transition,
    pub shell: ShellSnapshot,
}

/// Result of a dispatched event
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub outcome: DispatchOutcome,
    pub shell: ShellSnapshot,
}

/// Current shell
pub async fn current(State(state): State<AppState>) -> ApiResult<Json<ShellSnapshot>> {
    let navigator = state.shell.navigator().await;
    Ok(Json(ShellSnapshot::of(&navigator)))
}

/// Navigate
///
/// ```text
/// POST /v1/shell/navigate
///
/// { "route": "cotisants", "query": { "village_id": "3" } }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: `route` names no registered route (unknown
///   fragments fall back to the default route instead)
/// - `422 Unprocessable Entity`: Neither `route` nor `fragment` given
pub async fn navigate(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let mut navigator = state.shell.navigator().await;

    let transition = match (request.fragment, request.route) {
        (Some(fragment), _) => navigator.open_fragment(&fragment).await?,
        (None, Some(route)) => {
            let options = NavigateOptions {
                replace: request.replace,
                query: request.query,
            };
            navigator.navigate_to(&route, options).await?
        }
        (None, None) => return Err(ApiError::invalid("route", "A route or a fragment is required")),
    };

    debug!(?transition, "Navigation handled");

    Ok(Json(TransitionResponse {
        transition,
        shell: ShellSnapshot::of(&navigator),
    }))
}

/// Go back
pub async fn back(State(state): State<AppState>) -> ApiResult<Json<TransitionResponse>> {
    let mut navigator = state.shell.navigator().await;
    let transition = navigator.go_back().await?;

    Ok(Json(TransitionResponse {
        transition,
        shell: ShellSnapshot::of(&navigator),
    }))
}

/// Dispatch a DOM event
///
/// ```text
/// POST /v1/shell/events
///
/// { "type": "click", "container": "#liste-cotisants",
///   "data": { "action": "supprimer-cotisant", "id": "4" } }
/// ```
///
/// A destructive action first answers `confirmation_required`; sending the
/// same event again with `"confirmation": true` performs it. A second
/// submission of a form still being saved answers `dropped`.
///
/// # Errors
///
/// - `409 Conflict`: No view is mounted
pub async fn dispatch_event(
    State(state): State<AppState>,
    Json(event): Json<DomEvent>,
) -> ApiResult<Json<EventResponse>> {
    let outcome = state.shell.dispatch(event).await?;
    let navigator = state.shell.navigator().await;

    Ok(Json(EventResponse {
        outcome,
        shell: ShellSnapshot::of(&navigator),
    }))
}

/// Merge a partial state into the mounted view and re-render it
pub async fn update_state(
    State(state): State<AppState>,
    Json(partial): Json<Value>,
) -> ApiResult<Json<ShellSnapshot>> {
    if !partial.is_object() {
        return Err(ApiError::BadRequest("State must be a JSON object".to_string()));
    }

    let mut navigator = state.shell.navigator().await;
    navigator.update_view_state(partial).await?;

    Ok(Json(ShellSnapshot::of(&navigator)))
}
