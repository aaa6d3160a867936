/// Fragment router
///
/// The [`Navigator`] owns the route table, the location (the current
/// fragment, e.g. `#cotisants?village_id=3`), the navigation history and
/// the mounted view. A transition runs the guards, records the previous
/// route, updates the [`Document`] (title, active navigation, breadcrumb),
/// swaps the view under a bounded mount time, persists the route as last
/// visited and publishes a `RouteChanged` event.
///
/// A view that fails or times out while mounting is replaced by an inline
/// error panel; the navigator itself keeps working.
///
/// # Example
///
/// ```no_run
/// use cotisations_api::shell::router::{NavigateOptions, Navigator};
/// use cotisations_api::shell::view::ViewContext;
/// use cotisations_shared::events::EventBus;
/// use std::time::Duration;
///
/// # async fn example(ctx: ViewContext, events: EventBus) -> anyhow::Result<()> {
/// let mut navigator = Navigator::new(ctx, events, Duration::from_secs(5));
/// cotisations_api::shell::views::register_all(&mut navigator);
///
/// navigator.resume(None).await?;
/// navigator.navigate_to("cotisants", NavigateOptions::default()).await?;
/// println!("{}", navigator.document().title);
/// # Ok(())
/// # }
/// ```

use super::markup;
use super::view::{DispatchOutcome, DomEvent, View, ViewContext, ViewError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cotisations_shared::events::{AppEvent, DataChange, EventBus, RouteChange};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Application name appended to every page title
pub const APP_NAME: &str = "Gestionnaire Cotisations Togo";

/// Route shown for an empty or unknown fragment
pub const DEFAULT_ROUTE: &str = "tableau-bord";

/// Maximum number of entries kept in the navigation history
pub const HISTORY_LIMIT: usize = 50;

/// Default bound on mounting a view
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Builds a fresh view for a route
pub type ViewFactory = Arc<dyn Fn() -> Box<dyn View> + Send + Sync>;

/// Navigation errors
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Route not found: {0}")]
    UnknownRoute(String),

    #[error("No view is mounted")]
    NoView,

    #[error("Invalid query string: {0}")]
    Query(String),

    #[error(transparent)]
    View(#[from] ViewError),
}

/// Route table entry
#[derive(Clone)]
pub struct Route {
    pub key: String,
    pub title: String,
    pub icon: String,
    factory: ViewFactory,
}

impl Route {
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            key: self.key.clone(),
            title: self.title.clone(),
            icon: self.icon.clone(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("icon", &self.icon)
            .finish_non_exhaustive()
    }
}

/// Public description of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub key: String,
    pub title: String,
    pub icon: String,
}

/// Ordered middleware run before every transition
///
/// Returning false aborts the transition.
#[async_trait]
pub trait NavigationGuard: Send + Sync {
    async fn allow(&self, target: &RouteInfo, current: Option<&RouteInfo>) -> bool;
}

/// Options of [`Navigator::navigate_to`]
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// Replace the current location instead of pushing a new one
    pub replace: bool,

    /// Query parameters appended to the fragment
    pub query: BTreeMap<String, String>,
}

impl NavigateOptions {
    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Default::default()
        }
    }
}

/// Previously active route
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub route: String,
    pub at: DateTime<Utc>,
}

/// Breadcrumb item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub title: String,
    pub icon: String,
}

/// What the client displays
#[derive(Debug, Clone, Default, Serialize)]
pub struct Document {
    pub title: String,
    pub fragment: String,
    pub active_nav: Option<String>,
    pub breadcrumb: Vec<Crumb>,
    pub content: String,
}

/// Result of a route change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Transition {
    /// The route is active and its view mounted
    Completed { route: String },

    /// The route is active but its view failed; an error panel is shown
    Failed { route: String, message: String },

    /// A guard refused the transition
    Blocked { route: String },
}

struct Mounted {
    route: String,
    view: Box<dyn View>,
    context: ViewContext,
}

/// Navigation state machine hosting one view at a time
pub struct Navigator {
    routes: Vec<Route>,
    guards: Vec<Arc<dyn NavigationGuard>>,
    default_route: String,
    context: ViewContext,
    events: EventBus,
    mount_timeout: Duration,
    location: Vec<String>,
    current: Option<String>,
    history: VecDeque<HistoryEntry>,
    mounted: Option<Mounted>,
    document: Document,
}

impl Navigator {
    /// Creates a navigator with an empty route table
    pub fn new(context: ViewContext, events: EventBus, mount_timeout: Duration) -> Self {
        Self {
            routes: Vec::new(),
            guards: Vec::new(),
            default_route: DEFAULT_ROUTE.to_string(),
            context,
            events,
            mount_timeout,
            location: Vec::new(),
            current: None,
            history: VecDeque::new(),
            mounted: None,
            document: Document {
                title: APP_NAME.to_string(),
                ..Default::default()
            },
        }
    }

    /// Registers a route; redefining a key replaces it
    pub fn define_route<F>(&mut self, key: &str, title: &str, icon: &str, factory: F)
    where
        F: Fn() -> Box<dyn View> + Send + Sync + 'static,
    {
        let route = Route {
            key: key.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
            factory: Arc::new(factory),
        };

        match self.routes.iter_mut().find(|r| r.key == key) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    /// Appends a guard to the chain
    pub fn add_guard(&mut self, guard: Arc<dyn NavigationGuard>) {
        self.guards.push(guard);
    }

    pub fn set_default_route(&mut self, key: &str) {
        self.default_route = key.to_string();
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(Route::info).collect()
    }

    pub fn route_exists(&self, key: &str) -> bool {
        self.route(key).is_some()
    }

    fn route(&self, key: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.key == key)
    }

    /// Key of the active route
    pub fn current_route(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Previously active routes, oldest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().cloned().collect()
    }

    /// Current fragment
    pub fn fragment(&self) -> &str {
        self.location.last().map(String::as_str).unwrap_or("")
    }

    /// Every location entry, oldest first
    pub fn location_history(&self) -> &[String] {
        &self.location
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Name of the mounted view
    pub fn view_name(&self) -> Option<&'static str> {
        self.mounted.as_ref().map(|m| m.view.name())
    }

    fn push_location(&mut self, fragment: String) {
        self.location.push(fragment);
    }

    fn replace_location(&mut self, fragment: String) {
        match self.location.last_mut() {
            Some(last) => *last = fragment,
            None => self.location.push(fragment),
        }
    }

    /// Navigates to a known route
    ///
    /// Unknown routes are refused with a warning and leave everything as is.
    pub async fn navigate_to(&mut self, route: &str, options: NavigateOptions) -> Result<Transition, NavigationError> {
        if !self.route_exists(route) {
            warn!(route = %route, "Route not found");
            return Err(NavigationError::UnknownRoute(route.to_string()));
        }

        let fragment = build_fragment(route, &options.query)?;
        if options.replace {
            self.replace_location(fragment);
        } else {
            self.push_location(fragment);
        }

        self.handle_route_change().await
    }

    /// Sets the location to a raw fragment and handles it
    pub async fn open_fragment(&mut self, fragment: &str) -> Result<Transition, NavigationError> {
        self.push_location(normalize_fragment(fragment));
        self.handle_route_change().await
    }

    /// Returns to the previous route, or the default one
    pub async fn go_back(&mut self) -> Result<Transition, NavigationError> {
        match self.history.pop_back() {
            Some(entry) => self.navigate_to(&entry.route, NavigateOptions::replace()).await,
            None => {
                let default = self.default_route.clone();
                self.navigate_to(&default, NavigateOptions::default()).await
            }
        }
    }

    /// Restores a session: the given fragment, else the last visited
    /// route, else the default route
    pub async fn resume(&mut self, fragment: Option<&str>) -> Result<Transition, NavigationError> {
        if let Some(fragment) = fragment.filter(|f| !f.trim_start_matches('#').is_empty()) {
            return self.open_fragment(fragment).await;
        }

        let last = match self.context.session.last_route().await {
            Ok(last) => last.filter(|route| self.route_exists(route)),
            Err(e) => {
                warn!(error = %e, "Could not read the last visited route");
                None
            }
        };
        let route = last.unwrap_or_else(|| self.default_route.clone());
        info!(route = %route, "Resuming navigation");
        self.navigate_to(&route, NavigateOptions::replace()).await
    }

    /// Resolves the current fragment and performs the transition
    pub async fn handle_route_change(&mut self) -> Result<Transition, NavigationError> {
        let mut redirected = false;
        let (route, query) = loop {
            let (key, query) = parse_fragment(self.fragment())?;
            let key = if key.is_empty() { self.default_route.clone() } else { key };

            if let Some(route) = self.route(&key) {
                break (route.clone(), query);
            }

            warn!(route = %key, "Route not found, redirecting to the default route");
            if redirected || key == self.default_route {
                return Err(NavigationError::UnknownRoute(key));
            }
            redirected = true;
            let fallback = format!("#{}", self.default_route);
            self.replace_location(fallback);
        };

        let target = route.info();
        let current = self
            .current
            .as_deref()
            .and_then(|key| self.route(key))
            .map(Route::info);
        for guard in &self.guards {
            if !guard.allow(&target, current.as_ref()).await {
                info!(route = %route.key, "Navigation blocked by a guard");
                return Ok(Transition::Blocked { route: route.key });
            }
        }

        if let Some(previous) = &self.current {
            self.history.push_back(HistoryEntry {
                route: previous.clone(),
                at: Utc::now(),
            });
            while self.history.len() > HISTORY_LIMIT {
                self.history.pop_front();
            }
        }
        let previous = self.current.replace(route.key.clone());

        self.update_document(&route);
        self.document.content = markup::loading_panel();

        if let Some(mut mounted) = self.mounted.take() {
            debug!(view = mounted.view.name(), route = %mounted.route, "Cleaning up view");
            mounted.view.cleanup().await;
        }

        let context = self.context.with_query(query);
        let mut view = (route.factory)();
        let transition = match tokio::time::timeout(self.mount_timeout, view.refresh(&context)).await {
            Ok(Ok(content)) => {
                debug!(view = view.name(), route = %route.key, "View mounted");
                self.document.content = content;
                self.mounted = Some(Mounted {
                    route: route.key.clone(),
                    view,
                    context,
                });
                Transition::Completed {
                    route: route.key.clone(),
                }
            }
            Ok(Err(e)) => {
                error!(route = %route.key, error = %e, "View failed to load");
                self.fail(&route.key, e.to_string())
            }
            Err(_) => {
                error!(route = %route.key, timeout_ms = self.mount_timeout.as_millis() as u64, "View mount timed out");
                self.fail(&route.key, "Le chargement de la page a expiré.".to_string())
            }
        };

        if let Err(e) = self.context.session.set_last_route(&route.key).await {
            warn!(error = %e, "Could not persist the last visited route");
        }

        self.events.publish(AppEvent::RouteChanged(RouteChange {
            route: route.key.clone(),
            previous,
            fragment: self.fragment().to_string(),
            at: Utc::now(),
        }));

        info!(route = %route.key, "Route changed");
        Ok(transition)
    }

    fn fail(&mut self, route: &str, message: String) -> Transition {
        self.document.content = markup::error_panel(&message);
        Transition::Failed {
            route: route.to_string(),
            message,
        }
    }

    fn update_document(&mut self, route: &Route) {
        self.document.title = format!("{} - {}", route.title, APP_NAME);
        self.document.fragment = self.fragment().to_string();
        self.document.active_nav = Some(route.key.clone());
        self.document.breadcrumb = vec![
            Crumb {
                title: "Accueil".to_string(),
                icon: "home".to_string(),
            },
            Crumb {
                title: route.title.clone(),
                icon: route.icon.clone(),
            },
        ];
    }

    /// Sends a UI event to the mounted view
    ///
    /// The `recharger` action of the error panel reloads the current
    /// fragment even when no view is mounted.
    pub async fn dispatch(&mut self, event: &DomEvent) -> Result<DispatchOutcome, NavigationError> {
        if event.data.get("action").map(String::as_str) == Some("recharger") {
            self.handle_route_change().await?;
            return Ok(DispatchOutcome::Handled {
                action: "recharger".to_string(),
            });
        }

        let mounted = self.mounted.as_mut().ok_or(NavigationError::NoView)?;
        let outcome = mounted.view.dispatch(&mounted.context, event).await?;
        self.document.content = mounted.view.base().markup().to_string();
        Ok(outcome)
    }

    /// Merges a partial state into the mounted view
    pub async fn update_view_state(&mut self, partial: serde_json::Value) -> Result<(), NavigationError> {
        let mounted = self.mounted.as_mut().ok_or(NavigationError::NoView)?;
        self.document.content = mounted.view.update_state(&mounted.context, partial).await?;
        Ok(())
    }

    /// Re-renders the mounted view when it watches the changed collection
    pub async fn on_data_changed(&mut self, change: &DataChange) -> bool {
        let Some(mounted) = self.mounted.as_mut() else {
            return false;
        };
        if !mounted.view.watches().contains(&change.collection) {
            return false;
        }

        debug!(view = mounted.view.name(), collection = %change.collection, "Refreshing view after data change");
        match mounted.view.refresh(&mounted.context).await {
            Ok(content) => {
                self.document.content = content;
                true
            }
            Err(e) => {
                warn!(view = mounted.view.name(), error = %e, "View refresh failed");
                false
            }
        }
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("routes", &self.routes)
            .field("current", &self.current)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

fn normalize_fragment(fragment: &str) -> String {
    format!("#{}", fragment.trim().trim_start_matches('#'))
}

/// Builds `#route?query`
pub fn build_fragment(route: &str, query: &BTreeMap<String, String>) -> Result<String, NavigationError> {
    if query.is_empty() {
        return Ok(format!("#{}", route));
    }
    let encoded = serde_urlencoded::to_string(query).map_err(|e| NavigationError::Query(e.to_string()))?;
    Ok(format!("#{}?{}", route, encoded))
}

/// Splits `#route?query` into the route key and its parameters
pub fn parse_fragment(fragment: &str) -> Result<(String, BTreeMap<String, String>), NavigationError> {
    let fragment = fragment.trim().trim_start_matches('#');
    let (key, query) = fragment.split_once('?').unwrap_or((fragment, ""));
    let query = if query.is_empty() {
        BTreeMap::new()
    } else {
        serde_urlencoded::from_str(query).map_err(|e| NavigationError::Query(e.to_string()))?
    };
    Ok((key.to_string(), query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment() {
        let (key, query) = parse_fragment("#cotisants?village_id=3&recherche=Ama%20K").unwrap();
        assert_eq!(key, "cotisants");
        assert_eq!(query.get("village_id").map(String::as_str), Some("3"));
        assert_eq!(query.get("recherche").map(String::as_str), Some("Ama K"));

        let (key, query) = parse_fragment("").unwrap();
        assert!(key.is_empty());
        assert!(query.is_empty());

        let (key, _) = parse_fragment("paiements").unwrap();
        assert_eq!(key, "paiements");
    }

    #[test]
    fn test_build_fragment() {
        assert_eq!(build_fragment("cantons", &BTreeMap::new()).unwrap(), "#cantons");

        let query = BTreeMap::from([("canton_id".to_string(), "1".to_string()), ("q".to_string(), "a b".to_string())]);
        assert_eq!(build_fragment("statistiques", &query).unwrap(), "#statistiques?canton_id=1&q=a+b");
    }

    #[test]
    fn test_normalize_fragment() {
        assert_eq!(normalize_fragment("cotisants"), "#cotisants");
        assert_eq!(normalize_fragment("#cotisants"), "#cotisants");
        assert_eq!(normalize_fragment(""), "#");
    }
}
