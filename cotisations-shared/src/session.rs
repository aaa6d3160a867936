/// Session preferences
///
/// Small UI preferences persisted as JSON values in the settings
/// collection under fixed keys, so that a restarted shell resumes where the
/// user left off.

use crate::store::{Store, StoreResult};
use tracing::debug;

/// Key of the last visited route
pub const LAST_ROUTE_KEY: &str = "derniere_route";

/// Key of the collapsed-sidebar flag
pub const SIDEBAR_COLLAPSED_KEY: &str = "sidebar_reduite";

/// Typed access to session preferences
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: Store,
}

impl SessionStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Route key visited last, if any
    pub async fn last_route(&self) -> StoreResult<Option<String>> {
        self.store.get_setting(LAST_ROUTE_KEY).await
    }

    /// Records the route key visited last
    pub async fn set_last_route(&self, route: &str) -> StoreResult<()> {
        debug!(route = %route, "Persisting last visited route");
        self.store.set_setting(LAST_ROUTE_KEY, &route).await
    }

    /// Whether the sidebar is collapsed; false when never set
    pub async fn sidebar_collapsed(&self) -> StoreResult<bool> {
        Ok(self
            .store
            .get_setting::<bool>(SIDEBAR_COLLAPSED_KEY)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_sidebar_collapsed(&self, collapsed: bool) -> StoreResult<()> {
        self.store.set_setting(SIDEBAR_COLLAPSED_KEY, &collapsed).await
    }
}
