use std::sync::Arc;

use crate::store::TaskStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn TaskStore>, api_key: &str) -> Self {
        Self {
            store,
            api_key: Arc::from(api_key),
        }
    }

    /// Exact match against the configured shared secret.
    pub fn is_authorized(&self, secret: &str) -> bool {
        secret == &*self.api_key
    }
}
