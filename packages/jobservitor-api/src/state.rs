use std::sync::Arc;

use jobservitor_store::BaseStore;

/// Shared application state: the store handle, plus the same opt-in record
/// TTL setting the executor applies on finalize. Axum's `State` extractor
/// clones this per-request, which is cheap since the store itself is an
/// `Arc`-backed connection pool/manager.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BaseStore>,
    pub record_ttl_seconds: Option<u64>,
}

impl AppState {
    pub fn new(store: Arc<dyn BaseStore>, record_ttl_seconds: Option<u64>) -> Self {
        Self {
            store,
            record_ttl_seconds,
        }
    }
}
