//! HTTP handlers.

pub mod orders;
pub mod products;
pub mod system;
pub mod users;

use store::{RecordId, Store};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    /// Name of the storage backend, reported by `/health`.
    pub backend: &'static str,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, backend: &'static str) -> Self {
        Self { store, backend }
    }
}

fn parse_record_id(id: &str) -> Result<RecordId, ApiError> {
    let id: RecordId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    if !id.is_set() {
        return Err(ApiError::BadRequest("ID must be non-zero".to_string()));
    }
    Ok(id)
}
