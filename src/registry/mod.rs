// src/registry/mod.rs
mod admin;
mod memory;
mod record;

pub use admin::{add_backend, list_backends, validate_backend_url, NewBackend};
pub use memory::MemoryRegistry;
pub use record::BackendRecord;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid backend: {0}")]
    Validation(String),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Keyed store of backend records. `url` is the key.
///
/// `get_all` must return records in a stable order; the first leader in that
/// order is the one whose height becomes the reference.
#[async_trait]
pub trait BackendRegistry: Send + Sync {
    async fn get_all(&self) -> Result<Vec<BackendRecord>, RegistryError>;

    async fn get(&self, url: &str) -> Result<Option<BackendRecord>, RegistryError>;

    /// Upsert by `url`.
    async fn put(&self, record: BackendRecord) -> Result<(), RegistryError>;

    /// Returns whether a record was removed.
    async fn delete(&self, url: &str) -> Result<bool, RegistryError>;

    /// Write a poll outcome onto the stored record, leaving every other field
    /// alone. Applies only while the stored record is the same registration
    /// as `polled` (same `added_at`); returns `None` when it was removed or
    /// re-registered in the meantime.
    ///
    /// The default reads then writes. Stores with field-level updates should
    /// override it.
    async fn update_health(
        &self,
        polled: &BackendRecord,
        height: Option<u64>,
        is_healthy: bool,
    ) -> Result<Option<BackendRecord>, RegistryError> {
        match self.get(&polled.url).await? {
            Some(current) if current.added_at == polled.added_at => {
                let updated = current.with_health(height, is_healthy);
                self.put(updated.clone()).await?;
                Ok(Some(updated))
            }
            _ => Ok(None),
        }
    }
}
