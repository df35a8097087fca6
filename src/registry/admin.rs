// src/registry/admin.rs
use super::{BackendRecord, BackendRegistry, RegistryError};
use serde::Deserialize;
use url::Url;

/// Request body for registering a backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewBackend {
    pub url: String,
    pub is_leader: bool,
}

pub fn validate_backend_url(raw: &str) -> Result<Url, RegistryError> {
    let url = Url::parse(raw)
        .map_err(|e| RegistryError::Validation(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(RegistryError::Validation(format!(
                "{}: unsupported scheme {}",
                raw, other
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(RegistryError::Validation(format!("{}: missing host", raw)));
    }

    Ok(url)
}

/// Register a backend. An existing record with the same url is replaced and
/// starts over as unhealthy with no observed height.
pub async fn add_backend(
    registry: &dyn BackendRegistry,
    new: NewBackend,
) -> Result<BackendRecord, RegistryError> {
    validate_backend_url(&new.url)?;

    let record = BackendRecord::new(new.url, new.is_leader);
    registry.put(record.clone()).await?;

    tracing::info!(
        url = %record.url,
        is_leader = record.is_leader,
        "Added new backend"
    );
    Ok(record)
}

pub async fn list_backends(
    registry: &dyn BackendRegistry,
) -> Result<Vec<BackendRecord>, RegistryError> {
    registry.get_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    #[tokio::test]
    async fn test_add_backend() {
        let registry = MemoryRegistry::new();
        let record = add_backend(
            &registry,
            NewBackend {
                url: "http://my.rpc.local:8545".to_string(),
                is_leader: false,
            },
        )
        .await
        .unwrap();

        assert!(!record.is_healthy);
        assert_eq!(record.height, None);

        let stored = registry.get("http://my.rpc.local:8545").await.unwrap().unwrap();
        assert!(!stored.is_leader);
        assert_eq!(stored.added_at, record.added_at);
        assert_eq!(list_backends(&registry).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_backend_rejects_bad_urls() {
        let registry = MemoryRegistry::new();
        for url in ["my.rpc.local", "ftp://node:21", "http://"] {
            let result = add_backend(
                &registry,
                NewBackend {
                    url: url.to_string(),
                    is_leader: false,
                },
            )
            .await;
            assert!(
                matches!(result, Err(RegistryError::Validation(_))),
                "{} should be rejected",
                url
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_new_backend_schema() {
        assert!(serde_json::from_str::<NewBackend>(r#"{"url":"http://a","is_leader":true}"#).is_ok());
        assert!(serde_json::from_str::<NewBackend>(r#"{"url":"http://a"}"#).is_err());
        assert!(serde_json::from_str::<NewBackend>(
            r#"{"url":"http://a","is_leader":true,"extra":1}"#
        )
        .is_err());
    }
}
