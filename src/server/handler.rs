// src/server/handler.rs
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::metrics::{PrometheusSink, SinkError};
use crate::registry::{add_backend, list_backends, BackendRegistry, NewBackend, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Registry(String),

    #[error("Failed to read request body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Failed to encode metrics: {0}")]
    Metrics(#[from] SinkError),

    #[error("Failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<RegistryError> for AdminError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(msg) => AdminError::Validation(msg),
            RegistryError::Unavailable(msg) => AdminError::Registry(msg),
        }
    }
}

impl AdminError {
    fn kind(&self) -> &'static str {
        match self {
            AdminError::Parse(_) => "parse_error",
            AdminError::Validation(_) => "validation_error",
            _ => "error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AdminError::Parse(_) | AdminError::Validation(_) | AdminError::Body(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_response(self) -> Response<Body> {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%self, "admin request failed");
        }
        let body = json!({ "type": self.kind(), "error": self.to_string() });
        text_response(status, "application/json", body.to_string())
    }
}

/// Routes for registering backends and scraping metrics.
#[derive(Clone)]
pub struct AdminHandler {
    registry: Arc<dyn BackendRegistry>,
    metrics: Option<Arc<PrometheusSink>>,
    metrics_path: Arc<str>,
}

impl AdminHandler {
    pub fn new(registry: Arc<dyn BackendRegistry>, metrics_path: &str) -> Self {
        Self {
            registry,
            metrics: None,
            metrics_path: Arc::from(metrics_path),
        }
    }

    pub fn with_metrics(mut self, sink: Arc<PrometheusSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    async fn route(self, req: Request<Body>) -> Result<Response<Body>, AdminError> {
        let path = req.uri().path().to_string();
        match (req.method().clone(), path.as_str()) {
            (Method::POST, "/backends") => {
                let bytes = hyper::body::to_bytes(req.into_body()).await?;
                let new = parse_new_backend(&bytes)?;
                let record = add_backend(self.registry.as_ref(), new).await?;
                json_response(StatusCode::CREATED, &record)
            }
            (Method::GET, "/backends") => {
                let records = list_backends(self.registry.as_ref()).await?;
                json_response(StatusCode::OK, &records)
            }
            (Method::GET, p) if p == &*self.metrics_path => match &self.metrics {
                Some(sink) => {
                    let body = sink.gather()?;
                    Ok(text_response(
                        StatusCode::OK,
                        "text/plain; version=0.0.4",
                        body,
                    ))
                }
                None => Ok(not_found()),
            },
            _ => Ok(not_found()),
        }
    }
}

impl Service<Request<Body>> for AdminHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move {
            tracing::debug!(method = %req.method(), path = %req.uri().path(), "admin request");
            Ok(handler
                .route(req)
                .await
                .unwrap_or_else(AdminError::into_response))
        })
    }
}

/// Malformed JSON is a parse error; well-formed JSON of the wrong shape is a
/// validation error.
fn parse_new_backend(bytes: &[u8]) -> Result<NewBackend, AdminError> {
    serde_json::from_slice(bytes).map_err(|e| {
        if e.is_data() {
            AdminError::Validation(e.to_string())
        } else {
            AdminError::Parse(e.to_string())
        }
    })
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, AdminError> {
    let body = serde_json::to_vec(value).map_err(AdminError::Encode)?;
    Ok(text_response(status, "application/json", body))
}

fn text_response(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricPoint, MetricsSink};
    use crate::registry::{BackendRecord, MemoryRegistry};
    use tower::ServiceExt;

    async fn call(handler: AdminHandler, method: Method, path: &str, body: &str) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = handler.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_add_and_list_backends() {
        let registry = Arc::new(MemoryRegistry::new());
        let handler = AdminHandler::new(registry.clone(), "/metrics");

        let (status, body) = call(
            handler.clone(),
            Method::POST,
            "/backends",
            r#"{"url": "http://node1:8545", "is_leader": true}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: BackendRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(created.url, "http://node1:8545");
        assert!(created.is_leader);
        assert!(!created.is_healthy);
        assert_eq!(created.height, None);

        let (status, body) = call(handler, Method::GET, "/backends", "").await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<BackendRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let handler = AdminHandler::new(Arc::new(MemoryRegistry::new()), "/metrics");

        let (status, body) = call(handler, Method::POST, "/backends", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["type"], "parse_error");
    }

    #[tokio::test]
    async fn test_wrong_shape_is_validation_error() {
        let handler = AdminHandler::new(Arc::new(MemoryRegistry::new()), "/metrics");

        for body in [
            r#"{"url": "http://node1"}"#,
            r#"{"url": 5, "is_leader": false}"#,
            r#"{"url": "ftp://node1", "is_leader": false}"#,
        ] {
            let (status, response) = call(handler.clone(), Method::POST, "/backends", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
            let value: serde_json::Value = serde_json::from_str(&response).unwrap();
            assert_eq!(value["type"], "validation_error", "{}", body);
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Arc::new(MemoryRegistry::new());
        let sink = Arc::new(PrometheusSink::new().unwrap());
        let point = MetricPoint {
            name: crate::metrics::HEALTHY_NODES.to_string(),
            value: 3.0,
            unit: crate::metrics::MetricUnit::Count,
            timestamp: chrono::Utc::now(),
            tags: vec![crate::metrics::Tag {
                name: "stack".to_string(),
                value: "s".to_string(),
            }],
        };
        sink.emit(vec![point]).await.unwrap();

        let handler = AdminHandler::new(registry.clone(), "/prom").with_metrics(sink);
        let (status, body) = call(handler, Method::GET, "/prom", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("fleet_healthy_nodes"));

        let without = AdminHandler::new(registry, "/prom");
        let (status, _) = call(without, Method::GET, "/prom", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let handler = AdminHandler::new(Arc::new(MemoryRegistry::new()), "/metrics");
        let (status, _) = call(handler, Method::DELETE, "/backends", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
