//! Shared helpers for API integration tests.
//!
//! The app is built through the production router over an
//! [`InMemoryStore`] and a [`RecordingDispatch`], with uploads written to a
//! temporary application root.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use testrun_api::config::ServerConfig;
use testrun_api::router::build_app_router;
use testrun_api::state::AppState;
use testrun_core::memory::{InMemoryStore, RecordingDispatch};
use testrun_events::EventBus;

pub const BOUNDARY: &str = "----testrun-boundary";

/// Build a test `ServerConfig` rooted at `app_root`.
pub fn test_config(app_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        app_root: app_root.to_path_buf(),
        max_upload_bytes: 1024 * 1024,
    }
}

/// Everything a test needs to drive and inspect the app.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub dispatch: Arc<RecordingDispatch>,
    pub event_bus: Arc<EventBus>,
    pub app_root: TempDir,
    config: ServerConfig,
}

impl TestApp {
    pub fn new() -> Self {
        let app_root = tempfile::tempdir().unwrap();
        Self {
            store: Arc::new(InMemoryStore::new()),
            dispatch: Arc::new(RecordingDispatch::new()),
            event_bus: Arc::new(EventBus::default()),
            config: test_config(app_root.path()),
            app_root,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    /// A fresh router over the shared store; `oneshot` consumes it.
    pub fn router(&self) -> Router {
        let state = AppState::new(
            self.store.clone(),
            self.dispatch.clone(),
            Arc::clone(&self.event_bus),
            self.config.clone(),
        );
        build_app_router(state, &self.config)
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.router(), uri).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        post_json(self.router(), uri, body).await
    }

    pub async fn upload(&self, parts: &[Part<'_>]) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/test-files")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.router().oneshot(request).await.unwrap()
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// One multipart form part.
pub enum Part<'a> {
    Text {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
