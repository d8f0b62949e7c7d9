//! Shared application state carried by the router.

use crate::{routes::table::RouteTable, services::blob_store::BlobStore};
use axum::http::{HeaderMap, header};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: BlobStore,
    pub routes: Arc<RouteTable>,
    /// Configured public base URL; overrides the request's own origin.
    pub public_url: Option<String>,
    /// Origin used when a request carries no `Host` header.
    pub fallback_origin: String,
}

impl AppState {
    pub fn new(store: BlobStore, public_url: Option<String>, fallback_origin: String) -> Self {
        Self {
            store,
            routes: Arc::new(RouteTable::standard()),
            public_url: public_url.map(|url| url.trim_end_matches('/').to_string()),
            fallback_origin,
        }
    }

    /// The origin blob URLs are built from for a request with these headers.
    pub fn origin_for(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }

        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty());
        let Some(host) = host else {
            return self.fallback_origin.clone();
        };

        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("http");

        format!("{}://{}", scheme, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn test_state(public_url: Option<&str>) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let state = AppState::new(
            store,
            public_url.map(str::to_string),
            "http://localhost:3000".into(),
        );
        (dir, state)
    }

    #[test]
    fn test_origin_from_host_header() {
        let (_dir, state) = test_state(None);
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("blobs.test:9000"));
        assert_eq!(state.origin_for(&headers), "http://blobs.test:9000");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        assert_eq!(state.origin_for(&headers), "https://blobs.test:9000");
    }

    #[test]
    fn test_origin_fallback_and_override() {
        let (_dir, state) = test_state(None);
        assert_eq!(state.origin_for(&HeaderMap::new()), "http://localhost:3000");

        let (_dir, state) = test_state(Some("https://cdn.example/"));
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("ignored:1"));
        assert_eq!(state.origin_for(&headers), "https://cdn.example");
    }
}
