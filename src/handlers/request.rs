//! Request context handed to the operation handlers.

use axum::{
    extract::Query,
    http::{HeaderMap, Method, Uri},
};
use bytes::Bytes;
use std::collections::HashMap;

/// Everything a handler may look at, extracted once by the dispatcher.
#[derive(Debug)]
pub struct BlobRequest {
    pub method: Method,
    /// Raw URL path; doubles as the object key.
    pub pathname: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Scheme and authority blob URLs are built from.
    pub origin: String,
}

impl BlobRequest {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes, origin: String) -> Self {
        let query = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        Self {
            method,
            pathname: uri.path().to_string(),
            query,
            headers,
            body,
            origin,
        }
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Reduce a blob locator to an object key.
///
/// Absolute URLs (`http://host/a.txt`) keep only their path; plain paths
/// lose any query or fragment; bare names gain a leading `/`.
pub fn key_from_locator(locator: &str) -> String {
    let locator = locator.trim();
    if let Ok(uri) = locator.parse::<Uri>() {
        if uri.scheme().is_some() {
            return uri.path().to_string();
        }
    }

    let path = locator.split(['?', '#']).next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
