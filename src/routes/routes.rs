//! Builds the HTTP router for the blob API.
//!
//! ## Surface
//! - `PUT  <path>`                  upload blob
//! - `PUT  <path>?fromUrl=<src>`    copy blob
//! - `GET  <path>[?download=1]`     download blob content
//! - `GET  /?url=<blob>`            blob metadata
//! - `POST /delete`                 batch delete, body `{"urls": [...]}`
//!
//! These are URL shapes, not registered axum paths.
//!
//! Query parameters decide between overlapping operations, which axum's path
//! router cannot express, so every request goes to the dispatcher and the
//! route table picks the operation.

use crate::{routes::dispatcher::dispatch, state::AppState};
use axum::{Router, extract::DefaultBodyLimit};

/// Build the router. The caller attaches an [`AppState`] with `with_state`.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
