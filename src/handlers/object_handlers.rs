//! HTTP handlers for the five blob operations.
//! Each one turns a [`BlobRequest`] into a response through the `BlobStore`;
//! failures come back as [`AppError`] for the dispatcher to render.

use crate::{
    errors::AppError,
    handlers::request::{BlobRequest, key_from_locator},
    models::{
        metadata::{BlobAttributes, BlobLocation, BlobMetadata},
        object::{DeleteBlobsRequest, PutBlobResponse},
    },
    services::blob_store::BlobStore,
};
use axum::{
    Json,
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Query parameter naming the source of a copy.
pub const COPY_SOURCE_PARAM: &str = "fromUrl";

/// Query parameter naming the blob whose metadata is requested.
pub const METADATA_TARGET_PARAM: &str = "url";

/// Query parameter forcing a download disposition.
pub const DOWNLOAD_PARAM: &str = "download";

/// `PUT <path>`: store the raw body under `path`, replacing any previous blob.
pub async fn put_blob(store: &BlobStore, req: BlobRequest) -> Result<Response, AppError> {
    let attributes = BlobAttributes::from_headers(&req.headers);
    let location = BlobLocation::new(&req.origin, &req.pathname);
    let metadata = store
        .write(&req.pathname, req.body, location, attributes)
        .await?;

    Ok(Json(PutBlobResponse::from(&metadata)).into_response())
}

/// `GET <path>`: the blob content with headers from its metadata.
pub async fn get_blob(store: &BlobStore, req: BlobRequest) -> Result<Response, AppError> {
    let blob = store.read(&req.pathname).await?;
    let download = req.query_param(DOWNLOAD_PARAM) == Some("1");

    let mut response = Response::new(Body::from(blob.content));
    *response.status_mut() = StatusCode::OK;
    set_blob_headers(response.headers_mut(), &blob.metadata, download);

    Ok(response)
}

/// `GET /?url=<locator>`: the full metadata record, no content.
pub async fn head_blob(store: &BlobStore, req: BlobRequest) -> Result<Response, AppError> {
    let key = req
        .query_param(METADATA_TARGET_PARAM)
        .map(key_from_locator)
        .ok_or_else(|| AppError::not_found("missing url parameter"))?;
    let meta = store.read_metadata(&key).await?;

    Ok(Json(meta).into_response())
}

/// `PUT <path>?fromUrl=<locator>`: duplicate a blob under `path`.
pub async fn copy_blob(store: &BlobStore, req: BlobRequest) -> Result<Response, AppError> {
    let source = req
        .query_param(COPY_SOURCE_PARAM)
        .map(key_from_locator)
        .ok_or_else(|| AppError::not_found("missing fromUrl parameter"))?;
    let location = BlobLocation::new(&req.origin, &req.pathname);
    let meta = store.copy(&source, &req.pathname, location).await?;

    Ok(Json(meta).into_response())
}

/// `POST /delete` with `{"urls": [...]}`: remove each listed blob.
///
/// Entries are independent. Missing blobs and per-entry failures are
/// skipped, so a well-formed request always answers 200.
pub async fn delete_blobs(store: &BlobStore, req: BlobRequest) -> Result<Response, AppError> {
    let payload: DeleteBlobsRequest = serde_json::from_slice(&req.body)?;

    for locator in &payload.urls {
        let key = key_from_locator(locator);
        if let Err(err) = store.delete(&key).await {
            warn!("skipping delete of {}: {}", locator, err);
        }
    }

    Ok(StatusCode::OK.into_response())
}

fn set_blob_headers(headers: &mut HeaderMap, meta: &BlobMetadata, download: bool) {
    let content_type = meta
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));
    insert_text(headers, header::CACHE_CONTROL, &meta.cache_control);
    insert_text(headers, header::LAST_MODIFIED, &meta.last_modified());

    if download {
        insert_text(headers, header::CONTENT_DISPOSITION, &meta.content_disposition);
    }
}

fn insert_text(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!("dropping unrepresentable {} header value `{}`", name, value),
    }
}
