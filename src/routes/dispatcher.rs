//! The single entry point for every request.
//!
//! Resolves the operation through the route table, runs its handler, and is
//! the one place where failures become responses: unmatched requests get an
//! empty 404, handler errors their own status, and handler panics a 500
//! carrying the panic message.

use crate::{
    errors::AppError,
    handlers::{
        object_handlers::{copy_blob, delete_blobs, get_blob, head_blob, put_blob},
        request::BlobRequest,
    },
    routes::table::Operation,
    services::blob_store::BlobStore,
    state::AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::FutureExt;
use std::{any::Any, future::Future, panic::AssertUnwindSafe};
use tracing::{debug, error, info};

/// Fallback handler of the router; sees every request.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let origin = state.origin_for(&headers);
    let request = BlobRequest::new(method, &uri, headers, body, origin);

    let Some(operation) = state
        .routes
        .resolve(&request.method, &request.pathname, &request.query)
    else {
        debug!("no route for {} {}", request.method, uri);
        return StatusCode::NOT_FOUND.into_response();
    };

    let method = request.method.clone();
    let response = match guarded(run(operation, &state.store, request)).await {
        Ok(response) => response,
        Err(err) => {
            if err.status.is_server_error() {
                error!("{} {} failed: {}", method, uri, err);
            }
            err.into_response()
        }
    };

    info!(
        method = %method,
        uri = %uri,
        operation = operation.name(),
        status = response.status().as_u16(),
        "handled request"
    );
    response
}

async fn run(
    operation: Operation,
    store: &BlobStore,
    request: BlobRequest,
) -> Result<Response, AppError> {
    match operation {
        Operation::HeadBlob => head_blob(store, request).await,
        Operation::GetBlob => get_blob(store, request).await,
        Operation::CopyBlob => copy_blob(store, request).await,
        Operation::PutBlob => put_blob(store, request).await,
        Operation::DeleteBlobs => delete_blobs(store, request).await,
    }
}

/// Run a handler, turning a panic into an internal error with its message.
async fn guarded<F>(handler: F) -> Result<Response, AppError>
where
    F: Future<Output = Result<Response, AppError>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(AppError::internal(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exploding() -> Result<Response, AppError> {
        panic!("boom")
    }

    async fn exploding_for(key: String) -> Result<Response, AppError> {
        panic!("lost {}", key)
    }

    async fn missing() -> Result<Response, AppError> {
        Err(AppError::not_found("gone"))
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let err = guarded(exploding()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn test_formatted_panic_message() {
        let err = guarded(exploding_for("/a.txt".into())).await.unwrap_err();
        assert_eq!(err.message, "lost /a.txt");
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let err = guarded(missing()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
