//! Blob operation handlers and the request context they share.

pub mod object_handlers;
pub mod request;
