//! Storage services backing the HTTP handlers.

pub mod blob_store;
pub mod key_locks;
