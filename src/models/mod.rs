//! Data models of the blob emulator.
//!
//! A blob is a pair of content bytes and a [`metadata::BlobMetadata`] record.
//! Records serialize with the exact field names of the hosted blob API.

pub mod metadata;
pub mod object;
