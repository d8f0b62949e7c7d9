//! A stored blob and the response shapes built from it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::metadata::BlobMetadata;

/// Content and metadata of one blob, always read together.
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub content: Bytes,
    pub metadata: BlobMetadata,
}

/// Body returned by a plain upload: the subset of the record clients need.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PutBlobResponse {
    pub url: String,
    pub download_url: String,
    pub pathname: String,
    pub content_type: Option<String>,
    pub content_disposition: String,
}

impl From<&BlobMetadata> for PutBlobResponse {
    fn from(meta: &BlobMetadata) -> Self {
        Self {
            url: meta.url.clone(),
            download_url: meta.download_url.clone(),
            pathname: meta.pathname.clone(),
            content_type: meta.content_type.clone(),
            content_disposition: meta.content_disposition.clone(),
        }
    }
}

/// Body of `POST /delete`.
#[derive(Deserialize, Debug)]
pub struct DeleteBlobsRequest {
    pub urls: Vec<String>,
}
