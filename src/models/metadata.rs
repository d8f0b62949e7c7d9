//! The metadata record kept next to every blob, and the rules deriving it
//! from an upload request.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cache policy applied when the uploader does not ask for one.
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=31536000";

/// Disposition applied when the uploader does not send `Content-Disposition`.
pub const DEFAULT_CONTENT_DISPOSITION: &str = "attachment";

/// Fallback MIME type header, consulted when the body declares none.
pub const CONTENT_TYPE_OVERRIDE: &str = "x-content-type";

/// Cache lifetime override, in seconds.
pub const CACHE_MAX_AGE_OVERRIDE: &str = "x-cache-control-max-age";

/// Public locators of a blob. Always describes the key the record is stored under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobLocation {
    pub url: String,
    pub download_url: String,
    pub pathname: String,
}

impl BlobLocation {
    /// Build the locators for `pathname` as served from `origin`.
    pub fn new(origin: &str, pathname: &str) -> Self {
        let url = format!("{}{}", origin.trim_end_matches('/'), pathname);
        Self {
            download_url: format!("{}?download=1", url),
            url,
            pathname: pathname.to_string(),
        }
    }
}

/// Attributes chosen by the uploader. Copies carry them over untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobAttributes {
    pub content_type: Option<String>,
    pub cache_control: String,
    pub content_disposition: String,
}

impl Default for BlobAttributes {
    fn default() -> Self {
        Self {
            content_type: None,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            content_disposition: DEFAULT_CONTENT_DISPOSITION.to_string(),
        }
    }
}

impl BlobAttributes {
    /// Derive attributes from upload request headers.
    ///
    /// - `contentType`: the body's declared `Content-Type`, else `X-Content-Type`.
    /// - `cacheControl`: `max-age=<x-cache-control-max-age>` when that header is a
    ///   non-negative integer, else [`DEFAULT_CACHE_CONTROL`].
    /// - `contentDisposition`: `Content-Disposition`, else `attachment`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = header_text(headers, header::CONTENT_TYPE.as_str())
            .or_else(|| header_text(headers, CONTENT_TYPE_OVERRIDE))
            .map(str::to_string);

        let cache_control = match header_text(headers, CACHE_MAX_AGE_OVERRIDE) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(seconds) => format!("max-age={}", seconds),
                Err(_) => {
                    warn!("ignoring non-numeric {} value `{}`", CACHE_MAX_AGE_OVERRIDE, raw);
                    DEFAULT_CACHE_CONTROL.to_string()
                }
            },
            None => DEFAULT_CACHE_CONTROL.to_string(),
        };

        let content_disposition = header_text(headers, header::CONTENT_DISPOSITION.as_str())
            .unwrap_or(DEFAULT_CONTENT_DISPOSITION)
            .to_string();

        Self {
            content_type,
            cache_control,
            content_disposition,
        }
    }
}

/// Trimmed, non-empty, visible-ASCII header value.
fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The sidecar record describing one stored blob.
///
/// Serialized with the field names clients of the hosted API expect
/// (`downloadUrl`, `contentType`, `uploadedAt`, ...).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// Plain retrieval URL.
    pub url: String,

    /// Retrieval URL that forces a download (`?download=1`).
    pub download_url: String,

    /// Object key, e.g. `/dir/file.txt`.
    pub pathname: String,

    /// Content length in bytes at write time.
    pub size: u64,

    /// MIME type, if the uploader declared one.
    pub content_type: Option<String>,

    /// Value served as `Cache-Control`.
    pub cache_control: String,

    /// Time of the write (upload or copy) that produced this record.
    #[serde(with = "iso_millis")]
    pub uploaded_at: DateTime<Utc>,

    /// Value served as `Content-Disposition` on forced downloads.
    pub content_disposition: String,
}

impl BlobMetadata {
    pub fn new(
        location: BlobLocation,
        size: u64,
        attributes: BlobAttributes,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: location.url,
            download_url: location.download_url,
            pathname: location.pathname,
            size,
            content_type: attributes.content_type,
            cache_control: attributes.cache_control,
            uploaded_at,
            content_disposition: attributes.content_disposition,
        }
    }

    /// Re-home a record under a new key. Only the locators and `uploadedAt` change.
    pub fn relocate(self, location: BlobLocation, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            url: location.url,
            download_url: location.download_url,
            pathname: location.pathname,
            uploaded_at,
            ..self
        }
    }

    /// `uploadedAt` as an HTTP date, for `Last-Modified`.
    pub fn last_modified(&self) -> String {
        self.uploaded_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
