//! src/services/blob_store.rs
//!
//! BlobStore: filesystem persistence for blob content plus its JSON metadata
//! sidecar. Content lives at `root/<key>` and the sidecar at
//! `root/<key>._vercel_mock_meta_`. Both files are written through a temp file
//! and a rename, content first, so the sidecar landing completes the visible
//! state transition. Callers only ever see the pair as one [`StoredBlob`].

use crate::{
    models::{
        metadata::{BlobAttributes, BlobLocation, BlobMetadata},
        object::StoredBlob,
    },
    services::key_locks::KeyLocks,
};
use bytes::Bytes;
use chrono::Utc;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Appended to a content path to name its metadata sidecar.
pub const METADATA_SUFFIX: &str = "._vercel_mock_meta_";

const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
    #[error("metadata of blob `{key}` is unreadable: {source}")]
    CorruptMetadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// On-disk locations of one blob.
struct BlobPaths {
    content: PathBuf,
    metadata: PathBuf,
}

/// BlobStore provides the four blob operations over a store root:
/// - read a blob (content + metadata, or NotFound)
/// - write a blob (full overwrite of both files)
/// - delete a blob (each file removed independently, absence is fine)
/// - copy a blob to a new key (metadata re-homed to the destination)
///
/// Clones share the same root and lock table.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    locks: Arc<KeyLocks>,
}

impl BlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Arc::new(KeyLocks::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its content and sidecar paths.
    fn paths(&self, key: &str) -> StoreResult<BlobPaths> {
        let relative = ensure_key_safe(key)?;
        let content = self.root.join(relative);
        let mut metadata = content.clone().into_os_string();
        metadata.push(METADATA_SUFFIX);
        Ok(BlobPaths {
            content,
            metadata: PathBuf::from(metadata),
        })
    }

    /// Resolve a key being looked up. A key that can never hold a blob is absent.
    fn lookup_paths(&self, key: &str) -> StoreResult<BlobPaths> {
        self.paths(key).map_err(|err| match err {
            StoreError::InvalidKey(key) => StoreError::NotFound(key),
            other => other,
        })
    }

    /// Read content and metadata of `key`.
    ///
    /// NotFound unless both files exist and agree on the content length.
    pub async fn read(&self, key: &str) -> StoreResult<StoredBlob> {
        let paths = self.lookup_paths(key)?;
        let _guard = self.locks.read(key).await;

        let metadata = load_metadata(key, &paths.metadata).await?;
        let content = fs::read(&paths.content)
            .await
            .map_err(missing_as_not_found(key))?;
        ensure_paired(key, &metadata, content.len() as u64)?;

        Ok(StoredBlob {
            content: Bytes::from(content),
            metadata,
        })
    }

    /// Metadata of `key`. The content file must exist too.
    pub async fn read_metadata(&self, key: &str) -> StoreResult<BlobMetadata> {
        let paths = self.lookup_paths(key)?;
        let _guard = self.locks.read(key).await;

        let metadata = load_metadata(key, &paths.metadata).await?;
        let len = content_len(key, &paths.content).await?;
        ensure_paired(key, &metadata, len)?;
        Ok(metadata)
    }

    /// Store `content` under `key`, replacing whatever was there.
    ///
    /// `size` and `uploadedAt` are computed here; parent directories are
    /// created as needed.
    pub async fn write(
        &self,
        key: &str,
        content: Bytes,
        location: BlobLocation,
        attributes: BlobAttributes,
    ) -> StoreResult<BlobMetadata> {
        let paths = self.paths(key)?;
        let _guard = self.locks.write(key).await;

        let metadata = BlobMetadata::new(location, content.len() as u64, attributes, Utc::now());
        create_parent(&paths.content).await?;
        write_atomic(&paths.content, &content).await?;
        write_atomic(&paths.metadata, &serde_json::to_vec_pretty(&metadata)?).await?;

        debug!("stored blob {} ({} bytes)", key, metadata.size);
        Ok(metadata)
    }

    /// Remove the content and the sidecar of `key`, each one if present.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let paths = self.paths(key)?;
        let _guard = self.locks.write(key).await;

        let content = remove_if_present(&paths.content).await;
        let metadata = remove_if_present(&paths.metadata).await;
        match (content?, metadata?) {
            (false, false) => debug!("blob {} already absent", key),
            _ => debug!("removed blob {}", key),
        }
        Ok(())
    }

    /// Duplicate `source` to `destination`.
    ///
    /// Fails with NotFound, creating nothing, when the source pair is
    /// incomplete. The new record keeps the source attributes but carries
    /// the destination locators and a fresh `uploadedAt`.
    pub async fn copy(
        &self,
        source: &str,
        destination: &str,
        location: BlobLocation,
    ) -> StoreResult<BlobMetadata> {
        let src = self.lookup_paths(source)?;
        let dst = self.paths(destination)?;
        let _guard = self.locks.copy(source, destination).await;

        let source_meta = load_metadata(source, &src.metadata).await?;
        let len = content_len(source, &src.content).await?;
        ensure_paired(source, &source_meta, len)?;

        create_parent(&dst.content).await?;
        let tmp_path = temp_path_for(&dst.content)?;
        if let Err(err) = fs::copy(&src.content, &tmp_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        rename_into_place(&tmp_path, &dst.content).await?;

        let metadata = source_meta.relocate(location, Utc::now());
        write_atomic(&dst.metadata, &serde_json::to_vec_pretty(&metadata)?).await?;

        debug!("copied blob {} to {}", source, destination);
        Ok(metadata)
    }
}

/// Validate a key and return it relative to the store root.
///
/// Keys are absolute URL paths (`/dir/file.txt`). Rejected: the bare root,
/// directory-like keys, empty, `.` or `..` segments, backslashes, control
/// bytes, and any segment ending in the sidecar suffix.
fn ensure_key_safe(key: &str) -> StoreResult<&str> {
    let invalid = || StoreError::InvalidKey(key.to_string());

    let relative = key.strip_prefix('/').ok_or_else(invalid)?;
    if relative.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(invalid());
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(invalid());
    }
    if relative.split('/').any(|segment| {
        matches!(segment, "" | "." | "..") || segment.ends_with(METADATA_SUFFIX)
    }) {
        return Err(invalid());
    }
    Ok(relative)
}

/// A path that is missing, a directory, or below a regular file holds no blob.
fn missing_as_not_found(key: &str) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory => {
            StoreError::NotFound(key.to_string())
        }
        _ => StoreError::Io(err),
    }
}

async fn load_metadata(key: &str, path: &Path) -> StoreResult<BlobMetadata> {
    let raw = fs::read(path).await.map_err(missing_as_not_found(key))?;
    serde_json::from_slice(&raw).map_err(|source| StoreError::CorruptMetadata {
        key: key.to_string(),
        source,
    })
}

/// Length of the content file; a missing file or a directory is NotFound.
async fn content_len(key: &str, path: &Path) -> StoreResult<u64> {
    let stat = fs::metadata(path).await.map_err(missing_as_not_found(key))?;
    if !stat.is_file() {
        return Err(StoreError::NotFound(key.to_string()));
    }
    Ok(stat.len())
}

/// A sidecar whose `size` disagrees with the content is half of a torn pair.
fn ensure_paired(key: &str, metadata: &BlobMetadata, content_len: u64) -> StoreResult<()> {
    if metadata.size != content_len {
        warn!(
            "blob {} has {} content bytes but its metadata records {}; treating as absent",
            key, content_len, metadata.size
        );
        return Err(StoreError::NotFound(key.to_string()));
    }
    Ok(())
}

async fn create_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> StoreResult<PathBuf> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::Io(io::Error::new(
            ErrorKind::Other,
            "blob path missing parent directory",
        ))
    })?;
    Ok(parent.join(format!(".tmp-{}", Uuid::new_v4())))
}

/// Write `bytes` next to `path` and rename over it.
async fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp_path = temp_path_for(path)?;
    if let Err(err) = fs::write(&tmp_path, bytes).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(StoreError::Io(err));
    }
    rename_into_place(&tmp_path, path).await
}

async fn rename_into_place(tmp_path: &Path, path: &Path) -> StoreResult<()> {
    if let Err(err) = fs::rename(tmp_path, path).await {
        let _ = fs::remove_file(tmp_path).await;
        return Err(StoreError::Io(err));
    }
    Ok(())
}

/// Remove a file, reporting whether it existed.
async fn remove_if_present(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(StoreError::Io(err)),
    }
}
