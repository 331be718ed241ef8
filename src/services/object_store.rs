//! src/services/object_store.rs
//!
//! Object store seam used for cover images. `DiskObjectStore` keeps payloads
//! on local disk sharded beneath `base_path/{bucket}/{shard}/{shard}/{key}`.
//! Anything that reacts to new source objects (e.g. a resize pipeline) lives
//! outside this process.

use crate::models::object::StoredObject;
use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Write-only blob store: `put(bucket, key, bytes)`.
///
/// Existing keys are overwritten.
pub trait ObjectStore: Send + Sync {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, StorageResult<StoredObject>>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Local-disk object store.
#[derive(Clone, Debug)]
pub struct DiskObjectStore {
    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl DiskObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Compute a fully-qualified object payload path.
    ///
    /// Combines base_path/bucket/{shard}/{shard}/{key}.
    /// Parent directories may not exist yet.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = object_shards(bucket, key);
        let mut path = self.base_path.clone();
        path.push(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn write_object(&self, bucket: &str, key: &str, body: Bytes) -> StorageResult<StoredObject> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = write_synced(&tmp_path, &body).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let etag = format!("{:x}", md5::compute(&body));
        debug!(bucket, key, etag = %etag, "stored object at {}", file_path.display());

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size_bytes: body.len() as u64,
            etag,
        })
    }
}

impl ObjectStore for DiskObjectStore {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, StorageResult<StoredObject>> {
        self.write_object(bucket, key, body).boxed()
    }
}

async fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Generate two-level shard identifiers for an object key.
///
/// Uses MD5(bucket/key) and returns the first two bytes as lowercase
/// hexadecimal strings (00–ff).
fn object_shards(bucket: &str, key: &str) -> (String, String) {
    let digest = md5::compute(format!("{}/{}", bucket, key));
    (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
}

/// Reject keys that could escape the bucket directory.
fn ensure_key_safe(key: &str) -> StorageResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.split('/').any(|part| part == "." || part == "..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if invalid {
        return Err(StorageError::InvalidObjectKey(key.to_string()));
    }
    Ok(())
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }
    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }
    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
