//! Represents an image blob written to a bucket.

/// Receipt for a single `put` into the object store.
///
/// The store keeps only payload bytes; this is what it reports back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Bucket the object landed in.
    pub bucket: String,

    /// Object key (the image filename).
    pub key: String,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Hex MD5 of the payload.
    pub etag: String,
}

/// One file part from a multipart form.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: bytes::Bytes,
}
