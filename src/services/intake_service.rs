//! src/services/intake_service.rs
//!
//! IntakeService — turns one "create book" request into one response.
//!
//! The flow is linear: pick a decoder from the content type, build a typed
//! [`Book`], optionally move the cover image into the source bucket, upsert
//! the record, echo it back. Every failure is converted into a response at
//! the single boundary in [`IntakeService::handle`].
//!
//! Image enrichment on the JSON path is best-effort: a remote image that
//! cannot be fetched leaves the original URL in place. Object and table store
//! failures are never swallowed.

use crate::{
    config::IntakeSettings,
    errors::IntakeError,
    models::{
        book::Book,
        object::UploadedFile,
        request::{IntakeRequest, RequestBody},
        response::IntakeResponse,
    },
    services::{
        body_decoder::{body_bytes, json_object, parse_multipart},
        image_fetcher::{ImageFetcher, filename_from_url},
        object_store::ObjectStore,
        table_store::TableStore,
    },
};
use anyhow::Context;
use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const JSON_MEDIA_TYPE: &str = "application/json";
const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

#[derive(Clone)]
pub struct IntakeService {
    settings: Arc<IntakeSettings>,
    objects: Arc<dyn ObjectStore>,
    table: Arc<dyn TableStore>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl IntakeService {
    pub fn new(
        settings: IntakeSettings,
        objects: Arc<dyn ObjectStore>,
        table: Arc<dyn TableStore>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            objects,
            table,
            fetcher,
        }
    }

    /// Handle one request. Never fails: errors become 400/500 responses.
    pub async fn handle(&self, request: IntakeRequest) -> IntakeResponse {
        self.create_book(request)
            .await
            .unwrap_or_else(|err| failure_response(&err))
    }

    /// Read back a stored record from the configured table.
    pub async fn get_book(&self, id: &str) -> IntakeResponse {
        self.find_book(id)
            .await
            .unwrap_or_else(|err| failure_response(&err))
    }

    async fn find_book(&self, id: &str) -> Result<IntakeResponse, IntakeError> {
        let table = &self.settings.table_name;
        let book = self
            .table
            .get_item(table, id)
            .await
            .with_context(|| format!("reading `{}` from table {}", id, table))?;

        match book {
            Some(book) => IntakeResponse::found(&book)
                .context("serializing stored book")
                .map_err(IntakeError::from),
            None => Ok(IntakeResponse::error(
                StatusCode::NOT_FOUND,
                format!("Book `{}` not found", id),
            )),
        }
    }

    async fn create_book(&self, request: IntakeRequest) -> Result<IntakeResponse, IntakeError> {
        let content_type = request.content_type().to_string();
        debug!(
            content_type = %content_type,
            body_present = request.non_empty_body().is_some(),
            "received book intake request"
        );

        let body = match request.non_empty_body() {
            Some(body) => body.clone(),
            // compatibility: some callers send the book itself as the event
            None if request.has_top_level_book() => {
                RequestBody::Structured(Value::Object(request.top_level.clone()))
            }
            None => return Err(IntakeError::NoBody),
        };

        let book = if content_type.contains(JSON_MEDIA_TYPE) {
            self.book_from_json(&body, request.is_base64_encoded).await?
        } else if content_type.contains(MULTIPART_MEDIA_TYPE) {
            self.book_from_multipart(&content_type, &body, request.is_base64_encoded)
                .await?
        } else {
            return Err(IntakeError::UnsupportedContentType(content_type));
        };

        self.table
            .put_item(&self.settings.table_name, &book)
            .await
            .with_context(|| {
                format!("writing `{}` to table {}", book.id, self.settings.table_name)
            })?;
        info!(id = %book.id, table = %self.settings.table_name, "stored book");

        IntakeResponse::created(&book)
            .context("serializing stored book")
            .map_err(IntakeError::from)
    }

    async fn book_from_json(
        &self,
        body: &RequestBody,
        is_base64_encoded: bool,
    ) -> Result<Book, IntakeError> {
        let fields = json_object(body, is_base64_encoded)?;
        let mut book = Book::from_json(&fields)?;

        if let Some(url) = book.image.clone().filter(|url| url.starts_with("http")) {
            if let Some(image) = self.mirror_remote_image(&url).await? {
                book.image = Some(image);
            }
        }
        Ok(book)
    }

    /// Copy a remote image into the source bucket and return its destination
    /// URL. `Ok(None)` when the download fails.
    async fn mirror_remote_image(&self, url: &str) -> Result<Option<String>, IntakeError> {
        debug!(url, "downloading remote image");
        let data = match self.fetcher.fetch(url).await {
            Ok(data) => data,
            Err(err) => {
                warn!(url, error = %err, "image download failed, keeping original url");
                return Ok(None);
            }
        };

        let filename = filename_from_url(url);
        self.upload(&filename, data).await.map(Some)
    }

    async fn book_from_multipart(
        &self,
        content_type: &str,
        body: &RequestBody,
        is_base64_encoded: bool,
    ) -> Result<Book, IntakeError> {
        let bytes = body_bytes(body, is_base64_encoded)?;
        let form = parse_multipart(content_type, bytes, self.settings.max_body_bytes).await?;
        let mut book = Book::from_form(&form.fields)?;

        if let Some(UploadedFile {
            filename,
            content_type,
            data,
        }) = form.image
        {
            debug!(filename = %filename, content_type = ?content_type, "received image part");
            let key = upload_key(&filename)?;
            book.image = Some(self.upload(&key, data).await?);
        }
        Ok(book)
    }

    /// Put `data` into the source bucket and return the destination URL for it.
    async fn upload(&self, key: &str, data: Bytes) -> Result<String, IntakeError> {
        let bucket = &self.settings.source_bucket;
        let stored = self
            .objects
            .put(bucket, key, data)
            .await
            .with_context(|| format!("uploading `{}` to bucket {}", key, bucket))?;
        debug!(
            bucket = %stored.bucket,
            key = %stored.key,
            size = stored.size_bytes,
            etag = %stored.etag,
            "uploaded image"
        );

        Ok(self.settings.destination_url(key))
    }
}

fn failure_response(err: &IntakeError) -> IntakeResponse {
    match err {
        IntakeError::Internal(_) => error!(error = ?err, "book intake failed"),
        _ => info!(error = %err, "rejected book intake request"),
    }
    IntakeResponse::from_error(err)
}

/// Object key for an uploaded file: its last path component, byte for byte.
fn upload_key(filename: &str) -> Result<String, IntakeError> {
    let key = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    if key.is_empty() || key == "." || key == ".." {
        return Err(IntakeError::invalid(
            "image",
            format!("unusable filename `{}`", filename),
        ));
    }
    Ok(key.to_string())
}
