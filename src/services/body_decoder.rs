//! Turns a raw request body into something the schema step can read:
//! a JSON object, or multipart text fields plus an optional image part.

use crate::{
    errors::IntakeError,
    models::{object::UploadedFile, request::RequestBody},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use multer::{Constraints, Multipart, SizeLimit};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Name of the form part carrying the cover image.
pub const IMAGE_FIELD: &str = "image";

/// Fields of a parsed `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct FormSubmission {
    /// Text fields; the first occurrence of a name wins.
    pub fields: HashMap<String, String>,
    /// The `image` part, when it carried a non-empty filename.
    pub image: Option<UploadedFile>,
}

/// Raw bytes of the body. Text flagged as base64 is decoded first.
pub fn body_bytes(body: &RequestBody, is_base64_encoded: bool) -> Result<Bytes, IntakeError> {
    match body {
        RequestBody::Text(text) if is_base64_encoded => general_purpose::STANDARD
            .decode(text.trim())
            .map(Bytes::from)
            .map_err(|err| IntakeError::InvalidBase64(err.to_string())),
        RequestBody::Text(text) => Ok(Bytes::from(text.clone())),
        RequestBody::Binary(bytes) => Ok(bytes.clone()),
        RequestBody::Structured(value) => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|err| IntakeError::InvalidJson(err.to_string())),
    }
}

/// Parse a JSON body into a field map. The top-level value must be an object.
pub fn json_object(body: &RequestBody, is_base64_encoded: bool) -> Result<Map<String, Value>, IntakeError> {
    let value = match body {
        RequestBody::Structured(value) => value.clone(),
        other => {
            let bytes = body_bytes(other, is_base64_encoded)?;
            serde_json::from_slice(&bytes).map_err(|err| IntakeError::InvalidJson(err.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(IntakeError::InvalidJson("expected a JSON object".into())),
    }
}

/// Parse a multipart body using the boundary declared in `content_type`.
///
/// The whole form, headers included, may not exceed `max_bytes`.
pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    max_bytes: usize,
) -> Result<FormSubmission, IntakeError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|err| IntakeError::InvalidMultipart(err.to_string()))?;
    let constraints =
        Constraints::new().size_limit(SizeLimit::new().whole_stream(max_bytes as u64));
    let stream = futures::stream::once(async move { Ok::<_, std::convert::Infallible>(body) });
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    let mut form = FormSubmission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| IntakeError::InvalidMultipart(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| IntakeError::InvalidMultipart(err.to_string()))?;

        match filename {
            Some(filename) if name == IMAGE_FIELD => {
                if !filename.is_empty() && form.image.is_none() {
                    form.image = Some(UploadedFile {
                        filename,
                        content_type,
                        data,
                    });
                }
            }
            // other file parts are not part of the record
            Some(_) => {}
            None => {
                form.fields
                    .entry(name)
                    .or_insert_with(|| String::from_utf8_lossy(&data).into_owned());
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOUNDARY: &str = "XBOUNDARYX";
    const LIMIT: usize = 6 * 1024 * 1024;

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn form_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    #[test]
    fn base64_text_is_decoded_only_when_flagged() {
        let body = RequestBody::Text("aGVsbG8=".into());
        assert_eq!(body_bytes(&body, true).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(body_bytes(&body, false).unwrap(), Bytes::from_static(b"aGVsbG8="));
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let err = body_bytes(&RequestBody::Text("***".into()), true).unwrap_err();
        assert!(matches!(err, IntakeError::InvalidBase64(_)));
    }

    #[test]
    fn json_object_accepts_text_and_structured_bodies() {
        let text = RequestBody::Text(r#"{"id":"1"}"#.into());
        assert_eq!(json_object(&text, false).unwrap()["id"], "1");

        let structured = RequestBody::Structured(json!({"id": "2"}));
        assert_eq!(json_object(&structured, false).unwrap()["id"], "2");
    }

    #[test]
    fn json_object_rejects_malformed_and_non_object_bodies() {
        let err = json_object(&RequestBody::Text("{not json".into()), false).unwrap_err();
        assert!(err.public_message().starts_with("Invalid JSON:"));

        let err = json_object(&RequestBody::Text("[1, 2]".into()), false).unwrap_err();
        assert!(matches!(err, IntakeError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn multipart_splits_text_fields_and_image() {
        let body = form_body(&[
            ("id", None, b"b1"),
            ("name", None, b"Dune"),
            ("image", Some("dune.jpg"), b"\xff\xd8jpeg"),
        ]);

        let form = parse_multipart(&content_type(), Bytes::from(body), LIMIT).await.unwrap();

        assert_eq!(form.fields["id"], "b1");
        assert_eq!(form.fields["name"], "Dune");
        let image = form.image.unwrap();
        assert_eq!(image.filename, "dune.jpg");
        assert_eq!(image.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(&image.data[..], b"\xff\xd8jpeg");
    }

    #[tokio::test]
    async fn multipart_ignores_image_without_filename() {
        let body = form_body(&[("image", Some(""), b"data"), ("name", None, b"Dune")]);
        let form = parse_multipart(&content_type(), Bytes::from(body), LIMIT).await.unwrap();
        assert!(form.image.is_none());

        let body = form_body(&[("image", None, b"http://example.com/x.jpg")]);
        let form = parse_multipart(&content_type(), Bytes::from(body), LIMIT).await.unwrap();
        assert!(form.image.is_none());
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_rejected() {
        let err = parse_multipart("multipart/form-data", Bytes::from_static(b"--x--"), LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::InvalidMultipart(_)));
    }

    #[tokio::test]
    async fn multipart_accepts_parts_beyond_two_mebibytes() {
        let cover = vec![0xAB; 3 * 1024 * 1024];
        let body = form_body(&[("id", None, b"b1"), ("image", Some("big.jpg"), cover.as_slice())]);

        let form = parse_multipart(&content_type(), Bytes::from(body), LIMIT)
            .await
            .unwrap();

        assert_eq!(form.image.unwrap().data.len(), cover.len());
    }

    #[tokio::test]
    async fn multipart_over_the_limit_is_rejected() {
        let cover = vec![0xAB; 4096];
        let body = form_body(&[("image", Some("big.jpg"), cover.as_slice())]);

        let err = parse_multipart(&content_type(), Bytes::from(body), 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::InvalidMultipart(_)));
    }
}
