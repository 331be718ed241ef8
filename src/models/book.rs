//! The book record and the schema step that builds it from loosely typed input.
//!
//! Both request encodings funnel through here: a JSON object via
//! [`Book::from_json`] and multipart text fields via [`Book::from_form`].
//! Either produces a fully typed [`Book`] or an [`IntakeError`] naming the
//! offending fields.

use crate::errors::{FieldError, IntakeError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::HashMap, str::FromStr};

/// A book as written to the table store and echoed to the caller.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Book {
    /// Caller-supplied key. The store upserts on it.
    pub id: String,

    /// Revision counter, 0 when not supplied.
    pub rv_id: i64,

    pub name: String,
    pub author: String,

    /// Exact decimal price, serialized as its decimal text (e.g. `"29.99"`).
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Cover image URL. After a successful upload this points at the
    /// destination bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Book {
    /// Build a book from a parsed JSON object.
    ///
    /// `id`, `name`, `author` and `price` are required. `price` is read from
    /// the literal JSON text, never through a float.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self, IntakeError> {
        for required in ["id", "name", "author", "price"] {
            if fields.get(required).is_none_or(Value::is_null) {
                return Err(IntakeError::MissingField(required));
            }
        }

        let mut errors = Vec::new();

        let id = match &fields["id"] {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                errors.push(FieldError::new("id", "must be a string"));
                String::new()
            }
        };
        let name = json_string(fields, "name", &mut errors).unwrap_or_default();
        let author = json_string(fields, "author", &mut errors).unwrap_or_default();

        let price = match &fields["price"] {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s),
            _ => None,
        }
        .unwrap_or_else(|| {
            errors.push(FieldError::new("price", "must be a decimal number"));
            Decimal::ZERO
        });

        let rv_id: i64 = match fields.get("rv_id") {
            None | Some(Value::Null) => Some(0),
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            Some(_) => None,
        }
        .unwrap_or_else(|| {
            errors.push(FieldError::new("rv_id", "must be an integer"));
            0
        });

        let category = json_string(fields, "category", &mut errors);
        let description = json_string(fields, "description", &mut errors);
        let image = json_string(fields, "image", &mut errors);

        if !errors.is_empty() {
            return Err(IntakeError::Validation(errors));
        }

        Ok(Self {
            id,
            rv_id,
            name,
            author,
            price,
            category,
            description,
            image,
        })
    }

    /// Build a book from multipart text fields.
    ///
    /// Absent fields take their defaults: empty strings, `rv_id` 0 and
    /// `price` 0. The image part is handled by the caller.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, IntakeError> {
        let text = |name: &str| fields.get(name).cloned().unwrap_or_default();
        let mut errors = Vec::new();

        let rv_id: i64 = match fields.get("rv_id").map(|v| v.trim()) {
            None | Some("") => 0,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.push(FieldError::new("rv_id", "must be an integer"));
                0
            }),
        };

        let price = match fields.get("price").map(|v| v.trim()) {
            None | Some("") => Decimal::ZERO,
            Some(raw) => parse_decimal(raw).unwrap_or_else(|| {
                errors.push(FieldError::new("price", "must be a decimal number"));
                Decimal::ZERO
            }),
        };

        if !errors.is_empty() {
            return Err(IntakeError::Validation(errors));
        }

        Ok(Self {
            id: text("id"),
            rv_id,
            name: text("name"),
            author: text("author"),
            price,
            category: Some(text("category")),
            description: Some(text("description")),
            image: None,
        })
    }
}

/// Optional string field; `null` reads as absent, any other type is an error.
fn json_string(
    fields: &Map<String, Value>,
    name: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(name, "must be a string"));
            None
        }
    }
}

/// Parse decimal text exactly, accepting plain (`29.99`) and scientific
/// (`2.999e1`) notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
