//! Reading multipart bodies that mix text fields and image files.

use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

pub const NOT_AN_IMAGE: &str = "Not an image! Please upload only images.";

pub struct UploadedFile {
    pub field: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct MultipartBody {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
    texts: Map<String, Value>,
}

impl MultipartBody {
    /// Decodes the text fields as if they had been sent as JSON. A field
    /// whose text merely looks like JSON (a long digit-only name, say) is
    /// retried as the plain string it was sent as.
    pub fn fields_as<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let coerced_err = match serde_json::from_value(Value::Object(self.fields.clone())) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        for (name, text) in &self.texts {
            if self.fields.get(name) == Some(text) {
                continue;
            }
            let mut fields = self.fields.clone();
            fields.insert(name.clone(), text.clone());
            if let Ok(value) = serde_json::from_value(Value::Object(fields)) {
                return Ok(value);
            }
        }

        serde_json::from_value(Value::Object(self.texts.clone()))
            .map_err(|_| AppError::Validation(format!("Invalid form data: {}", coerced_err)))
    }

    pub fn files_named(&self, field: &str) -> impl Iterator<Item = &UploadedFile> {
        self.files.iter().filter(move |f| f.field == field)
    }
}

/// Collects every part. File parts must be images and may only arrive
/// under one of `(field, max count)` in `file_fields`.
pub async fn read_multipart(
    mut multipart: Multipart,
    file_fields: &[(&str, usize)],
) -> Result<MultipartBody, AppError> {
    let mut body = MultipartBody::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if field.file_name().is_none() {
            let text = field.text().await?;
            body.fields.insert(name.clone(), form_value(&text));
            body.texts.insert(name, Value::String(text));
            continue;
        }

        let Some(&(_, max)) = file_fields.iter().find(|(allowed, _)| *allowed == name) else {
            return Err(AppError::Validation(format!("Unexpected file field '{}'", name)));
        };
        if !field.content_type().is_some_and(|ct| ct.starts_with("image/")) {
            return Err(AppError::Validation(NOT_AN_IMAGE.into()));
        }
        if body.files_named(&name).count() >= max {
            return Err(AppError::Validation(format!("Too many files for '{}' (max {})", name, max)));
        }

        let data = field.bytes().await?.to_vec();
        body.files.push(UploadedFile { field: name, data });
    }

    Ok(body)
}

/// Form values are strings; numbers, booleans and arrays are recovered
/// when the text parses as JSON.
fn form_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Array(_) | Value::Object(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}
