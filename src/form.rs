use std::collections::HashSet;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use bytes::Bytes;
use serde_json::Value;

use crate::error::AppError;

/// A file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub content_type: String,
    pub body: Bytes,
}

impl UploadedFile {
    pub fn new(field: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            field: field.to_string(),
            content_type: content_type.to_string(),
            body: body.into(),
        }
    }
}

/// Request body flattened to text fields and files, whatever encoding the
/// client used (multipart, JSON object or urlencoded form).
#[derive(Debug, Default, Clone)]
pub struct FormData {
    fields: Vec<(String, String)>,
    lists: HashSet<String>,
    files: Vec<UploadedFile>,
}

fn field_name(raw: &str) -> (String, bool) {
    match raw.strip_suffix("[]") {
        Some(base) => (base.to_string(), true),
        None => (raw.to_string(), false),
    }
}

fn json_scalar(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl FormData {
    pub fn push_text(&mut self, raw_name: &str, value: impl Into<String>) {
        let (name, is_list) = field_name(raw_name);
        if is_list || self.has(&name) {
            self.lists.insert(name.clone());
        }
        self.fields.push((name, value.into()));
    }

    pub fn push_file(&mut self, file: UploadedFile) {
        self.files.push(file);
    }

    pub fn from_json(value: Value) -> Result<Self, AppError> {
        let Value::Object(map) = value else {
            return Err(AppError::bad_request("expected a JSON object"));
        };
        let mut form = FormData::default();
        for (key, v) in map {
            match v {
                Value::Array(items) => {
                    let (name, _) = field_name(&key);
                    form.lists.insert(name.clone());
                    for item in items.iter().filter_map(json_scalar) {
                        form.fields.push((name.clone(), item));
                    }
                }
                other => {
                    if let Some(s) = json_scalar(&other) {
                        form.push_text(&key, s);
                    }
                }
            }
        }
        Ok(form)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// First value sent for `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    pub fn all(&self, name: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Whether `name` arrived as a list (repeated, `name[]` or a JSON array).
    pub fn is_list(&self, name: &str) -> bool {
        self.lists.contains(name)
    }

    /// Files sent under the first of `names` that carries any, in upload order.
    pub fn take_files(&mut self, names: &[&str]) -> Vec<UploadedFile> {
        let Some(key) = names
            .iter()
            .find(|n| self.files.iter().any(|f| f.field == **n))
            .map(|n| n.to_string())
        else {
            return Vec::new();
        };
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| f.field == key);
        self.files = rest;
        taken
    }

    async fn from_multipart(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?
        {
            let raw_name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                let (name, _) = field_name(&raw_name);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(format!("invalid file part: {e}")))?;
                form.push_file(UploadedFile {
                    field: name,
                    content_type,
                    body,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("invalid text part: {e}")))?;
                form.push_text(&raw_name, value);
            }
        }
        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            Self::from_multipart(mp).await
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            Self::from_json(value)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            let mut form = FormData::default();
            for (k, v) in pairs {
                form.push_text(&k, v);
            }
            Ok(form)
        } else if content_type.is_empty() {
            Ok(FormData::default())
        } else {
            Err(AppError::UnsupportedMediaType(format!(
                "unsupported content type {content_type}"
            )))
        }
    }
}
