use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Multipart, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// JSON body that is deserialized and then checked with `validator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        data.validate()?;
        Ok(Self(data))
    }
}

/// Best-effort client address: first `X-Forwarded-For` entry, else the peer.
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(first_forwarded_address);
        if forwarded.is_some() {
            return Ok(Self(forwarded));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(peer))
    }
}

/// Largest file accepted by upload endpoints.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct UploadedFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A multipart form with one `file` part and plain text fields.
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn require_file(&mut self) -> Result<UploadedFile, AppError> {
        let file = self
            .file
            .take()
            .ok_or_else(|| AppError::bad_request("file field is required"))?;
        if file.bytes.is_empty() {
            return Err(AppError::bad_request("file field must not be empty"));
        }
        Ok(file)
    }
}

pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        file: None,
        fields: HashMap::new(),
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(|n| n.to_string()).unwrap_or_default();
        if name == "file" {
            let original_name = field
                .file_name()
                .map(|n| n.to_string())
                .ok_or_else(|| AppError::bad_request("filename is required"))?;
            let content_type = field
                .content_type()
                .map(|mime| mime.to_string())
                .or_else(|| {
                    mime_guess::from_path(&original_name)
                        .first()
                        .map(|mime| mime.to_string())
                });
            let bytes = field.bytes().await?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::bad_request("file exceeds the 10 MB upload limit"));
            }
            form.file = Some(UploadedFile {
                original_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else if !name.is_empty() {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

fn first_forwarded_address(header: &str) -> Option<String> {
    header
        .split(',')
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
