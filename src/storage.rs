use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

/// Lifetime of presigned download links handed to clients.
pub const PRESIGN_TTL: Duration = Duration::from_secs(15 * 60);

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A file about to be written to the bucket.
#[derive(Debug, Clone)]
pub struct NewObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Name offered to browsers when the object is downloaded.
    pub download_name: String,
}

impl NewObject {
    pub fn new(key: String, bytes: Vec<u8>, content_type: Option<&str>, original_name: &str) -> Self {
        Self {
            key,
            bytes,
            content_type: content_type
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string(),
            download_name: sanitize_file_name(original_name),
        }
    }

    pub fn content_disposition(&self) -> String {
        format!("inline; filename=\"{}\"", self.download_name)
    }
}

/// Blob store for verification documents and delivery proofs.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn store(&self, object: NewObject) -> Result<()>;

    async fn download_url(&self, key: &str, expires_in: Duration) -> Result<String>;

    async fn remove(&self, key: &str) -> Result<()>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn store(&self, object: NewObject) -> Result<()> {
        let disposition = object.content_disposition();
        let size = object.bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .content_type(object.content_type)
            .content_disposition(disposition)
            .body(ByteStream::from(object.bytes))
            .send()
            .await
            .with_context(|| format!("failed to store {} in bucket {}", object.key, self.bucket))?;

        tracing::debug!(key = %object.key, size, "stored object");
        Ok(())
    }

    async fn download_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .context("invalid presign lifetime")?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .with_context(|| format!("failed to presign {key}"))?;
        Ok(request.uri().to_string())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to remove {key} from bucket {}", self.bucket))?;
        Ok(())
    }
}

/// Object key under `prefix/owner/` with a unique, filesystem-safe file name.
pub fn object_key(prefix: &str, owner: Uuid, original_name: &str) -> String {
    format!(
        "{prefix}/{owner}/{}-{}",
        Uuid::new_v4(),
        sanitize_file_name(original_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_and_sanitized() {
        let owner = Uuid::new_v4();
        let key = object_key("documents", owner, "../Ehliyet Ön.pdf");
        assert!(key.starts_with(&format!("documents/{owner}/")));
        assert!(key.ends_with("-Ehliyet__n.pdf"));
    }

    #[test]
    fn empty_names_fall_back() {
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn new_objects_default_their_metadata() {
        let object = NewObject::new("a/b".to_string(), vec![1, 2], None, "teslim \"fiş\".jpg");
        assert_eq!(object.content_type, "application/octet-stream");
        assert_eq!(object.content_disposition(), "inline; filename=\"teslim__fi__.jpg\"");

        let object = NewObject::new("a/c".to_string(), Vec::new(), Some("image/png"), "x.png");
        assert_eq!(object.content_type, "image/png");
    }
}
