use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;

use crate::documents::{s3_client, S3Config};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob store error: {0}")]
    Backend(String),
}

/// Raster uploads. Objects land under `users/<uid>/images/<image_id>` and
/// the returned URL is what the client feeds straight into an image element.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_image(
        &self,
        uid: &str,
        image_id: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BlobError>;
}

fn image_key(uid: &str, image_id: &str) -> String {
    format!("users/{uid}/images/{image_id}")
}

/// Writes uploads under a local directory that the HTTP layer serves back at
/// `/uploads`.
pub struct FileBlobStore {
    upload_dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put_image(
        &self,
        uid: &str,
        image_id: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BlobError> {
        let key = image_key(uid, image_id);
        let path = self.upload_dir.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                BlobError::Backend(format!("Failed to create upload dir: {error}"))
            })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|error| BlobError::Backend(format!("Failed to write upload {key}: {error}")))?;
        Ok(format!("/uploads/{key}"))
    }
}

pub struct S3BlobStore {
    bucket: String,
    prefix: String,
    public_base_url: Option<String>,
    region: Option<String>,
    client: Client,
}

impl S3BlobStore {
    pub async fn new(config: S3Config, public_base_url: Option<String>) -> Self {
        let client = s3_client(&config).await;
        let prefix = config
            .prefix
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        Self {
            bucket: config.bucket,
            prefix,
            public_base_url: public_base_url.map(|url| url.trim_end_matches('/').to_string()),
            region: config.region,
            client,
        }
    }

    fn object_key(&self, uid: &str, image_id: &str) -> String {
        let key = image_key(uid, image_id);
        if self.prefix.is_empty() {
            key
        } else {
            format!("{}/{key}", self.prefix)
        }
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => {
                let region = self.region.as_deref().unwrap_or("us-east-1");
                format!("https://{}.s3.{region}.amazonaws.com/{key}", self.bucket)
            }
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_image(
        &self,
        uid: &str,
        image_id: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BlobError> {
        let key = self.object_key(uid, image_id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|error| {
                BlobError::Backend(format!("Failed to upload {key} to s3: {error:?}"))
            })?;
        Ok(self.public_url(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_writes_and_returns_served_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().to_path_buf());
        let url = store
            .put_image("user-1", "img-1", "image/png", vec![1, 2, 3])
            .await
            .unwrap();

        assert_eq!(url, "/uploads/users/user-1/images/img-1");
        let written = std::fs::read(dir.path().join("users/user-1/images/img-1")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn uploads_for_one_user_stay_under_their_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().to_path_buf());
        store
            .put_image("user-1", "a", "image/png", vec![0])
            .await
            .unwrap();
        store
            .put_image("user-2", "b", "image/png", vec![0])
            .await
            .unwrap();

        assert!(dir.path().join("users/user-1/images/a").exists());
        assert!(dir.path().join("users/user-2/images/b").exists());
    }
}
