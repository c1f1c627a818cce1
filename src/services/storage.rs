//! S3 storage service for attachments.
//!
//! Attachments are stored under `attachments/{id}`. Supports both AWS S3 and
//! MinIO for development.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::info;
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::{AppError, AppResult};

use super::attachments::{AttachmentError, AttachmentStore};

/// Image extensions accepted for attachments.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// S3 storage client wrapper.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    /// Create a new S3 storage client from configuration.
    pub async fn new(config: &StorageSettings) -> AppResult<Self> {
        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "testplat");

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .force_path_style(true); // Required for MinIO

        // Use custom endpoint for MinIO in development
        if let Some(ref endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        let storage = Self {
            client,
            bucket: config.bucket.clone(),
        };

        storage.ensure_bucket_exists().await?;

        info!("S3 storage initialized: bucket={}", config.bucket);

        Ok(storage)
    }

    /// Ensure the bucket exists, creating it if necessary.
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    info!("Creating S3 bucket '{}'", self.bucket);
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(|e| {
                            AppError::Storage(format!("Failed to create bucket: {}", e))
                        })?;
                    Ok(())
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to access bucket '{}': {}",
                        self.bucket, service_error
                    )))
                }
            }
        }
    }

    /// Check that the bucket is reachable.
    pub async fn ping(&self) -> AppResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Bucket check failed: {}", e)))?;
        Ok(())
    }

    /// Get the content type for an attachment based on its extension.
    pub fn content_type_for_extension(ext: &str) -> &'static str {
        match ext.to_lowercase().as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        }
    }

    /// Normalized extension if it is an accepted image type.
    pub fn allowed_extension(filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_lowercase();
        ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }

    /// Generate a fresh attachment id for a file with the given extension.
    pub fn new_attachment_id(ext: &str) -> String {
        format!("{}.{}", Uuid::now_v7().simple(), ext)
    }

    /// Attachment ids are generated by this server; reject anything else.
    pub fn is_valid_attachment_id(id: &str) -> bool {
        let Some((stem, ext)) = id.split_once('.') else {
            return false;
        };
        !stem.is_empty()
            && stem.chars().all(|c| c.is_ascii_alphanumeric())
            && ALLOWED_EXTENSIONS.contains(&ext)
    }

    /// S3 key of an attachment.
    pub fn attachment_key(id: &str) -> String {
        format!("attachments/{}", id)
    }

    /// Upload an object.
    pub async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> AppResult<()> {
        let body = aws_sdk_s3::primitives::ByteStream::from(data);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload file to S3: {}", e)))?;

        Ok(())
    }

    /// Fetch an object and its content type.
    pub async fn get(&self, key: &str) -> AppResult<(Vec<u8>, Option<String>)> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    AppError::NotFound(format!("Attachment {}", key))
                } else {
                    AppError::Storage(format!("Failed to get file from S3: {}", service_error))
                }
            })?;

        let content_type = response.content_type().map(String::from);
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read S3 response body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok((data, content_type))
    }
}

#[async_trait]
impl AttachmentStore for Storage {
    /// S3 deletes are idempotent, so existence is checked first to report `Missing`.
    async fn delete(&self, id: &str) -> Result<(), AttachmentError> {
        let key = Self::attachment_key(id);

        if let Err(e) = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            let service_error = e.into_service_error();
            return Err(if service_error.is_not_found() {
                AttachmentError::Missing(id.to_string())
            } else {
                AttachmentError::Storage(service_error.to_string())
            });
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| AttachmentError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_key() {
        assert_eq!(Storage::attachment_key("abc.png"), "attachments/abc.png");
    }

    #[test]
    fn test_allowed_extension() {
        assert_eq!(Storage::allowed_extension("shot.PNG"), Some("png".to_string()));
        assert_eq!(Storage::allowed_extension("a.b.jpeg"), Some("jpeg".to_string()));
        assert_eq!(Storage::allowed_extension("report.html"), None);
        assert_eq!(Storage::allowed_extension("noext"), None);
    }

    #[test]
    fn test_generated_ids_are_valid() {
        let id = Storage::new_attachment_id("webp");
        assert!(Storage::is_valid_attachment_id(&id), "{}", id);
        assert!(!Storage::is_valid_attachment_id("../secret.png"));
        assert!(!Storage::is_valid_attachment_id("abc.exe"));
        assert!(!Storage::is_valid_attachment_id("abc"));
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(Storage::content_type_for_extension("png"), "image/png");
        assert_eq!(Storage::content_type_for_extension("JPG"), "image/jpeg");
        assert_eq!(Storage::content_type_for_extension("webp"), "image/webp");
        assert_eq!(
            Storage::content_type_for_extension("unknown"),
            "application/octet-stream"
        );
    }
}
