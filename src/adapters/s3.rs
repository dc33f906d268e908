use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

impl Storage for S3Storage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                return match err.into_service_error() {
                    GetObjectError::NoSuchKey(_) => Ok(None),
                    err => Err(EtlError::storage(format!(
                        "Failed to read s3://{}/{}: {}",
                        self.bucket,
                        key,
                        DisplayErrorContext(&err)
                    ))),
                };
            }
        };

        let data = resp.body.collect().await.map_err(|e| {
            EtlError::storage(format!("Failed to collect S3 data for {}: {}", key, e))
        })?;

        Ok(Some(data.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                EtlError::storage(format!(
                    "Failed to write s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!("Wrote {} bytes to s3://{}/{}", data.len(), self.bucket, key);
        Ok(())
    }
}
