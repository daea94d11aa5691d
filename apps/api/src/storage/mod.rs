//! Object storage for uploaded files (CVs, company logos) over S3 / MinIO.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Clone)]
pub struct ObjectStorage {
    client: S3Client,
    bucket: String,
}

impl ObjectStorage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), AppError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("download of {key} failed: {e}")))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::S3(format!("reading {key} failed: {e}")))?;
        Ok(data.into_bytes())
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("delete of {key} failed: {e}")))?;
        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

/// `cvs/<user_id>/<uuid>.<ext>`
pub fn cv_key(user_id: Uuid, extension: &str) -> String {
    format!("cvs/{user_id}/{}.{extension}", Uuid::new_v4())
}

/// `logos/<company_id>/<uuid>.<ext>`
pub fn logo_key(company_id: Uuid, extension: &str) -> String {
    format!("logos/{company_id}/{}.{extension}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_scoped_and_unique() {
        let user = Uuid::new_v4();
        let a = cv_key(user, "pdf");
        let b = cv_key(user, "pdf");
        assert!(a.starts_with(&format!("cvs/{user}/")));
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);
        assert!(logo_key(user, "png").starts_with("logos/"));
    }
}
