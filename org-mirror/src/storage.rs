//! S3 adapter for [`ObjectStore`].
//!
//! The content digest travels as user metadata (`x-amz-meta-sha256`), which
//! is what `head_object` reads back for change detection.

use async_trait::async_trait;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use org_mirror_core::contract::{BoxError, ObjectStore, ObjectUpload, RemoteObject};
use org_mirror_core::sync::SHA256_METADATA_KEY;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::aws::{sdk_error, LazySdkConfig};

/// S3 rejects non-final parts smaller than this.
const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

pub struct S3ObjectStore {
    aws: LazySdkConfig,
    client: OnceCell<Client>,
}

impl S3ObjectStore {
    pub fn new(aws: LazySdkConfig) -> Self {
        Self {
            aws,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async { Client::new(self.aws.get().await) })
            .await
    }

    async fn upload_parts(
        &self,
        upload: &ObjectUpload,
        upload_id: &str,
        part_size: u64,
    ) -> Result<Vec<CompletedPart>, BoxError> {
        let mut parts = Vec::new();
        let mut offset = 0;
        let mut part_number = 1;
        while offset < upload.size {
            let length = part_size.min(upload.size - offset);
            let body = ByteStream::read_from()
                .path(&upload.source)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await?;
            let output = self
                .client()
                .await
                .upload_part()
                .bucket(&upload.bucket)
                .key(&upload.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(length as i64)
                .body(body)
                .send()
                .await
                .map_err(sdk_error)?;
            debug!(key = %upload.key, part_number, length, "[S3] Part uploaded");
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag)
                    .part_number(part_number)
                    .build(),
            );
            offset += length;
            part_number += 1;
        }
        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>, BoxError> {
        match self.client().await.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(RemoteObject {
                key: key.to_string(),
                size: output.content_length.unwrap_or(0).max(0) as u64,
                sha256: output
                    .metadata
                    .and_then(|mut metadata| metadata.remove(SHA256_METADATA_KEY)),
            })),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(None),
            Err(e) => Err(sdk_error(e)),
        }
    }

    async fn put_object(&self, upload: &ObjectUpload) -> Result<(), BoxError> {
        let body = ByteStream::from_path(&upload.source).await?;
        self.client()
            .await
            .put_object()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .content_type(&upload.content_type)
            .content_length(upload.size as i64)
            .metadata(SHA256_METADATA_KEY, &upload.sha256)
            .body(body)
            .send()
            .await
            .map_err(sdk_error)?;
        info!(bucket = %upload.bucket, key = %upload.key, size = upload.size, "[S3] Object uploaded");
        Ok(())
    }

    async fn put_object_multipart(
        &self,
        upload: &ObjectUpload,
        part_size: u64,
    ) -> Result<(), BoxError> {
        let part_size = part_size.max(MIN_PART_SIZE);
        let created = self
            .client()
            .await
            .create_multipart_upload()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .content_type(&upload.content_type)
            .metadata(SHA256_METADATA_KEY, &upload.sha256)
            .send()
            .await
            .map_err(sdk_error)?;
        let upload_id = created
            .upload_id
            .ok_or("multipart upload was created without an id")?;

        let parts = match self.upload_parts(upload, &upload_id, part_size).await {
            Ok(parts) => parts,
            Err(e) => {
                error!(key = %upload.key, error = %e, "[S3] Part upload failed, aborting");
                if let Err(abort) = self
                    .client()
                    .await
                    .abort_multipart_upload()
                    .bucket(&upload.bucket)
                    .key(&upload.key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    error!(key = %upload.key, error = %sdk_error(abort), "[S3] Abort failed");
                }
                return Err(e);
            }
        };

        let part_count = parts.len();
        self.client()
            .await
            .complete_multipart_upload()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        info!(
            bucket = %upload.bucket,
            key = %upload.key,
            size = upload.size,
            parts = part_count,
            "[S3] Multipart upload complete"
        );
        Ok(())
    }
}
