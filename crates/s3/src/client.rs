//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from ferry-core.
//! Each trait method is one network call; retries, timeouts and strategy
//! decisions live in the transfer engine, not here.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use bytes::Bytes;

use ferry_core::{
    CloudPath, Error, ListPage, ObjectMetadata, ObjectStore, ObjectSummary, PartEtag,
    PresignMethod, PresignRequest, PresignedUrl, Result, StoreConfig,
};

use crate::errors::classify;

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from connection settings
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None, // session token
            None, // expiry
            "ferry-static-credentials",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Wrap an already-configured SDK client
    pub fn from_client(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

fn to_timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(dt.secs()).ok()
}

fn copy_source(path: &CloudPath) -> String {
    format!("{}/{}", path.bucket, path.key)
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(
        &self,
        path: &CloudPath,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        let mut request = self
            .inner
            .put_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;
        Ok(())
    }

    async fn get_object(&self, path: &CloudPath) -> Result<Bytes> {
        let response = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(format!("{}: {e}", path.to_uri())))?
            .into_bytes();

        Ok(data)
    }

    async fn get_range(&self, path: &CloudPath, start: u64, end: u64) -> Result<Bytes> {
        // HTTP range headers are inclusive on both ends
        let range = format!("bytes={start}-{}", end.saturating_sub(1));

        let response = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .range(range)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(format!("{}: {e}", path.to_uri())))?
            .into_bytes();

        Ok(data)
    }

    async fn head_object(&self, path: &CloudPath) -> Result<ObjectMetadata> {
        let response = self
            .inner
            .head_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        let mut meta = ObjectMetadata::object(&path.key, size);

        if let Some(modified) = response.last_modified() {
            meta.last_modified = to_timestamp(modified);
        }
        if let Some(etag) = response.e_tag() {
            meta.etag = Some(etag.trim_matches('"').to_string());
        }
        if let Some(ct) = response.content_type() {
            meta.content_type = Some(ct.to_string());
        }

        Ok(meta)
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(d) = delimiter {
            request = request.delimiter(d);
        }
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }
        if let Some(max) = max_keys {
            request = request.max_keys(max);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, &format!("s3://{bucket}/{prefix}")))?;

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(|s| s.to_string()))
            .collect();

        let objects = response
            .contents()
            .iter()
            .map(|object| ObjectSummary {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0).max(0) as u64,
                etag: object.e_tag().map(|t| t.trim_matches('"').to_string()),
                last_modified: object.last_modified().and_then(to_timestamp),
            })
            .collect();

        Ok(ListPage {
            objects,
            common_prefixes,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn delete_object(&self, path: &CloudPath) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let objects: Result<Vec<ObjectIdentifier>> = keys
            .iter()
            .map(|k| {
                ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .map_err(|e| Error::General(e.to_string()))
            })
            .collect();

        let delete = Delete::builder()
            .set_objects(Some(objects?))
            .build()
            .map_err(|e| Error::General(e.to_string()))?;

        let response = self
            .inner
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify(e, &format!("s3://{bucket}")))?;

        if !response.errors().is_empty() {
            let error_keys: Vec<&str> = response
                .errors()
                .iter()
                .filter_map(|e| e.key())
                .collect();
            tracing::warn!("Failed to delete some objects: {:?}", error_keys);
        }

        let deleted = response
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(|k| k.to_string()))
            .collect();

        Ok(deleted)
    }

    async fn copy_object(&self, src: &CloudPath, dst: &CloudPath) -> Result<()> {
        self.inner
            .copy_object()
            .copy_source(copy_source(src))
            .bucket(&dst.bucket)
            .key(&dst.key)
            .send()
            .await
            .map_err(|e| classify(e, &src.to_uri()))?;
        Ok(())
    }

    async fn create_multipart(
        &self,
        path: &CloudPath,
        content_type: Option<&str>,
    ) -> Result<String> {
        let mut request = self
            .inner
            .create_multipart_upload()
            .bucket(&path.bucket)
            .key(&path.key);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;

        match response.upload_id() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(Error::General(format!(
                "{}: CreateMultipartUpload returned no upload id",
                path.to_uri()
            ))),
        }
    }

    async fn upload_part(
        &self,
        path: &CloudPath,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<String> {
        let response = self
            .inner
            .upload_part()
            .bucket(&path.bucket)
            .key(&path.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;

        match response.e_tag() {
            Some(etag) if !etag.is_empty() => Ok(etag.trim_matches('"').to_string()),
            _ => Err(Error::General(format!(
                "{}: UploadPart {part_number} returned no ETag",
                path.to_uri()
            ))),
        }
    }

    async fn complete_multipart(
        &self,
        path: &CloudPath,
        upload_id: &str,
        parts: &[PartEtag],
    ) -> Result<()> {
        let completed: Vec<CompletedPart> = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .set_part_number(Some(p.part_number))
                    .set_e_tag(Some(p.etag.clone()))
                    .build()
            })
            .collect();

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(&path.bucket)
            .key(&path.key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;
        Ok(())
    }

    async fn abort_multipart(&self, path: &CloudPath, upload_id: &str) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(&path.bucket)
            .key(&path.key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| classify(e, &path.to_uri()))?;
        Ok(())
    }

    async fn presign(&self, path: &CloudPath, request: &PresignRequest) -> Result<PresignedUrl> {
        let config = PresigningConfig::expires_in(Duration::from_secs(request.expires_secs))
            .map_err(|e| Error::Config(format!("presign expiry: {e}")))?;

        let url = match request.method {
            PresignMethod::Get => {
                let mut req = self
                    .inner
                    .get_object()
                    .bucket(&path.bucket)
                    .key(&path.key);
                if let Some(ct) = &request.response.content_type {
                    req = req.response_content_type(ct);
                }
                if let Some(cd) = &request.response.content_disposition {
                    req = req.response_content_disposition(cd);
                }
                if let Some(cc) = &request.response.cache_control {
                    req = req.response_cache_control(cc);
                }
                req.presigned(config)
                    .await
                    .map_err(|e| classify(e, &path.to_uri()))?
                    .uri()
                    .to_string()
            }
            PresignMethod::Put => {
                let mut req = self
                    .inner
                    .put_object()
                    .bucket(&path.bucket)
                    .key(&path.key);
                if let Some(ct) = &request.content_type {
                    req = req.content_type(ct);
                }
                if !request.metadata.is_empty() {
                    req = req.set_metadata(Some(request.metadata.clone()));
                }
                req.presigned(config)
                    .await
                    .map_err(|e| classify(e, &path.to_uri()))?
                    .uri()
                    .to_string()
            }
        };

        Ok(PresignedUrl {
            url,
            method: request.method,
            expires_secs: request.expires_secs,
        })
    }
}
