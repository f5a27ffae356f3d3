//! ObjectStore trait definition
//!
//! This trait defines the flat bucket/key storage interface the transfer
//! engine drives: single-shot puts and gets, ranged reads, multipart
//! upload primitives, prefix listing, server-side copy, delete and
//! presigning. It is implemented by the S3 adapter (ferry-s3) and can be
//! mocked for testing the engines without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::CloudPath;

/// Metadata for an object, or the aggregate form for a prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object key or prefix
    pub key: String,

    /// Size in bytes (aggregate total for a prefix)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp (latest across objects for a prefix)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Whether this describes a prefix aggregate rather than one object
    pub is_directory: bool,

    /// Number of objects under the prefix (aggregate form only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u64>,
}

impl ObjectMetadata {
    /// Metadata for a single real object
    pub fn object(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size, humansize::BINARY)),
            last_modified: None,
            etag: None,
            content_type: None,
            is_directory: false,
            object_count: None,
        }
    }

    /// Aggregate metadata for a prefix
    pub fn directory(
        key: impl Into<String>,
        object_count: u64,
        total_size: u64,
        last_modified: Option<jiff::Timestamp>,
    ) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(total_size),
            size_human: Some(humansize::format_size(total_size, humansize::BINARY)),
            last_modified,
            etag: None,
            content_type: None,
            is_directory: true,
            object_count: Some(object_count),
        }
    }
}

/// One object row from a listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// ETag without surrounding quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
}

/// Result of one prefix enumeration call
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page
    pub objects: Vec<ObjectSummary>,
    /// Collapsed sub-prefixes (delimiter listings only)
    pub common_prefixes: Vec<String>,
    /// Whether more pages are available
    pub truncated: bool,
    /// Continuation token for the next page
    pub continuation_token: Option<String>,
}

/// A completed multipart part, reported to the completion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartEtag {
    pub part_number: i32,
    pub etag: String,
}

/// HTTP method a presigned URL is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresignMethod {
    Get,
    Put,
}

impl std::fmt::Display for PresignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresignMethod::Get => write!(f, "GET"),
            PresignMethod::Put => write!(f, "PUT"),
        }
    }
}

/// Response header overrides baked into a presigned GET
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

/// Request contract for presigned URL generation. The signing itself is
/// delegated to the store client library.
#[derive(Debug, Clone)]
pub struct PresignRequest {
    /// HTTP method the URL authorizes
    pub method: PresignMethod,
    /// Validity window in seconds
    pub expires_secs: u64,
    /// Content type the uploader must send (PUT only)
    pub content_type: Option<String>,
    /// User metadata attached on upload (PUT only)
    pub metadata: HashMap<String, String>,
    /// Response header overrides (GET only)
    pub response: ResponseOverrides,
}

impl PresignRequest {
    pub fn get(expires_secs: u64) -> Self {
        Self {
            method: PresignMethod::Get,
            expires_secs,
            content_type: None,
            metadata: HashMap::new(),
            response: ResponseOverrides::default(),
        }
    }

    pub fn put(expires_secs: u64) -> Self {
        Self {
            method: PresignMethod::Put,
            ..Self::get(expires_secs)
        }
    }
}

/// A generated presigned URL
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub method: PresignMethod,
    pub expires_secs: u64,
}

/// Trait for flat bucket/key object storage
///
/// Every method is one network call; the transfer engine composes these
/// into multipart uploads, ranged downloads, batches and directory
/// emulation. Implementations map backend errors onto the typed
/// [`Error`](crate::Error) kinds so the engine can classify them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object in one call
    async fn put_object(
        &self,
        path: &CloudPath,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Fetch a whole object
    async fn get_object(&self, path: &CloudPath) -> Result<Bytes>;

    /// Fetch the byte range `[start, end)` of an object
    async fn get_range(&self, path: &CloudPath, start: u64, end: u64) -> Result<Bytes>;

    /// Object metadata; `Error::NotFound` if absent
    async fn head_object(&self, path: &CloudPath) -> Result<ObjectMetadata>;

    /// One page of a prefix enumeration. `delimiter` collapses keys past
    /// the next separator into `common_prefixes`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage>;

    /// Delete one object. Deleting an absent key is not an error.
    async fn delete_object(&self, path: &CloudPath) -> Result<()>;

    /// Bulk-delete keys in one call; returns the keys confirmed deleted.
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>>;

    /// Server-side copy between two remote locations
    async fn copy_object(&self, src: &CloudPath, dst: &CloudPath) -> Result<()>;

    /// Initiate a multipart upload, returning the upload id
    async fn create_multipart(
        &self,
        path: &CloudPath,
        content_type: Option<&str>,
    ) -> Result<String>;

    /// Upload one part, returning its ETag
    async fn upload_part(
        &self,
        path: &CloudPath,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<String>;

    /// Commit a multipart upload with parts sorted by part number
    async fn complete_multipart(
        &self,
        path: &CloudPath,
        upload_id: &str,
        parts: &[PartEtag],
    ) -> Result<()>;

    /// Release a multipart session without committing it
    async fn abort_multipart(&self, path: &CloudPath, upload_id: &str) -> Result<()>;

    /// Generate a presigned URL for the object
    async fn presign(&self, path: &CloudPath, request: &PresignRequest) -> Result<PresignedUrl>;
}
