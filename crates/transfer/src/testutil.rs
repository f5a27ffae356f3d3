//! Shared test support for the engine unit tests: a mockall mock of the
//! ObjectStore trait and small config helpers.

use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::{
    CloudPath, ListPage, ObjectMetadata, ObjectStore, PartEtag, PresignRequest, PresignedUrl,
    Result, RetryPolicy, TransferConfig,
};

mockall::mock! {
    pub Store {}

    #[async_trait]
    impl ObjectStore for Store {
        #[mockall::concretize]
        async fn put_object(
            &self,
            path: &CloudPath,
            data: Bytes,
            content_type: Option<&str>,
        ) -> Result<()>;

        async fn get_object(&self, path: &CloudPath) -> Result<Bytes>;

        async fn get_range(&self, path: &CloudPath, start: u64, end: u64) -> Result<Bytes>;

        async fn head_object(&self, path: &CloudPath) -> Result<ObjectMetadata>;

        #[mockall::concretize]
        async fn list_page(
            &self,
            bucket: &str,
            prefix: &str,
            delimiter: Option<&str>,
            continuation_token: Option<String>,
            max_keys: Option<i32>,
        ) -> Result<ListPage>;

        async fn delete_object(&self, path: &CloudPath) -> Result<()>;

        async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>>;

        async fn copy_object(&self, src: &CloudPath, dst: &CloudPath) -> Result<()>;

        #[mockall::concretize]
        async fn create_multipart(
            &self,
            path: &CloudPath,
            content_type: Option<&str>,
        ) -> Result<String>;

        async fn upload_part(
            &self,
            path: &CloudPath,
            upload_id: &str,
            part_number: i32,
            data: Bytes,
        ) -> Result<String>;

        async fn complete_multipart(
            &self,
            path: &CloudPath,
            upload_id: &str,
            parts: &[PartEtag],
        ) -> Result<()>;

        async fn abort_multipart(&self, path: &CloudPath, upload_id: &str) -> Result<()>;

        async fn presign(
            &self,
            path: &CloudPath,
            request: &PresignRequest,
        ) -> Result<PresignedUrl>;
    }
}

/// Transfer config with a fast, deterministic retry policy for tests.
pub fn test_config() -> TransferConfig {
    TransferConfig::new().retry(RetryPolicy {
        max_attempts: 2,
        initial_backoff_ms: 1,
        multiplier: 1.0,
        max_backoff_ms: 1,
        jitter: 0.0,
    })
}

/// A remote path in the standard test bucket.
pub fn remote(key: &str) -> CloudPath {
    CloudPath::new("test-bucket", key).unwrap()
}
