//! Configuration types
//!
//! Two serde-deserializable structs cover everything the engine needs:
//! [`StoreConfig`] describes the endpoint a client connects to, and
//! [`TransferConfig`] carries the transfer knobs (thresholds, part and
//! range sizing, concurrency, retry, timeouts). Where the host keeps
//! these (TOML file, environment, flags) is the host's concern; both
//! types parse from TOML out of the box.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

const MIB: u64 = 1024 * 1024;

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Endpoint URL
    pub endpoint: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Region
    #[serde(default = "default_region")]
    pub region: String,

    /// Use path-style bucket addressing (most S3-compatible stores)
    #[serde(default = "default_true")]
    pub path_style: bool,
}

impl StoreConfig {
    /// Validate the endpoint URL.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)?;
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(Error::Config("Credentials cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_multipart_threshold() -> u64 {
    16 * MIB
}

fn default_part_size() -> u64 {
    16 * MIB
}

fn default_download_threshold() -> u64 {
    16 * MIB
}

fn default_range_size() -> u64 {
    8 * MIB
}

fn default_concurrency() -> usize {
    8
}

fn default_max_buffered_parts() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_server_side_copy_limit() -> u64 {
    5 * 1024 * MIB
}

/// Transfer engine options
///
/// Owned by the caller and consumed read-only by the engines. Every
/// field has a serde default, so a partial TOML table deserializes to a
/// usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Uploads larger than this use the multipart protocol
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,

    /// Target multipart part size in bytes; adapted upward when needed
    /// to stay within the store's part-count cap
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Downloads larger than this use concurrent ranged reads
    #[serde(default = "default_download_threshold")]
    pub download_threshold: u64,

    /// Size of each ranged read in bytes
    #[serde(default = "default_range_size")]
    pub range_size: u64,

    /// Concurrency limit for ranged reads, batch items and directory
    /// copies
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum multipart part buffers held in memory at once
    #[serde(default = "default_max_buffered_parts")]
    pub max_buffered_parts: usize,

    /// Per-network-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest object the store will copy server-side in one call
    #[serde(default = "default_server_side_copy_limit")]
    pub server_side_copy_limit: u64,

    /// Bucket that bare relative keys resolve against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_bucket: Option<String>,

    /// Content type override; when unset it is guessed from the source
    /// file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Retry/backoff policy shared by all network calls
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            part_size: default_part_size(),
            download_threshold: default_download_threshold(),
            range_size: default_range_size(),
            concurrency: default_concurrency(),
            max_buffered_parts: default_max_buffered_parts(),
            timeout_ms: default_timeout_ms(),
            server_side_copy_limit: default_server_side_copy_limit(),
            default_bucket: None,
            content_type: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    pub fn part_size(mut self, bytes: u64) -> Self {
        self.part_size = bytes;
        self
    }

    pub fn download_threshold(mut self, bytes: u64) -> Self {
        self.download_threshold = bytes;
        self
    }

    pub fn range_size(mut self, bytes: u64) -> Self {
        self.range_size = bytes;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn max_buffered_parts(mut self, n: usize) -> Self {
        self.max_buffered_parts = n.max(1);
        self
    }

    pub fn default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Per-call timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate basic invariants.
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 || self.range_size == 0 {
            return Err(Error::Config("part_size and range_size must be > 0".into()));
        }
        if self.concurrency == 0 || self.max_buffered_parts == 0 {
            return Err(Error::Config(
                "concurrency and max_buffered_parts must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transfer_config() {
        let config = TransferConfig::default();
        assert_eq!(config.multipart_threshold, 16 * MIB);
        assert_eq!(config.part_size, 16 * MIB);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TransferConfig::new()
            .multipart_threshold(25 * MIB)
            .part_size(16 * MIB)
            .concurrency(4)
            .default_bucket("data");
        assert_eq!(config.multipart_threshold, 25 * MIB);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.default_bucket.as_deref(), Some("data"));
    }

    #[test]
    fn test_concurrency_floor() {
        let config = TransferConfig::new().concurrency(0).max_buffered_parts(0);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_buffered_parts, 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TransferConfig = toml::from_str(
            r#"
            multipart_threshold = 26214400
            default_bucket = "data"
            "#,
        )
        .unwrap();
        assert_eq!(config.multipart_threshold, 25 * MIB);
        assert_eq!(config.default_bucket.as_deref(), Some("data"));
        // Untouched fields fall back to defaults
        assert_eq!(config.part_size, 16 * MIB);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_store_config_validation() {
        let config: StoreConfig = toml::from_str(
            r#"
            endpoint = "http://localhost:9000"
            access_key = "minioadmin"
            secret_key = "minioadmin"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.region, "us-east-1");
        assert!(config.path_style);

        let bad = StoreConfig {
            endpoint: "not a url".into(),
            ..config
        };
        assert!(bad.validate().is_err());
    }
}
