//! Path parsing and resolution
//!
//! Remote paths are written as `s3://bucket/key` URIs, or as bare relative
//! keys that resolve against a configured default bucket. Local paths are
//! passed through as-is. A trailing `/` on a remote path is preserved and
//! acts as the directory marker downstream.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// URI scheme prefix recognized as a remote path
pub const REMOTE_SCHEME: &str = "s3://";

/// Key separator used for directory emulation
pub const SEPARATOR: char = '/';

/// A remote object-store location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudPath {
    /// Bucket name, never empty
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
}

impl CloudPath {
    /// Create a new CloudPath. Fails if the bucket is empty.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(Error::InvalidPath("Bucket name cannot be empty".into()));
        }
        Ok(Self {
            bucket,
            key: key.into(),
        })
    }

    /// Whether this path uses directory semantics (key is empty or ends
    /// with the separator).
    pub fn is_dir(&self) -> bool {
        self.key.is_empty() || self.key.ends_with(SEPARATOR)
    }

    /// Return a copy with the key canonicalized to directory form.
    /// Idempotent: an existing trailing separator is kept as-is.
    pub fn to_dir(&self) -> Self {
        if self.is_dir() {
            self.clone()
        } else {
            Self {
                bucket: self.bucket.clone(),
                key: format!("{}{}", self.key, SEPARATOR),
            }
        }
    }

    /// Join a child component onto this path.
    pub fn join(&self, child: &str) -> Self {
        let base = self.key.trim_end_matches(SEPARATOR);
        let key = if base.is_empty() {
            child.to_string()
        } else {
            format!("{base}{SEPARATOR}{child}")
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Parent path, one level up. None at bucket root.
    pub fn parent(&self) -> Option<Self> {
        if self.key.is_empty() {
            return None;
        }
        let key = self.key.trim_end_matches(SEPARATOR);
        match key.rfind(SEPARATOR) {
            Some(pos) => Some(Self {
                bucket: self.bucket.clone(),
                key: format!("{}{}", &key[..pos], SEPARATOR),
            }),
            None => Some(Self {
                bucket: self.bucket.clone(),
                key: String::new(),
            }),
        }
    }

    /// Last component of the key (without any trailing separator).
    pub fn file_name(&self) -> &str {
        let key = self.key.trim_end_matches(SEPARATOR);
        key.rsplit(SEPARATOR).next().unwrap_or(key)
    }

    /// Render as an `s3://bucket/key` URI.
    pub fn to_uri(&self) -> String {
        format!("{REMOTE_SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl std::fmt::Display for CloudPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

/// A resolved path that is either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// Local filesystem path
    Local(PathBuf),
    /// Remote object-store path
    Remote(CloudPath),
}

impl ResolvedPath {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, ResolvedPath::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, ResolvedPath::Local(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&CloudPath> {
        match self {
            ResolvedPath::Remote(p) => Some(p),
            ResolvedPath::Local(_) => None,
        }
    }

    /// Get the local path if this is a local path
    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            ResolvedPath::Local(p) => Some(p),
            ResolvedPath::Remote(_) => None,
        }
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedPath::Local(p) => write!(f, "{}", p.display()),
            ResolvedPath::Remote(p) => write!(f, "{p}"),
        }
    }
}

/// Resolve a raw path string into a ResolvedPath.
///
/// Classification rules:
/// - `s3://bucket/key` is remote; a missing bucket is an error
/// - Absolute paths and explicit relative paths (`./`, `../`) are local
/// - A bare relative string resolves against `default_bucket` when one is
///   configured, and is otherwise treated as a local path
///
/// Pure function, no I/O. Trailing separators are preserved.
pub fn resolve(raw: &str, default_bucket: Option<&str>) -> Result<ResolvedPath> {
    if raw.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    if let Some(rest) = raw.strip_prefix(REMOTE_SCHEME) {
        let (bucket, key) = match rest.find(SEPARATOR) {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(Error::InvalidPath(format!(
                "Remote URI '{raw}' is missing a bucket"
            )));
        }
        return Ok(ResolvedPath::Remote(CloudPath::new(bucket, key)?));
    }

    // Absolute paths are local
    if raw.starts_with(SEPARATOR) {
        return Ok(ResolvedPath::Local(PathBuf::from(raw)));
    }

    // Explicit relative paths are local
    if raw.starts_with("./") || raw.starts_with("../") || raw == "." || raw == ".." {
        return Ok(ResolvedPath::Local(PathBuf::from(raw)));
    }

    // Windows absolute paths
    #[cfg(windows)]
    if raw.len() >= 2 && raw.chars().nth(1) == Some(':') {
        return Ok(ResolvedPath::Local(PathBuf::from(raw)));
    }

    // Bare relative key: falls back to the default bucket when configured
    match default_bucket {
        Some(bucket) => Ok(ResolvedPath::Remote(CloudPath::new(bucket, raw)?)),
        None => Ok(ResolvedPath::Local(PathBuf::from(raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_remote_uri() {
        let path = resolve("s3://bucket/dir/file.txt", None).unwrap();
        assert!(path.is_remote());

        let remote = path.as_remote().unwrap();
        assert_eq!(remote.bucket, "bucket");
        assert_eq!(remote.key, "dir/file.txt");
        assert!(!remote.is_dir());
    }

    #[test]
    fn test_resolve_remote_dir_preserves_trailing_separator() {
        let path = resolve("s3://bucket/dir/", None).unwrap();
        let remote = path.as_remote().unwrap();
        assert_eq!(remote.key, "dir/");
        assert!(remote.is_dir());
    }

    #[test]
    fn test_resolve_bucket_root() {
        let path = resolve("s3://bucket", None).unwrap();
        let remote = path.as_remote().unwrap();
        assert_eq!(remote.bucket, "bucket");
        assert_eq!(remote.key, "");
        assert!(remote.is_dir());
    }

    #[test]
    fn test_resolve_missing_bucket() {
        assert!(resolve("s3://", None).is_err());
        assert!(resolve("s3:///key", None).is_err());
    }

    #[test]
    fn test_resolve_empty_path() {
        assert!(resolve("", None).is_err());
    }

    #[test]
    fn test_resolve_local_paths() {
        assert!(resolve("/home/user/file.txt", None).unwrap().is_local());
        assert!(resolve("./file.txt", None).unwrap().is_local());
        assert!(resolve("../file.txt", None).unwrap().is_local());
    }

    #[test]
    fn test_resolve_default_bucket_fallback() {
        let path = resolve("dir/file.txt", Some("data")).unwrap();
        let remote = path.as_remote().unwrap();
        assert_eq!(remote.bucket, "data");
        assert_eq!(remote.key, "dir/file.txt");

        // Without a default bucket, a bare name is a local path
        assert!(resolve("dir/file.txt", None).unwrap().is_local());
    }

    #[test]
    fn test_to_dir_idempotent() {
        let path = CloudPath::new("bucket", "a/b").unwrap();
        let dir = path.to_dir();
        assert_eq!(dir.key, "a/b/");
        assert_eq!(dir.to_dir().key, "a/b/");
    }

    #[test]
    fn test_empty_bucket_rejected() {
        assert!(CloudPath::new("", "key").is_err());
    }

    #[test]
    fn test_join() {
        let root = CloudPath::new("bucket", "").unwrap();
        let dir = root.join("dir/");
        assert_eq!(dir.key, "dir/");
        assert!(dir.is_dir());

        let file = dir.join("file.txt");
        assert_eq!(file.key, "dir/file.txt");
        assert!(!file.is_dir());
    }

    #[test]
    fn test_parent() {
        let path = CloudPath::new("bucket", "a/b/c.txt").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.key, "a/b/");

        let parent = parent.parent().unwrap();
        assert_eq!(parent.key, "a/");

        let parent = parent.parent().unwrap();
        assert_eq!(parent.key, "");

        assert!(parent.parent().is_none());
    }

    #[test]
    fn test_file_name() {
        let path = CloudPath::new("bucket", "a/b/c.txt").unwrap();
        assert_eq!(path.file_name(), "c.txt");

        let dir = CloudPath::new("bucket", "a/b/").unwrap();
        assert_eq!(dir.file_name(), "b");
    }

    #[test]
    fn test_display() {
        let path = CloudPath::new("bucket", "key/file.txt").unwrap();
        assert_eq!(path.to_string(), "s3://bucket/key/file.txt");
    }
}
