//! In-memory ObjectStore for integration tests
//!
//! Emulates the flat bucket/key namespace, multipart sessions, delimiter
//! listings and server-side copy well enough to run the engines end to
//! end without a network. Failure injection is deliberately simple: keys
//! in `fail_keys` reject writes, `server_side_copy` can be switched off,
//! and `range_delay` adds latency to ranged reads so concurrency can be
//! observed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use ferry_core::{
    CloudPath, Error, ListPage, ObjectMetadata, ObjectStore, ObjectSummary, PartEtag,
    PresignRequest, PresignedUrl, Result,
};

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    content_type: Option<String>,
    modified: jiff::Timestamp,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, Bytes>,
}

#[derive(Debug, Default)]
struct State {
    // bucket -> key -> entry; BTreeMap keeps listings key-ordered
    objects: HashMap<String, BTreeMap<String, Entry>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    aborted: Vec<String>,
}

pub struct MemoryStore {
    state: Mutex<State>,
    /// Destination keys that reject writes and copies
    pub fail_keys: HashSet<String>,
    /// Whether server-side copy is available
    pub server_side_copy: bool,
    /// Added latency per ranged read
    pub range_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fail_keys: HashSet::new(),
            server_side_copy: true,
            range_delay: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_key(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    pub fn without_server_side_copy(mut self) -> Self {
        self.server_side_copy = false;
        self
    }

    pub fn with_range_delay(mut self, delay: Duration) -> Self {
        self.range_delay = Some(delay);
        self
    }

    /// Highest number of ranged reads observed in flight at once
    pub fn peak_range_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Multipart sessions initiated but neither completed nor aborted
    pub fn live_uploads(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    /// Upload ids that were explicitly aborted
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().aborted.clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|e| e.data.to_vec())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.objects.get(bucket).map_or(0, |b| b.len())
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.fail_keys.contains(key) {
            Err(Error::AccessDenied(format!("injected failure for {key}")))
        } else {
            Ok(())
        }
    }

    fn insert(&self, bucket: &str, key: &str, data: Bytes, content_type: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.objects.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            Entry {
                data,
                content_type,
                modified: jiff::Timestamp::now(),
            },
        );
    }

    fn get(&self, path: &CloudPath) -> Result<Entry> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&path.bucket)
            .and_then(|b| b.get(&path.key))
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_uri()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        path: &CloudPath,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.check_writable(&path.key)?;
        self.insert(
            &path.bucket,
            &path.key,
            data,
            content_type.map(String::from),
        );
        Ok(())
    }

    async fn get_object(&self, path: &CloudPath) -> Result<Bytes> {
        Ok(self.get(path)?.data)
    }

    async fn get_range(&self, path: &CloudPath, start: u64, end: u64) -> Result<Bytes> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.range_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.get(path).map(|entry| {
            let end = (end as usize).min(entry.data.len());
            entry.data.slice(start as usize..end)
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn head_object(&self, path: &CloudPath) -> Result<ObjectMetadata> {
        let entry = self.get(path)?;
        let mut meta = ObjectMetadata::object(&path.key, entry.data.len() as u64);
        meta.content_type = entry.content_type;
        meta.last_modified = Some(entry.modified);
        Ok(meta)
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        _continuation_token: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage> {
        let state = self.state.lock().unwrap();
        let empty = BTreeMap::new();
        let keys = state.objects.get(bucket).unwrap_or(&empty);

        let mut objects = Vec::new();
        let mut prefixes = BTreeSet::new();

        for (key, entry) in keys.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            // Any remainder containing the delimiter rolls up into one
            // common prefix, placeholders included
            if let Some(delim) = delimiter {
                if let Some(pos) = rest.find(delim) {
                    prefixes.insert(format!("{prefix}{}", &rest[..pos + delim.len()]));
                    continue;
                }
            }
            objects.push(ObjectSummary {
                key: key.clone(),
                size: entry.data.len() as u64,
                etag: None,
                last_modified: Some(entry.modified),
            });
            if let Some(max) = max_keys {
                if objects.len() >= max as usize {
                    break;
                }
            }
        }

        Ok(ListPage {
            objects,
            common_prefixes: prefixes.into_iter().collect(),
            truncated: false,
            continuation_token: None,
        })
    }

    async fn delete_object(&self, path: &CloudPath) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(bucket) = state.objects.get_mut(&path.bucket) {
            bucket.remove(&path.key);
        }
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        if let Some(objects) = state.objects.get_mut(bucket) {
            for key in &keys {
                objects.remove(key);
            }
        }
        Ok(keys)
    }

    async fn copy_object(&self, src: &CloudPath, dst: &CloudPath) -> Result<()> {
        if !self.server_side_copy {
            return Err(Error::Unsupported("server-side copy disabled".into()));
        }
        self.check_writable(&dst.key)?;
        let entry = self.get(src)?;
        self.insert(&dst.bucket, &dst.key, entry.data, entry.content_type);
        Ok(())
    }

    async fn create_multipart(
        &self,
        path: &CloudPath,
        content_type: Option<&str>,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_upload += 1;
        let id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            id.clone(),
            PendingUpload {
                bucket: path.bucket.clone(),
                key: path.key.clone(),
                content_type: content_type.map(String::from),
                parts: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    async fn upload_part(
        &self,
        path: &CloudPath,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<String> {
        self.check_writable(&path.key)?;
        let mut state = self.state.lock().unwrap();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {upload_id}")))?;
        upload.parts.insert(part_number, data);
        Ok(format!("etag-{upload_id}-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        _path: &CloudPath,
        upload_id: &str,
        parts: &[PartEtag],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {upload_id}")))?;

        let mut assembled = Vec::new();
        for part in parts {
            let data = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| Error::General(format!("missing part {}", part.part_number)))?;
            assembled.extend_from_slice(data);
        }

        state
            .objects
            .entry(upload.bucket.clone())
            .or_default()
            .insert(
                upload.key.clone(),
                Entry {
                    data: Bytes::from(assembled),
                    content_type: upload.content_type.clone(),
                    modified: jiff::Timestamp::now(),
                },
            );
        Ok(())
    }

    async fn abort_multipart(&self, _path: &CloudPath, upload_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.uploads.remove(upload_id);
        state.aborted.push(upload_id.to_string());
        Ok(())
    }

    async fn presign(&self, path: &CloudPath, request: &PresignRequest) -> Result<PresignedUrl> {
        Ok(PresignedUrl {
            url: format!(
                "https://memory.invalid/{}/{}?method={}&expires={}",
                path.bucket, path.key, request.method, request.expires_secs
            ),
            method: request.method,
            expires_secs: request.expires_secs,
        })
    }
}
