//! In-memory ephemeral object store

use super::traits::*;
use async_trait::async_trait;
use bucketkit_core::settings::MAX_PRESIGN_EXPIRY;
use bucketkit_core::{ErrorCode, StoreError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Base of the URLs handed out by [`EphemeralStore::presign_get`]
pub const EPHEMERAL_ENDPOINT: &str = "memory://ephemeral";

/// Keys returned per listing page, as S3 does
const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory stored object
struct InMemoryObject {
    data: Bytes,
    etag: String,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// In-memory bucket
struct InMemoryBucket {
    objects: DashMap<String, InMemoryObject>,
    multipart_uploads: DashMap<String, MultipartUpload>,
    policy: RwLock<Option<String>>,
    created_at: DateTime<Utc>,
}

impl InMemoryBucket {
    fn new() -> Self {
        Self {
            objects: DashMap::new(),
            multipart_uploads: DashMap::new(),
            policy: RwLock::new(None),
            created_at: Utc::now(),
        }
    }
}

/// In-progress multipart upload
struct MultipartUpload {
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<i32, Bytes>,
}

/// Ephemeral (in-memory) object store
///
/// Behaves like an S3 server for every operation of [`ObjectStore`], which
/// makes it a stand-in for a live store in tests and dry runs.
pub struct EphemeralStore {
    buckets: DashMap<String, Arc<InMemoryBucket>>,
    page_size: usize,
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use smaller listing pages, to exercise continuation tokens
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Contents of a stored object
    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let bucket_ref = self.buckets.get(bucket)?;
        let data = bucket_ref.objects.get(key).map(|obj| obj.data.clone());
        data
    }

    /// Content type an object was stored with
    pub fn object_content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let bucket_ref = self.buckets.get(bucket)?;
        let content_type = bucket_ref
            .objects
            .get(key)
            .and_then(|obj| obj.content_type.clone());
        content_type
    }

    /// Policy document last applied to a bucket
    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        let bucket_ref = self.buckets.get(bucket)?;
        let policy = bucket_ref.policy.read().clone();
        policy
    }

    /// Number of multipart uploads started but neither completed nor aborted
    pub fn pending_uploads(&self, bucket: &str) -> usize {
        self.buckets
            .get(bucket)
            .map_or(0, |bucket_ref| bucket_ref.multipart_uploads.len())
    }

    fn bucket(&self, bucket: &str) -> Result<Arc<InMemoryBucket>, StoreError> {
        self.buckets
            .get(bucket)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }

    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl ObjectStore for EphemeralStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        match self.buckets.entry(bucket.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::BucketAlreadyExists(bucket.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(InMemoryBucket::new()));
                Ok(())
            }
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        if !bucket_ref.objects.is_empty() {
            return Err(StoreError::BucketNotEmpty(bucket.to_string()));
        }
        self.buckets.remove(bucket);
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StoreError> {
        let mut buckets: Vec<BucketInfo> = self
            .buckets
            .iter()
            .map(|entry| BucketInfo {
                name: entry.key().clone(),
                created: Some(entry.value().created_at),
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        serde_json::from_str::<serde_json::Value>(policy).map_err(|e| StoreError::Service {
            code: ErrorCode::MalformedPolicy,
            message: e.to_string(),
        })?;
        *bucket_ref.policy.write() = Some(policy.to_string());
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListObjectsPage, StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        let prefix = prefix.unwrap_or("");
        let delimiter = delimiter.filter(|d| !d.is_empty());

        // Keys and rolled-up prefixes share one ordering, as in S3
        let mut entries: BTreeMap<String, Option<ObjectSummary>> = BTreeMap::new();
        for entry in bucket_ref.objects.iter() {
            let Some(rest) = entry.key().strip_prefix(prefix) else {
                continue;
            };
            match delimiter.and_then(|d| rest.find(d).map(|at| at + d.len())) {
                Some(end) => {
                    entries
                        .entry(format!("{prefix}{}", &rest[..end]))
                        .or_insert(None);
                }
                None => {
                    entries.insert(
                        entry.key().clone(),
                        Some(ObjectSummary {
                            key: entry.key().clone(),
                            size: entry.data.len() as u64,
                            etag: Some(entry.etag.clone()),
                            last_modified: Some(entry.last_modified),
                        }),
                    );
                }
            }
        }

        let mut page = ListObjectsPage::default();
        let mut remaining = entries
            .into_iter()
            .filter(|(name, _)| continuation_token.map_or(true, |after| name.as_str() > after));
        for (name, summary) in remaining.by_ref().take(self.page_size) {
            match summary {
                Some(summary) => page.objects.push(summary),
                None => page.common_prefixes.push(name.clone()),
            }
            // The token is the last entry handed out; the next page starts after it.
            page.next_continuation_token = Some(name);
        }
        if remaining.next().is_none() {
            page.next_continuation_token = None;
        }

        Ok(page)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        let etag = Self::compute_etag(&data);

        bucket_ref.objects.insert(
            key.to_string(),
            InMemoryObject {
                data,
                etag: etag.clone(),
                content_type: content_type.map(str::to_string),
                last_modified: Utc::now(),
            },
        );

        Ok(PutObjectResult { etag })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        let upload_id = Uuid::new_v4().to_string();

        bucket_ref.multipart_uploads.insert(
            upload_id.clone(),
            MultipartUpload {
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                parts: BTreeMap::new(),
            },
        );

        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartInfo, StoreError> {
        if !(1..=10_000).contains(&part_number) {
            return Err(StoreError::InvalidArgument(format!(
                "part number {part_number} outside 1..=10000"
            )));
        }

        let bucket_ref = self.bucket(bucket)?;
        let mut upload = bucket_ref
            .multipart_uploads
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::UploadNotFound(upload_id.to_string()))?;

        let etag = Self::compute_etag(&data);
        upload.parts.insert(part_number, data);

        Ok(PartInfo { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<PutObjectResult, StoreError> {
        let bucket_ref = self.bucket(bucket)?;

        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::Service {
                code: ErrorCode::InvalidPartOrder,
                message: "parts must be listed in ascending order".to_string(),
            });
        }

        // Validate before consuming the upload; a failed completion leaves it open
        let (data, etag, content_type) = {
            let upload = bucket_ref
                .multipart_uploads
                .get(upload_id)
                .filter(|upload| upload.key == key)
                .ok_or_else(|| StoreError::UploadNotFound(upload_id.to_string()))?;

            // Multipart ETag: MD5(concat(MD5(part1), MD5(part2), ...))-N
            let mut combined = Vec::new();
            let mut part_digests = Vec::new();
            for completed in &parts {
                let data = upload.parts.get(&completed.part_number).ok_or_else(|| {
                    StoreError::Service {
                        code: ErrorCode::InvalidPart,
                        message: format!("part {} was never uploaded", completed.part_number),
                    }
                })?;
                combined.extend_from_slice(data);
                part_digests.extend_from_slice(&Md5::digest(data));
            }
            let etag = format!(
                "\"{}-{}\"",
                hex::encode(Md5::digest(&part_digests)),
                parts.len()
            );
            (Bytes::from(combined), etag, upload.content_type.clone())
        };
        bucket_ref.multipart_uploads.remove(upload_id);

        bucket_ref.objects.insert(
            key.to_string(),
            InMemoryObject {
                data,
                etag: etag.clone(),
                content_type,
                last_modified: Utc::now(),
            },
        );

        Ok(PutObjectResult { etag })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        bucket_ref
            .multipart_uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::UploadNotFound(upload_id.to_string()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        bucket_ref.objects.remove(key);
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteFailure>, StoreError> {
        let bucket_ref = self.bucket(bucket)?;
        let mut failures = Vec::new();
        for key in keys {
            if key.is_empty() {
                failures.push(DeleteFailure {
                    key: key.clone(),
                    code: ErrorCode::InvalidArgument,
                    message: "object key must not be empty".to_string(),
                });
                continue;
            }
            bucket_ref.objects.remove(key);
        }
        Ok(failures)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        if expires_in > MAX_PRESIGN_EXPIRY {
            return Err(StoreError::Presign(format!(
                "expiry of {}s exceeds {}s",
                expires_in.as_secs(),
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }
        Ok(format!(
            "{EPHEMERAL_ENDPOINT}/{bucket}/{key}?X-Amz-Expires={}",
            expires_in.as_secs()
        ))
    }
}
