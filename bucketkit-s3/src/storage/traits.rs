//! Object store backend trait

use async_trait::async_trait;
use bucketkit_core::{ErrorCode, StoreError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A bucket as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// Summary of an object in a listing
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a bucket listing
#[derive(Debug, Default)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectSummary>,
    /// Key prefixes rolled up at the delimiter, each ending with it
    pub common_prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
}

/// Result of a PUT operation
#[derive(Debug, Clone)]
pub struct PutObjectResult {
    pub etag: String,
}

/// Information about an uploaded part
#[derive(Debug, Clone)]
pub struct PartInfo {
    pub part_number: i32,
    pub etag: String,
}

/// Completed part for multipart upload
#[derive(Debug, Clone)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

impl From<PartInfo> for CompletedPart {
    fn from(part: PartInfo) -> Self {
        Self {
            part_number: part.part_number,
            etag: part.etag,
        }
    }
}

/// A key the store refused to delete in a batch request
#[derive(Debug, Clone)]
pub struct DeleteFailure {
    pub key: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Abstract object store
///
/// Each method maps onto one S3 request (or one page of one). Higher level
/// behavior such as existence checks before acting lives in
/// [`StoreOps`](crate::StoreOps).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check if a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Create a bucket
    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// List all buckets
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StoreError>;

    /// Replace the bucket policy with a JSON policy document
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError>;

    /// List one page of objects, ordered by key. With a delimiter, keys that
    /// contain it after the prefix are rolled up into common prefixes.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListObjectsPage, StoreError>;

    /// Put an object in a single request
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError>;

    /// Create a multipart upload, returning its upload id
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StoreError>;

    /// Upload a part
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartInfo, StoreError>;

    /// Complete a multipart upload
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<PutObjectResult, StoreError>;

    /// Abort a multipart upload
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Delete many objects, returning the keys that could not be deleted
    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteFailure>, StoreError>;

    /// Presigned GET URL for an object
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError>;
}
