//! Bucket and object operations over any [`ObjectStore`]

use bucketkit_core::settings::MAX_PRESIGN_EXPIRY;
use bucketkit_core::StoreError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{debug, error, info, instrument};

use crate::policy::public_policy;
use crate::storage::{BucketInfo, DeleteFailure, ObjectStore, PutObjectResult};
use crate::upload::{unique_object_name, UploadSource, Uploader, MIN_PART_SIZE};

/// Separator between folder levels in object names
const FOLDER_DELIMITER: &str = "/";

static BUCKET_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("bucket name pattern is valid")
});

/// Check a bucket name against the S3 naming rules
pub fn validate_bucket_name(bucket: &str) -> Result<(), StoreError> {
    let looks_like_ip = bucket.split('.').count() == 4
        && bucket.split('.').all(|octet| octet.parse::<u8>().is_ok());
    if !BUCKET_NAME.is_match(bucket) || bucket.contains("..") || looks_like_ip {
        return Err(StoreError::InvalidBucketName(bucket.to_string()));
    }
    Ok(())
}

/// Presigned URLs live between one second and seven days
fn check_expiry(expires_in: Duration) -> Result<(), StoreError> {
    if expires_in.is_zero() || expires_in > MAX_PRESIGN_EXPIRY {
        return Err(StoreError::InvalidArgument(format!(
            "expiry must be between 1s and {}s",
            MAX_PRESIGN_EXPIRY.as_secs()
        )));
    }
    Ok(())
}

/// Bucket and object operations
///
/// Every operation returns a typed error. Operations that only make sense on
/// an existing bucket check for it first and report its absence as
/// `Ok(false)` / `Ok(None)` rather than as an error.
pub struct StoreOps<S: ObjectStore + ?Sized> {
    store: Arc<S>,
    default_expiry: Duration,
    part_size: usize,
}

impl<S: ObjectStore + ?Sized> Clone for StoreOps<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_expiry: self.default_expiry,
            part_size: self.part_size,
        }
    }
}

impl<S: ObjectStore + ?Sized> StoreOps<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            default_expiry: MAX_PRESIGN_EXPIRY,
            part_size: MIN_PART_SIZE,
        }
    }

    /// Expiry used by [`StoreOps::object_url`] and
    /// [`StoreOps::put_object_and_get_url`]
    #[must_use]
    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    /// Part size for multipart uploads
    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn default_expiry(&self) -> Duration {
        self.default_expiry
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn uploader(&self) -> Uploader<'_, S> {
        Uploader::new(self.store.as_ref()).with_part_size(self.part_size)
    }

    #[instrument(skip(self))]
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.store.bucket_exists(bucket).await
    }

    /// Create a bucket and open it to everyone with [`public_policy`]
    #[instrument(skip(self))]
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_bucket_name(bucket)?;
        self.store.create_bucket(bucket).await?;
        self.store
            .put_bucket_policy(bucket, &public_policy(bucket).to_string())
            .await?;
        info!(bucket = %bucket, "Created public bucket");
        Ok(())
    }

    /// Remove a bucket that holds no data. Returns whether the bucket is gone
    /// afterwards; `false` when it did not exist or still holds objects.
    #[instrument(skip(self))]
    pub async fn remove_bucket(&self, bucket: &str) -> Result<bool, StoreError> {
        if !self.store.bucket_exists(bucket).await? {
            return Ok(false);
        }

        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_objects(bucket, None, None, token.as_deref())
                .await?;
            if page.objects.iter().any(|obj| obj.size > 0) {
                debug!(bucket = %bucket, "Bucket still holds objects");
                return Ok(false);
            }
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        self.store.delete_bucket(bucket).await?;
        let removed = !self.store.bucket_exists(bucket).await?;
        if removed {
            info!(bucket = %bucket, "Removed bucket");
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StoreError> {
        self.store.list_buckets().await
    }

    /// Names directly in a bucket, or directly under `folder/` when a folder
    /// is given. Deeper keys show up once as their subfolder, e.g.
    /// `"2023/"`. `None` when the bucket does not exist.
    #[instrument(skip(self))]
    pub async fn list_object_names(
        &self,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<Option<Vec<String>>, StoreError> {
        self.collect_names(bucket, folder, Some(FOLDER_DELIMITER)).await
    }

    /// Names of every object in a bucket or below `folder/`, at any depth.
    /// `None` when the bucket does not exist.
    #[instrument(skip(self))]
    pub async fn list_object_names_recursive(
        &self,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<Option<Vec<String>>, StoreError> {
        self.collect_names(bucket, folder, None).await
    }

    async fn collect_names(
        &self,
        bucket: &str,
        folder: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<Option<Vec<String>>, StoreError> {
        if !self.store.bucket_exists(bucket).await? {
            return Ok(None);
        }

        let prefix = folder.map(|folder| format!("{folder}{FOLDER_DELIMITER}"));
        let mut names = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_objects(bucket, prefix.as_deref(), delimiter, token.as_deref())
                .await?;
            names.extend(page.objects.into_iter().map(|obj| obj.key));
            names.extend(page.common_prefixes);
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        names.sort_unstable();
        Ok(Some(names))
    }

    /// Presigned GET URL valid for `expires_in`, at most seven days. `None`
    /// when the bucket does not exist.
    #[instrument(skip(self))]
    pub async fn presigned_url(
        &self,
        bucket: &str,
        object: &str,
        expires_in: Duration,
    ) -> Result<Option<String>, StoreError> {
        check_expiry(expires_in)?;
        if !self.store.bucket_exists(bucket).await? {
            return Ok(None);
        }
        self.store
            .presign_get(bucket, object, expires_in)
            .await
            .map(Some)
    }

    /// Presigned GET URL with the default expiry
    pub async fn object_url(&self, bucket: &str, object: &str) -> Result<Option<String>, StoreError> {
        self.presigned_url(bucket, object, self.default_expiry).await
    }

    /// Upload a stream. With a declared size exactly that many bytes are sent.
    #[instrument(skip(self, reader))]
    pub async fn upload_stream<R>(
        &self,
        bucket: &str,
        object: &str,
        reader: &mut R,
        size: Option<u64>,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.uploader()
            .upload(bucket, object, reader, size, content_type)
            .await
    }

    /// Upload a local file under `object`
    #[instrument(skip(self))]
    pub async fn upload_file(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError> {
        let mut file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        self.uploader()
            .upload(bucket, object, &mut file, Some(size), content_type)
            .await
    }

    /// Upload a local file after checking that both the bucket and the file
    /// exist. `false` when either is missing.
    #[instrument(skip(self))]
    pub async fn upload_from_path(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> Result<bool, StoreError> {
        if !self.store.bucket_exists(bucket).await? {
            debug!(bucket = %bucket, "Bucket does not exist");
            return Ok(false);
        }
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "File does not exist");
            return Ok(false);
        }
        self.upload_file(bucket, object, path, content_type).await?;
        Ok(true)
    }

    /// Upload a form-style source under `object`
    #[instrument(skip(self, source), fields(size = source.size()))]
    pub async fn upload_source(
        &self,
        bucket: &str,
        object: &str,
        source: &UploadSource,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError> {
        if bucket.is_empty() {
            return Err(StoreError::InvalidArgument("bucket name is empty".to_string()));
        }
        if object.is_empty() {
            return Err(StoreError::InvalidArgument("object name is empty".to_string()));
        }
        let mut reader: &[u8] = &source.data;
        self.uploader()
            .upload(bucket, object, &mut reader, Some(source.size()), content_type)
            .await
    }

    /// Upload a form-style source under its original filename
    pub async fn upload_source_named(
        &self,
        bucket: &str,
        source: &UploadSource,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError> {
        let object = source.original_filename.as_deref().ok_or_else(|| {
            StoreError::InvalidArgument("upload has no original filename".to_string())
        })?;
        self.upload_source(bucket, object, source, content_type).await
    }

    /// Upload a source under a fresh unique name and return a presigned URL
    /// for it
    #[instrument(skip(self, source), fields(size = source.size()))]
    pub async fn put_object_and_get_url(
        &self,
        bucket: &str,
        source: &UploadSource,
    ) -> Result<String, StoreError> {
        if source.is_empty() {
            return Err(StoreError::InvalidArgument("upload is empty".to_string()));
        }
        // Nothing is uploaded unless the URL can be signed afterwards
        check_expiry(self.default_expiry)?;
        if !self.store.bucket_exists(bucket).await? {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        let object = unique_object_name(source.original_filename.as_deref().unwrap_or_default());
        self.upload_source(bucket, &object, source, source.content_type.as_deref())
            .await?;
        self.store
            .presign_get(bucket, &object, self.default_expiry)
            .await
    }

    /// Remove one object. `false` when the bucket does not exist.
    #[instrument(skip(self))]
    pub async fn remove_object(&self, bucket: &str, object: &str) -> Result<bool, StoreError> {
        if !self.store.bucket_exists(bucket).await? {
            return Ok(false);
        }
        self.store.delete_object(bucket, object).await?;
        Ok(true)
    }

    /// Remove many objects, returning the ones the store refused to delete.
    /// `None` when the bucket does not exist.
    #[instrument(skip(self, objects), fields(count = objects.len()))]
    pub async fn remove_objects(
        &self,
        bucket: &str,
        objects: &[String],
    ) -> Result<Option<Vec<DeleteFailure>>, StoreError> {
        if !self.store.bucket_exists(bucket).await? {
            return Ok(None);
        }
        if objects.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let failures = self.store.delete_objects(bucket, objects).await?;
        for failure in &failures {
            error!(
                bucket = %bucket,
                key = %failure.key,
                code = %failure.code,
                "Error deleting object: {}",
                failure.message
            );
        }
        Ok(Some(failures))
    }
}
