//! Sentinel-returning view over [`StoreOps`]
//!
//! Callers that only care whether an operation worked get `false`, an empty
//! string, an empty list or `None` instead of an error. The error itself is
//! logged and dropped, so "bucket not found" and "network down" look the
//! same from here; use [`StoreOps`] directly when that matters.

use bucketkit_core::StoreError;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::error;

use crate::ops::StoreOps;
use crate::storage::{BucketInfo, ObjectStore};
use crate::upload::UploadSource;

fn log_failure(operation: &str, bucket: &str, err: &StoreError) {
    error!(operation, bucket = %bucket, code = %err.code(), error = %err, "Object store operation failed");
}

/// Borrowed sentinel view, see [`StoreOps::lenient`]
pub struct Lenient<'a, S: ObjectStore + ?Sized> {
    ops: &'a StoreOps<S>,
}

impl<S: ObjectStore + ?Sized> StoreOps<S> {
    /// View of these operations that logs errors instead of returning them
    pub fn lenient(&self) -> Lenient<'_, S> {
        Lenient { ops: self }
    }
}

impl<S: ObjectStore + ?Sized> Lenient<'_, S> {
    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        self.ops
            .bucket_exists(bucket)
            .await
            .unwrap_or_else(|err| {
                log_failure("bucket_exists", bucket, &err);
                false
            })
    }

    pub async fn create_bucket(&self, bucket: &str) -> bool {
        match self.ops.create_bucket(bucket).await {
            Ok(()) => true,
            Err(err) => {
                log_failure("create_bucket", bucket, &err);
                false
            }
        }
    }

    pub async fn remove_bucket(&self, bucket: &str) -> bool {
        self.ops
            .remove_bucket(bucket)
            .await
            .unwrap_or_else(|err| {
                log_failure("remove_bucket", bucket, &err);
                false
            })
    }

    pub async fn list_buckets(&self) -> Vec<BucketInfo> {
        self.ops.list_buckets().await.unwrap_or_else(|err| {
            log_failure("list_buckets", "", &err);
            Vec::new()
        })
    }

    pub async fn list_object_names(&self, bucket: &str, folder: Option<&str>) -> Option<Vec<String>> {
        self.ops
            .list_object_names(bucket, folder)
            .await
            .unwrap_or_else(|err| {
                log_failure("list_object_names", bucket, &err);
                None
            })
    }

    pub async fn list_object_names_recursive(
        &self,
        bucket: &str,
        folder: Option<&str>,
    ) -> Option<Vec<String>> {
        self.ops
            .list_object_names_recursive(bucket, folder)
            .await
            .unwrap_or_else(|err| {
                log_failure("list_object_names_recursive", bucket, &err);
                None
            })
    }

    pub async fn presigned_url(&self, bucket: &str, object: &str, expires_in: Duration) -> String {
        match self.ops.presigned_url(bucket, object, expires_in).await {
            Ok(url) => url.unwrap_or_default(),
            Err(err) => {
                log_failure("presigned_url", bucket, &err);
                String::new()
            }
        }
    }

    pub async fn object_url(&self, bucket: &str, object: &str) -> String {
        match self.ops.object_url(bucket, object).await {
            Ok(url) => url.unwrap_or_default(),
            Err(err) => {
                log_failure("object_url", bucket, &err);
                String::new()
            }
        }
    }

    pub async fn upload_stream<R>(
        &self,
        bucket: &str,
        object: &str,
        reader: &mut R,
        size: Option<u64>,
        content_type: Option<&str>,
    ) -> bool
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        match self
            .ops
            .upload_stream(bucket, object, reader, size, content_type)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                log_failure("upload_stream", bucket, &err);
                false
            }
        }
    }

    pub async fn upload_file(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> bool {
        match self.ops.upload_file(bucket, object, path, content_type).await {
            Ok(_) => true,
            Err(err) => {
                log_failure("upload_file", bucket, &err);
                false
            }
        }
    }

    pub async fn upload_from_path(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> bool {
        self.ops
            .upload_from_path(bucket, object, path, content_type)
            .await
            .unwrap_or_else(|err| {
                log_failure("upload_from_path", bucket, &err);
                false
            })
    }

    pub async fn upload_source(
        &self,
        bucket: &str,
        object: &str,
        source: &UploadSource,
        content_type: Option<&str>,
    ) -> bool {
        match self.ops.upload_source(bucket, object, source, content_type).await {
            Ok(_) => true,
            Err(err) => {
                log_failure("upload_source", bucket, &err);
                false
            }
        }
    }

    pub async fn upload_source_named(
        &self,
        bucket: &str,
        source: Option<&UploadSource>,
        content_type: Option<&str>,
    ) -> bool {
        let Some(source) = source else {
            error!(bucket = %bucket, "No upload given");
            return false;
        };
        match self.ops.upload_source_named(bucket, source, content_type).await {
            Ok(_) => true,
            Err(err) => {
                log_failure("upload_source_named", bucket, &err);
                false
            }
        }
    }

    pub async fn put_object_and_get_url(&self, bucket: &str, source: &UploadSource) -> String {
        self.ops
            .put_object_and_get_url(bucket, source)
            .await
            .unwrap_or_else(|err| {
                log_failure("put_object_and_get_url", bucket, &err);
                String::new()
            })
    }

    pub async fn remove_object(&self, bucket: &str, object: &str) -> bool {
        self.ops
            .remove_object(bucket, object)
            .await
            .unwrap_or_else(|err| {
                log_failure("remove_object", bucket, &err);
                false
            })
    }

    /// `true` once the batch was sent, even if single keys failed; those are
    /// logged by [`StoreOps::remove_objects`]
    pub async fn remove_objects(&self, bucket: &str, objects: &[String]) -> bool {
        match self.ops.remove_objects(bucket, objects).await {
            Ok(sent) => sent.is_some(),
            Err(err) => {
                log_failure("remove_objects", bucket, &err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EphemeralStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn ops() -> (Arc<EphemeralStore>, StoreOps<EphemeralStore>) {
        let store = Arc::new(EphemeralStore::new());
        (Arc::clone(&store), StoreOps::new(store))
    }

    #[tokio::test]
    async fn test_bucket_sentinels() {
        let (_, ops) = ops();
        let lenient = ops.lenient();

        assert!(!lenient.bucket_exists("photos").await);
        assert!(lenient.create_bucket("photos").await);
        assert!(lenient.bucket_exists("photos").await);

        // Second creation and bad names fail quietly
        assert!(!lenient.create_bucket("photos").await);
        assert!(!lenient.create_bucket("Bad_Name").await);

        assert_eq!(lenient.list_buckets().await.len(), 1);
        assert!(lenient.remove_bucket("photos").await);
        assert!(!lenient.remove_bucket("photos").await);
    }

    #[tokio::test]
    async fn test_url_sentinels() {
        let (_, ops) = ops();
        let lenient = ops.lenient();

        assert_eq!(lenient.object_url("photos", "cat.png").await, "");
        lenient.create_bucket("photos").await;
        assert!(!lenient.object_url("photos", "cat.png").await.is_empty());
        assert_eq!(
            lenient
                .presigned_url("photos", "cat.png", Duration::from_secs(30 * 24 * 60 * 60))
                .await,
            ""
        );

        let source = UploadSource::new("meow").with_filename("cat.png");
        assert!(!lenient.put_object_and_get_url("photos", &source).await.is_empty());
        assert_eq!(lenient.put_object_and_get_url("nowhere", &source).await, "");
    }

    #[tokio::test]
    async fn test_upload_sentinels() {
        let (store, ops) = ops();
        let lenient = ops.lenient();
        let source = UploadSource::new("form").with_filename("form.txt");

        assert!(!lenient.upload_source("docs", "a", &source, None).await);
        lenient.create_bucket("docs").await;
        assert!(lenient.upload_source("docs", "a", &source, None).await);
        assert!(!lenient.upload_source("docs", "", &source, None).await);
        assert!(lenient.upload_source_named("docs", Some(&source), None).await);
        assert!(!lenient.upload_source_named("docs", None, None).await);

        let mut reader: &[u8] = b"abc";
        assert!(lenient.upload_stream("docs", "s", &mut reader, None, None).await);

        let missing = std::env::temp_dir().join(format!("bucketkit-{}", uuid::Uuid::new_v4()));
        assert!(!lenient.upload_file("docs", "f", &missing, None).await);
        assert!(!lenient.upload_from_path("docs", "f", &missing, None).await);

        assert_eq!(store.object_data("docs", "form.txt").unwrap(), Bytes::from("form"));
        assert_eq!(store.object_data("docs", "s").unwrap(), Bytes::from("abc"));
    }

    #[tokio::test]
    async fn test_listing_and_removal_sentinels() {
        let (_, ops) = ops();
        let lenient = ops.lenient();

        assert!(lenient.list_object_names("docs", None).await.is_none());
        assert!(!lenient.remove_object("docs", "a").await);
        assert!(!lenient.remove_objects("docs", &["a".to_string()]).await);

        lenient.create_bucket("docs").await;
        let mut reader: &[u8] = b"abc";
        lenient.upload_stream("docs", "a", &mut reader, None, None).await;

        assert_eq!(
            lenient.list_object_names("docs", None).await.unwrap(),
            vec!["a"]
        );
        lenient.upload_stream("docs", "2024/b", &mut &b"b"[..], None, None).await;
        assert_eq!(
            lenient.list_object_names("docs", None).await.unwrap(),
            vec!["2024/", "a"]
        );
        assert_eq!(
            lenient.list_object_names_recursive("docs", None).await.unwrap(),
            vec!["2024/b", "a"]
        );
        assert!(lenient.list_object_names_recursive("nowhere", None).await.is_none());

        assert!(lenient.remove_objects("docs", &["a".to_string(), "2024/b".to_string()]).await);
        assert!(lenient.list_object_names("docs", None).await.unwrap().is_empty());
        assert!(lenient.remove_object("docs", "a").await);
    }
}
