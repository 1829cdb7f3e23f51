//! Behavior tests for the object store backends

use super::*;
use bucketkit_core::{ErrorCode, StoreError};
use bytes::Bytes;
use std::time::Duration;

/// Test helper to create a store
fn store() -> EphemeralStore {
    EphemeralStore::new()
}

async fn store_with_bucket(bucket: &str) -> EphemeralStore {
    let s = store();
    s.create_bucket(bucket).await.unwrap();
    s
}

// =============================================================================
// BUCKET OPERATIONS
// =============================================================================

mod bucket_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_bucket() {
        let s = store();
        s.create_bucket("my-bucket").await.unwrap();
        assert!(s.bucket_exists("my-bucket").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_bucket_already_exists() {
        let s = store_with_bucket("my-bucket").await;

        let result = s.create_bucket("my-bucket").await;
        assert!(matches!(result, Err(StoreError::BucketAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_delete_bucket_not_found() {
        let s = store();
        let result = s.delete_bucket("nonexistent").await;
        assert!(matches!(result, Err(StoreError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_bucket_not_empty() {
        let s = store_with_bucket("my-bucket").await;
        s.put_object("my-bucket", "key", Bytes::from("data"), None)
            .await
            .unwrap();

        let result = s.delete_bucket("my-bucket").await;
        assert!(matches!(result, Err(StoreError::BucketNotEmpty(_))));
        assert!(s.bucket_exists("my-bucket").await.unwrap());
    }

    #[tokio::test]
    async fn test_bucket_not_exists() {
        let s = store();
        assert!(!s.bucket_exists("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_buckets_empty() {
        let s = store();
        assert!(s.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_buckets_sorted() {
        let s = store();
        for name in ["zebra", "alpha", "mango"] {
            s.create_bucket(name).await.unwrap();
        }

        let names: Vec<_> = s
            .list_buckets()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mango", "zebra"]);
    }
}

// =============================================================================
// BUCKET POLICY
// =============================================================================

mod policy_tests {
    use super::*;

    #[tokio::test]
    async fn test_put_bucket_policy() {
        let s = store_with_bucket("my-bucket").await;
        let policy = crate::policy::public_policy("my-bucket").to_string();

        s.put_bucket_policy("my-bucket", &policy).await.unwrap();
        assert_eq!(s.bucket_policy("my-bucket").unwrap(), policy);
    }

    #[tokio::test]
    async fn test_put_malformed_policy() {
        let s = store_with_bucket("my-bucket").await;

        let err = s
            .put_bucket_policy("my-bucket", "{not json")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedPolicy);
        assert!(s.bucket_policy("my-bucket").is_none());
    }

    #[tokio::test]
    async fn test_put_policy_missing_bucket() {
        let s = store();
        let result = s.put_bucket_policy("nonexistent", "{}").await;
        assert!(matches!(result, Err(StoreError::BucketNotFound(_))));
    }
}

// =============================================================================
// OBJECT OPERATIONS
// =============================================================================

mod object_tests {
    use super::*;

    #[tokio::test]
    async fn test_put_object_etag_is_quoted_md5() {
        let s = store_with_bucket("b").await;

        let result = s
            .put_object("b", "hello.txt", Bytes::from("hello"), None)
            .await
            .unwrap();
        assert_eq!(result.etag, "\"5d41402abc4b2a76b9719d911017c592\"");
    }

    #[tokio::test]
    async fn test_put_object_overwrites() {
        let s = store_with_bucket("b").await;
        s.put_object("b", "k", Bytes::from("one"), Some("text/plain"))
            .await
            .unwrap();
        s.put_object("b", "k", Bytes::from("two"), None)
            .await
            .unwrap();

        assert_eq!(s.object_data("b", "k").unwrap(), Bytes::from("two"));
        assert!(s.object_content_type("b", "k").is_none());
    }

    #[tokio::test]
    async fn test_put_object_missing_bucket() {
        let s = store();
        let result = s.put_object("nonexistent", "k", Bytes::new(), None).await;
        assert!(matches!(result, Err(StoreError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_put_empty_object() {
        let s = store_with_bucket("b").await;
        s.put_object("b", "empty", Bytes::new(), None).await.unwrap();

        let page = s.list_objects("b", None, None, None).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert_eq!(page.objects[0].size, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_object_succeeds() {
        let s = store_with_bucket("b").await;
        s.delete_object("b", "never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_object_missing_bucket() {
        let s = store();
        let result = s.delete_object("nonexistent", "k").await;
        assert!(matches!(result, Err(StoreError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_key_with_slashes_and_unicode() {
        let s = store_with_bucket("b").await;
        let key = "photos/2024/caf\u{e9}.jpg";
        s.put_object("b", key, Bytes::from("img"), Some("image/jpeg"))
            .await
            .unwrap();

        assert_eq!(s.object_data("b", key).unwrap(), Bytes::from("img"));
    }
}

// =============================================================================
// LIST OBJECTS
// =============================================================================

mod list_objects_tests {
    use super::*;

    async fn populated(page_size: usize) -> EphemeralStore {
        let s = store().with_page_size(page_size);
        s.create_bucket("b").await.unwrap();
        for key in ["docs/a", "docs/b", "docs/c", "images/x", "readme"] {
            s.put_object("b", key, Bytes::from(key.to_string()), None)
                .await
                .unwrap();
        }
        s
    }

    #[tokio::test]
    async fn test_list_all_sorted() {
        let s = populated(100).await;

        let page = s.list_objects("b", None, None, None).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/a", "docs/b", "docs/c", "images/x", "readme"]);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let s = populated(100).await;

        let page = s.list_objects("b", Some("docs/"), None, None).await.unwrap();
        assert_eq!(page.objects.len(), 3);
        assert!(page.objects.iter().all(|o| o.key.starts_with("docs/")));
    }

    #[tokio::test]
    async fn test_list_prefix_no_match() {
        let s = populated(100).await;

        let page = s.list_objects("b", Some("videos/"), None, None).await.unwrap();
        assert!(page.objects.is_empty());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let s = populated(2).await;

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = s
                .list_objects("b", None, None, token.as_deref())
                .await
                .unwrap();
            assert!(page.objects.len() <= 2);
            keys.extend(page.objects.into_iter().map(|o| o.key));
            pages += 1;
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(keys, vec!["docs/a", "docs/b", "docs/c", "images/x", "readme"]);
    }

    #[tokio::test]
    async fn test_list_exact_page_has_no_token() {
        let s = populated(5).await;

        let page = s.list_objects("b", None, None, None).await.unwrap();
        assert_eq!(page.objects.len(), 5);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_list_summary_fields() {
        let s = populated(100).await;

        let page = s.list_objects("b", Some("readme"), None, None).await.unwrap();
        let summary = &page.objects[0];
        assert_eq!(summary.size, "readme".len() as u64);
        assert!(summary.etag.as_deref().unwrap().starts_with('"'));
        assert!(summary.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_list_with_delimiter_rolls_up_folders() {
        let s = populated(100).await;
        s.put_object("b", "docs/sub/deep", Bytes::from("x"), None)
            .await
            .unwrap();

        let page = s.list_objects("b", None, Some("/"), None).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["readme"]);
        assert_eq!(page.common_prefixes, vec!["docs/", "images/"]);

        let page = s
            .list_objects("b", Some("docs/"), Some("/"), None)
            .await
            .unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/a", "docs/b", "docs/c"]);
        assert_eq!(page.common_prefixes, vec!["docs/sub/"]);
    }

    #[tokio::test]
    async fn test_list_with_delimiter_pages_over_prefixes() {
        let s = populated(1).await;

        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = s
                .list_objects("b", None, Some("/"), token.as_deref())
                .await
                .unwrap();
            assert_eq!(page.objects.len() + page.common_prefixes.len(), 1);
            entries.extend(page.common_prefixes);
            entries.extend(page.objects.into_iter().map(|o| o.key));
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(entries, vec!["docs/", "images/", "readme"]);
    }

    #[tokio::test]
    async fn test_list_missing_bucket() {
        let s = store();
        let result = s.list_objects("nonexistent", None, None, None).await;
        assert!(matches!(result, Err(StoreError::BucketNotFound(_))));
    }
}

// =============================================================================
// MULTIPART UPLOAD
// =============================================================================

mod multipart_tests {
    use super::*;

    #[tokio::test]
    async fn test_multipart_keeps_content_type() {
        let s = store_with_bucket("b").await;
        let upload_id = s
            .create_multipart_upload("b", "video.mp4", Some("video/mp4"))
            .await
            .unwrap();
        let part = s
            .upload_part("b", "video.mp4", &upload_id, 1, Bytes::from("frames"))
            .await
            .unwrap();
        s.complete_multipart_upload("b", "video.mp4", &upload_id, vec![part.into()])
            .await
            .unwrap();

        assert_eq!(s.object_content_type("b", "video.mp4").as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn test_part_reupload_replaces() {
        let s = store_with_bucket("b").await;
        let upload_id = s.create_multipart_upload("b", "k", None).await.unwrap();
        s.upload_part("b", "k", &upload_id, 1, Bytes::from("old"))
            .await
            .unwrap();
        let part = s
            .upload_part("b", "k", &upload_id, 1, Bytes::from("new"))
            .await
            .unwrap();
        s.complete_multipart_upload("b", "k", &upload_id, vec![part.into()])
            .await
            .unwrap();

        assert_eq!(s.object_data("b", "k").unwrap(), Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_part_number_out_of_range() {
        let s = store_with_bucket("b").await;
        let upload_id = s.create_multipart_upload("b", "k", None).await.unwrap();

        for number in [0, 10_001] {
            let result = s
                .upload_part("b", "k", &upload_id, number, Bytes::from("x"))
                .await;
            assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        }
    }

    #[tokio::test]
    async fn test_upload_part_unknown_upload() {
        let s = store_with_bucket("b").await;
        let result = s
            .upload_part("b", "k", "no-such-upload", 1, Bytes::from("x"))
            .await;
        assert!(matches!(result, Err(StoreError::UploadNotFound(_))));
    }

    #[tokio::test]
    async fn test_complete_out_of_order() {
        let s = store_with_bucket("b").await;
        let upload_id = s.create_multipart_upload("b", "k", None).await.unwrap();
        let p1 = s
            .upload_part("b", "k", &upload_id, 1, Bytes::from("a"))
            .await
            .unwrap();
        let p2 = s
            .upload_part("b", "k", &upload_id, 2, Bytes::from("b"))
            .await
            .unwrap();

        let err = s
            .complete_multipart_upload("b", "k", &upload_id, vec![p2.into(), p1.into()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPartOrder);
        assert_eq!(s.pending_uploads("b"), 1);
    }

    #[tokio::test]
    async fn test_complete_with_missing_part() {
        let s = store_with_bucket("b").await;
        let upload_id = s.create_multipart_upload("b", "k", None).await.unwrap();
        let p1 = s
            .upload_part("b", "k", &upload_id, 1, Bytes::from("a"))
            .await
            .unwrap();
        let missing = CompletedPart {
            part_number: 2,
            etag: "\"0\"".to_string(),
        };

        let err = s
            .complete_multipart_upload("b", "k", &upload_id, vec![p1.into(), missing])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPart);
        assert!(s.object_data("b", "k").is_none());

        // The upload survives the failed completion and can still be aborted
        assert_eq!(s.pending_uploads("b"), 1);
        s.abort_multipart_upload("b", "k", &upload_id).await.unwrap();
        assert_eq!(s.pending_uploads("b"), 0);
    }

    #[tokio::test]
    async fn test_complete_with_wrong_key_keeps_upload() {
        let s = store_with_bucket("b").await;
        let upload_id = s.create_multipart_upload("b", "k", None).await.unwrap();
        let p1 = s
            .upload_part("b", "k", &upload_id, 1, Bytes::from("a"))
            .await
            .unwrap();

        let result = s
            .complete_multipart_upload("b", "other", &upload_id, vec![p1.clone().into()])
            .await;
        assert!(matches!(result, Err(StoreError::UploadNotFound(_))));
        assert_eq!(s.pending_uploads("b"), 1);

        s.complete_multipart_upload("b", "k", &upload_id, vec![p1.into()])
            .await
            .unwrap();
        assert_eq!(s.object_data("b", "k").unwrap(), Bytes::from("a"));
    }

    #[tokio::test]
    async fn test_abort_multipart() {
        let s = store_with_bucket("b").await;
        let upload_id = s.create_multipart_upload("b", "k", None).await.unwrap();
        s.upload_part("b", "k", &upload_id, 1, Bytes::from("a"))
            .await
            .unwrap();

        s.abort_multipart_upload("b", "k", &upload_id).await.unwrap();
        assert_eq!(s.pending_uploads("b"), 0);
        assert!(s.object_data("b", "k").is_none());

        let again = s.abort_multipart_upload("b", "k", &upload_id).await;
        assert!(matches!(again, Err(StoreError::UploadNotFound(_))));
    }
}

// =============================================================================
// BATCH DELETE
// =============================================================================

mod delete_objects_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_objects() {
        let s = store_with_bucket("b").await;
        for key in ["a", "b", "c"] {
            s.put_object("b", key, Bytes::from("x"), None).await.unwrap();
        }

        let failures = s
            .delete_objects("b", &["a".to_string(), "c".to_string(), "zz".to_string()])
            .await
            .unwrap();
        assert!(failures.is_empty());
        assert!(s.object_data("b", "a").is_none());
        assert!(s.object_data("b", "b").is_some());
        assert!(s.object_data("b", "c").is_none());
    }

    #[tokio::test]
    async fn test_delete_objects_reports_empty_key() {
        let s = store_with_bucket("b").await;
        s.put_object("b", "a", Bytes::from("x"), None).await.unwrap();

        let failures = s
            .delete_objects("b", &[String::new(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, ErrorCode::InvalidArgument);
        assert!(s.object_data("b", "a").is_none());
    }

    #[tokio::test]
    async fn test_delete_objects_missing_bucket() {
        let s = store();
        let result = s.delete_objects("nonexistent", &["a".to_string()]).await;
        assert!(matches!(result, Err(StoreError::BucketNotFound(_))));
    }
}

// =============================================================================
// PRESIGNED URLS
// =============================================================================

mod presign_tests {
    use super::*;

    #[tokio::test]
    async fn test_presign_get() {
        let s = store_with_bucket("b").await;

        let url = s
            .presign_get("b", "doc.pdf", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "memory://ephemeral/b/doc.pdf?X-Amz-Expires=3600");
    }

    #[tokio::test]
    async fn test_presign_max_expiry() {
        let s = store_with_bucket("b").await;
        let week = Duration::from_secs(7 * 24 * 60 * 60);

        assert!(s.presign_get("b", "k", week).await.is_ok());
        let result = s.presign_get("b", "k", week + Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StoreError::Presign(_))));
    }
}
