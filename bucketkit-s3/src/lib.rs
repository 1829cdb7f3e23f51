//! S3 utilities for bucketkit
//!
//! This crate wraps an S3-compatible object store with bucket and object
//! helpers: public buckets, paginated listings, streaming uploads, presigned
//! URLs and batch deletes. An in-memory backend stands in for a live server.

pub mod lenient;
pub mod ops;
pub mod policy;
pub mod shared;
pub mod storage;
pub mod upload;

pub use bucketkit_core::{ErrorCode, Settings, StoreError, StoreSettings};
pub use lenient::Lenient;
pub use ops::{validate_bucket_name, StoreOps};
pub use shared::{init_shared, ops_for, shared_ops, shared_store, SharedStore};
pub use storage::{
    BucketInfo, CompletedPart, DeleteFailure, EphemeralStore, ListObjectsPage, ObjectStore,
    ObjectSummary, PartInfo, PutObjectResult, S3Store,
};
pub use upload::{unique_object_name, UploadSource, Uploader};
