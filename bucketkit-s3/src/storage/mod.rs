//! Object store backends

mod ephemeral;
mod remote;
mod traits;

#[cfg(test)]
mod tests;

pub use ephemeral::EphemeralStore;
pub use remote::S3Store;
pub use traits::{
    BucketInfo, CompletedPart, DeleteFailure, ListObjectsPage, ObjectStore, ObjectSummary,
    PartInfo, PutObjectResult,
};
