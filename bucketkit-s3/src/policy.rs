//! Bucket policy documents

use serde_json::{json, Value};

/// Bucket-level actions granted to everyone by [`public_policy`]
pub const PUBLIC_BUCKET_ACTIONS: [&str; 3] = [
    "s3:ListBucket",
    "s3:ListBucketMultipartUploads",
    "s3:GetBucketLocation",
];

/// Object-level actions granted to everyone by [`public_policy`]
pub const PUBLIC_OBJECT_ACTIONS: [&str; 5] = [
    "s3:PutObject",
    "s3:AbortMultipartUpload",
    "s3:DeleteObject",
    "s3:GetObject",
    "s3:ListMultipartUploadParts",
];

/// Policy letting any principal list the bucket and read, write and delete
/// its objects
pub fn public_policy(bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "AWS": ["*"] },
                "Action": PUBLIC_BUCKET_ACTIONS,
                "Resource": [format!("arn:aws:s3:::{bucket}")]
            },
            {
                "Effect": "Allow",
                "Principal": { "AWS": ["*"] },
                "Action": PUBLIC_OBJECT_ACTIONS,
                "Resource": [format!("arn:aws:s3:::{bucket}/*")]
            }
        ]
    })
}
