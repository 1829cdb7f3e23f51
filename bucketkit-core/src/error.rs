//! Store error types

use thiserror::Error;

/// S3 error codes the utility layer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Common
    AccessDenied,
    InvalidAccessKeyId,
    InvalidSignature,
    RequestTimeTooSkewed,
    ServiceUnavailable,
    InternalError,

    // Bucket
    NoSuchBucket,
    BucketAlreadyExists,
    BucketAlreadyOwnedByYou,
    BucketNotEmpty,
    InvalidBucketName,
    MalformedPolicy,

    // Object
    NoSuchKey,
    InvalidArgument,
    EntityTooLarge,
    EntityTooSmall,
    InvalidPart,
    InvalidPartOrder,
    NoSuchUpload,

    /// Anything the store reported that is not listed above
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidSignature => "SignatureDoesNotMatch",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::MalformedPolicy => "MalformedPolicy",
            Self::NoSuchKey => "NoSuchKey",
            Self::InvalidArgument => "InvalidArgument",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse the `Code` element of an S3 error response
    pub fn from_code(code: &str) -> Self {
        match code {
            "AccessDenied" => Self::AccessDenied,
            "InvalidAccessKeyId" => Self::InvalidAccessKeyId,
            "SignatureDoesNotMatch" => Self::InvalidSignature,
            "RequestTimeTooSkewed" => Self::RequestTimeTooSkewed,
            "ServiceUnavailable" | "SlowDown" => Self::ServiceUnavailable,
            "InternalError" => Self::InternalError,
            "NoSuchBucket" => Self::NoSuchBucket,
            "BucketAlreadyExists" => Self::BucketAlreadyExists,
            "BucketAlreadyOwnedByYou" => Self::BucketAlreadyOwnedByYou,
            "BucketNotEmpty" => Self::BucketNotEmpty,
            "InvalidBucketName" => Self::InvalidBucketName,
            "MalformedPolicy" => Self::MalformedPolicy,
            "NoSuchKey" => Self::NoSuchKey,
            "InvalidArgument" => Self::InvalidArgument,
            "EntityTooLarge" => Self::EntityTooLarge,
            "EntityTooSmall" => Self::EntityTooSmall,
            "InvalidPart" => Self::InvalidPart,
            "InvalidPartOrder" => Self::InvalidPartOrder,
            "NoSuchUpload" => Self::NoSuchUpload,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("Bucket not empty: {0}")]
    BucketNotEmpty(String),

    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("{code}: {message}")]
    Service { code: ErrorCode, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Presign error: {0}")]
    Presign(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Build an error from an S3 error code, naming the bucket and key the
    /// request targeted
    pub fn from_service(
        code: &str,
        message: impl Into<String>,
        bucket: Option<&str>,
        key: Option<&str>,
    ) -> Self {
        let bucket = bucket.unwrap_or_default().to_string();
        match ErrorCode::from_code(code) {
            ErrorCode::NoSuchBucket => Self::BucketNotFound(bucket),
            ErrorCode::NoSuchKey => Self::ObjectNotFound {
                bucket,
                key: key.unwrap_or_default().to_string(),
            },
            ErrorCode::BucketAlreadyExists | ErrorCode::BucketAlreadyOwnedByYou => {
                Self::BucketAlreadyExists(bucket)
            }
            ErrorCode::BucketNotEmpty => Self::BucketNotEmpty(bucket),
            ErrorCode::InvalidBucketName => Self::InvalidBucketName(bucket),
            ErrorCode::NoSuchUpload => Self::UploadNotFound(message.into()),
            code => Self::Service {
                code,
                message: message.into(),
            },
        }
    }

    /// The S3 error code this error corresponds to
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BucketNotFound(_) => ErrorCode::NoSuchBucket,
            Self::ObjectNotFound { .. } => ErrorCode::NoSuchKey,
            Self::BucketAlreadyExists(_) => ErrorCode::BucketAlreadyExists,
            Self::BucketNotEmpty(_) => ErrorCode::BucketNotEmpty,
            Self::InvalidBucketName(_) => ErrorCode::InvalidBucketName,
            Self::InvalidArgument(_) | Self::Presign(_) => ErrorCode::InvalidArgument,
            Self::UploadNotFound(_) => ErrorCode::NoSuchUpload,
            Self::Service { code, .. } => *code,
            Self::Transport(_) => ErrorCode::ServiceUnavailable,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error means the bucket or object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound(_) | Self::ObjectNotFound { .. })
    }
}
