//! Object store backed by the AWS SDK, for AWS S3 and S3-compatible servers

use super::traits::*;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CreateBucketConfiguration, Delete,
    ObjectIdentifier,
};
use aws_sdk_s3::Client;
use bucketkit_core::{ErrorCode, StoreError, StoreSettings};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Largest number of keys a single DeleteObjects request accepts
const DELETE_BATCH_SIZE: usize = 1000;

/// Region that must not be sent as a location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// Object store talking to a real S3 endpoint
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    /// Build a store with the static credentials in `settings`
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        settings.validate()?;
        let (access_key, secret_key) = settings.credentials().ok_or_else(|| {
            StoreError::Config(
                "static credentials required; use S3Store::connect for the ambient chain"
                    .to_string(),
            )
        })?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "bucketkit");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(settings.path_style);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            region: settings.region.clone(),
        })
    }

    /// Build a store, falling back to the ambient AWS credential chain
    /// (environment, profile, instance metadata) when `settings` carries no
    /// static credentials
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        if settings.credentials().is_some() {
            return Self::new(settings);
        }
        settings.validate()?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(settings.path_style);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            region: settings.region.clone(),
        })
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        let region = client
            .config()
            .region()
            .map_or_else(|| DEFAULT_REGION.to_string(), ToString::to_string);
        Self { client, region }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Convert an SDK failure into a [`StoreError`], using the S3 error code when
/// the service sent one
fn sdk_error<E, R>(err: SdkError<E, R>, bucket: &str, key: Option<&str>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(service) => match service.err().code() {
            Some(code) => StoreError::from_service(
                code,
                service.err().message().unwrap_or_default(),
                Some(bucket),
                key,
            ),
            None => StoreError::Service {
                code: ErrorCode::Unknown,
                message: DisplayErrorContext(&err).to_string(),
            },
        },
        SdkError::ConstructionFailure(_) => {
            StoreError::InvalidArgument(DisplayErrorContext(&err).to_string())
        }
        _ => StoreError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found) =>
            {
                Ok(false)
            }
            Err(err) => match sdk_error(err, bucket, None) {
                StoreError::BucketNotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, None))?;
        debug!(bucket = %bucket, region = %self.region, "Created bucket");
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, None))?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StoreError> {
        let resp = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error(e, "", None))?;

        Ok(resp
            .buckets()
            .iter()
            .filter_map(|bucket| {
                Some(BucketInfo {
                    name: bucket.name()?.to_string(),
                    created: bucket.creation_date().and_then(to_chrono),
                })
            })
            .collect())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StoreError> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, None))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListObjectsPage, StoreError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_delimiter(delimiter.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, None))?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(ObjectSummary {
                    key: obj.key()?.to_string(),
                    size: obj
                        .size()
                        .and_then(|size| u64::try_from(size).ok())
                        .unwrap_or_default(),
                    etag: obj.e_tag().map(str::to_string),
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();
        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|common| common.prefix().map(str::to_string))
            .collect();

        let next_continuation_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListObjectsPage {
            objects,
            common_prefixes,
            next_continuation_token,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError> {
        let size = data.len();
        let resp = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, Some(key)))?;
        debug!(bucket = %bucket, key = %key, size, "Put object");

        Ok(PutObjectResult {
            etag: resp.e_tag().unwrap_or_default().to_string(),
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StoreError> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, Some(key)))?;

        resp.upload_id()
            .map(str::to_string)
            .ok_or_else(|| StoreError::Internal("store returned no upload id".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartInfo, StoreError> {
        let resp = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, Some(key)))?;

        Ok(PartInfo {
            part_number,
            etag: resp.e_tag().unwrap_or_default().to_string(),
        })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<PutObjectResult, StoreError> {
        let parts = parts
            .into_iter()
            .map(|part| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .e_tag(part.etag)
                    .part_number(part.part_number)
                    .build()
            })
            .collect();

        let resp = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, Some(key)))?;

        Ok(PutObjectResult {
            etag: resp.e_tag().unwrap_or_default().to_string(),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, Some(key)))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, bucket, Some(key)))?;
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteFailure>, StoreError> {
        let mut failures = Vec::new();

        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = chunk
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| StoreError::InvalidArgument(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

            let resp = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| sdk_error(e, bucket, None))?;

            failures.extend(resp.errors().iter().map(|err| DeleteFailure {
                key: err.key().unwrap_or_default().to_string(),
                code: ErrorCode::from_code(err.code().unwrap_or_default()),
                message: err.message().unwrap_or_default().to_string(),
            }));
        }

        Ok(failures)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let config =
            PresigningConfig::expires_in(expires_in).map_err(|e| StoreError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| StoreError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }
}
