//! Upload plumbing: streaming sources into single or multipart uploads

use bucketkit_core::StoreError;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::{CompletedPart, ObjectStore, PutObjectResult};

/// Smallest part S3 accepts for all but the last part of a multipart upload
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Most parts a single multipart upload may have
pub const MAX_PARTS: u64 = 10_000;

/// An uploaded file as received from a form: its bytes, the name the client
/// gave it and the content type the client declared
#[derive(Debug, Clone, Default)]
pub struct UploadSource {
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.original_filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Object name that cannot collide with earlier uploads of the same file:
/// a hyphen-less v4 UUID followed by the original filename
pub fn unique_object_name(original_filename: &str) -> String {
    format!("{}{}", Uuid::new_v4().simple(), original_filename)
}

/// Part size for an upload of `declared_size` bytes, growing past
/// `base_part_size` in whole MiB when the object would need more than
/// [`MAX_PARTS`] parts
pub fn part_size_for(declared_size: Option<u64>, base_part_size: usize) -> usize {
    const MIB: u64 = 1024 * 1024;

    let base = base_part_size.max(1) as u64;
    let needed = declared_size.map_or(base, |size| size.div_ceil(MAX_PARTS));
    if needed <= base {
        return base_part_size.max(1);
    }
    usize::try_from(needed.div_ceil(MIB) * MIB).unwrap_or(usize::MAX)
}

/// Read up to `part_size` bytes, stopping early only at end of stream
async fn read_part<R>(reader: &mut R, part_size: usize) -> Result<Bytes, StoreError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(part_size.min(MIN_PART_SIZE));
    (&mut *reader)
        .take(part_size as u64)
        .read_to_end(&mut buf)
        .await?;
    Ok(Bytes::from(buf))
}

fn check_size(declared_size: Option<u64>, read: u64) -> Result<(), StoreError> {
    match declared_size {
        Some(declared) if declared != read => Err(StoreError::InvalidArgument(format!(
            "stream ended after {read} bytes, {declared} were declared"
        ))),
        _ => Ok(()),
    }
}

/// Streams a reader into a store
///
/// A source that fits into one part is sent with a single PUT. Anything
/// larger becomes a multipart upload, which is aborted if any step after its
/// creation fails.
pub struct Uploader<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    part_size: usize,
}

impl<'a, S: ObjectStore + ?Sized> Uploader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            part_size: MIN_PART_SIZE,
        }
    }

    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Upload `reader` to `bucket/key`. With a declared size, exactly that
    /// many bytes are read; a shorter stream is an error.
    pub async fn upload<R>(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut R,
        declared_size: Option<u64>,
        content_type: Option<&str>,
    ) -> Result<PutObjectResult, StoreError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let part_size = part_size_for(declared_size, self.part_size);
        match declared_size {
            Some(size) => {
                let mut limited = (&mut *reader).take(size);
                self.upload_parts(bucket, key, &mut limited, declared_size, content_type, part_size)
                    .await
            }
            None => {
                self.upload_parts(bucket, key, reader, None, content_type, part_size)
                    .await
            }
        }
    }

    async fn upload_parts<R>(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut R,
        declared_size: Option<u64>,
        content_type: Option<&str>,
        part_size: usize,
    ) -> Result<PutObjectResult, StoreError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let first = read_part(reader, part_size).await?;
        if first.len() < part_size {
            check_size(declared_size, first.len() as u64)?;
            return self.store.put_object(bucket, key, first, content_type).await;
        }

        let upload_id = self
            .store
            .create_multipart_upload(bucket, key, content_type)
            .await?;
        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, part_size, "Started multipart upload");

        let result = self
            .send_parts(bucket, key, &upload_id, first, reader, declared_size, part_size)
            .await;

        if result.is_err() {
            if let Err(abort_err) = self
                .store
                .abort_multipart_upload(bucket, key, &upload_id)
                .await
            {
                warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %abort_err,
                    "Failed to abort multipart upload"
                );
            }
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_parts<R>(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Bytes,
        reader: &mut R,
        declared_size: Option<u64>,
        part_size: usize,
    ) -> Result<PutObjectResult, StoreError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut parts = Vec::new();
        let mut total = 0u64;
        let mut next = first;
        let mut part_number: i32 = 1;

        while !next.is_empty() {
            if u64::from(part_number.unsigned_abs()) > MAX_PARTS {
                return Err(StoreError::InvalidArgument(format!(
                    "object needs more than {MAX_PARTS} parts of {part_size} bytes"
                )));
            }

            total += next.len() as u64;
            let short = next.len() < part_size;
            let part = self
                .store
                .upload_part(bucket, key, upload_id, part_number, next)
                .await?;
            parts.push(CompletedPart::from(part));
            part_number += 1;

            next = if short {
                Bytes::new()
            } else {
                read_part(reader, part_size).await?
            };
        }

        check_size(declared_size, total)?;
        let result = self
            .store
            .complete_multipart_upload(bucket, key, upload_id, parts)
            .await?;
        debug!(bucket = %bucket, key = %key, size = total, "Completed multipart upload");
        Ok(result)
    }
}
