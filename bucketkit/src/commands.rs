//! Subcommand dispatch

use anyhow::{bail, Context};
use bucketkit_s3::{ObjectStore, StoreOps, UploadSource};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::Command;

/// Run one subcommand, writing its output to `out`
pub async fn run<W: Write>(
    ops: &StoreOps<dyn ObjectStore>,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Exists { bucket } => {
            let exists = ops.bucket_exists(&bucket).await?;
            writeln!(out, "{exists}")?;
        }
        Command::Mb { bucket } => {
            ops.create_bucket(&bucket)
                .await
                .with_context(|| format!("failed to create bucket {bucket}"))?;
            writeln!(out, "created {bucket}")?;
        }
        Command::Rb { bucket } => {
            if !ops.remove_bucket(&bucket).await? {
                bail!("bucket {bucket} does not exist or still holds objects");
            }
            writeln!(out, "removed {bucket}")?;
        }
        Command::Buckets => {
            for bucket in ops.list_buckets().await? {
                match bucket.created {
                    Some(created) => writeln!(out, "{}\t{}", created.to_rfc3339(), bucket.name)?,
                    None => writeln!(out, "-\t{}", bucket.name)?,
                }
            }
        }
        Command::Ls {
            bucket,
            folder,
            recursive,
        } => {
            let names = if recursive {
                ops.list_object_names_recursive(&bucket, folder.as_deref()).await?
            } else {
                ops.list_object_names(&bucket, folder.as_deref()).await?
            };
            let Some(names) = names else {
                bail!("bucket {bucket} does not exist");
            };
            for name in names {
                writeln!(out, "{name}")?;
            }
        }
        Command::Put {
            bucket,
            object,
            file,
            content_type,
        } => {
            let uploaded = ops
                .upload_from_path(&bucket, &object, &file, content_type.as_deref())
                .await
                .with_context(|| format!("failed to upload {}", file.display()))?;
            if !uploaded {
                bail!(
                    "bucket {bucket} or file {} does not exist",
                    file.display()
                );
            }
            writeln!(out, "uploaded {bucket}/{object}")?;
        }
        Command::Publish {
            bucket,
            file,
            content_type,
        } => {
            let source = read_source(&file, content_type).await?;
            let url = ops
                .put_object_and_get_url(&bucket, &source)
                .await
                .with_context(|| format!("failed to publish {}", file.display()))?;
            writeln!(out, "{url}")?;
        }
        Command::Url {
            bucket,
            object,
            expires_secs,
        } => {
            let url = match expires_secs {
                Some(secs) => {
                    ops.presigned_url(&bucket, &object, Duration::from_secs(secs))
                        .await?
                }
                None => ops.object_url(&bucket, &object).await?,
            };
            let Some(url) = url else {
                bail!("bucket {bucket} does not exist");
            };
            writeln!(out, "{url}")?;
        }
        Command::Rm { bucket, objects } => {
            let removed = if let [object] = objects.as_slice() {
                ops.remove_object(&bucket, object).await?
            } else {
                match ops.remove_objects(&bucket, &objects).await? {
                    Some(failures) => {
                        for failure in &failures {
                            warn!(key = %failure.key, code = %failure.code, "Not removed");
                        }
                        if !failures.is_empty() {
                            bail!("{} of {} objects were not removed", failures.len(), objects.len());
                        }
                        true
                    }
                    None => false,
                }
            };
            if !removed {
                bail!("bucket {bucket} does not exist");
            }
            info!(bucket = %bucket, count = objects.len(), "Removed objects");
        }
    }
    Ok(())
}

/// Read a local file as an upload from a form, keeping only its file name
async fn read_source(path: &Path, content_type: Option<String>) -> anyhow::Result<UploadSource> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut source = UploadSource::new(data);
    if let Some(name) = path.file_name() {
        source = source.with_filename(name.to_string_lossy());
    }
    if let Some(content_type) = content_type {
        source = source.with_content_type(content_type);
    }
    Ok(source)
}
