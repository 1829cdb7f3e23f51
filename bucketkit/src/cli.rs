//! Command line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bucketkit")]
#[command(about = "Bucket and object utilities for S3-compatible stores", long_about = None)]
pub struct Args {
    /// Settings file (defaults to bucketkit.toml in the working directory)
    #[arg(long, global = true, env = "BUCKETKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "BUCKETKIT_LOG_LEVEL")]
    pub log_level: String,

    /// Run against a throwaway in-memory store instead of the configured one
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Check whether a bucket exists
    Exists { bucket: String },

    /// Create a publicly readable bucket
    Mb { bucket: String },

    /// Remove a bucket that holds no data
    Rb { bucket: String },

    /// List buckets
    Buckets,

    /// List object names in a bucket
    Ls {
        bucket: String,

        /// Only list objects under this folder
        #[arg(long)]
        folder: Option<String>,

        /// Descend into subfolders instead of listing them as `name/`
        #[arg(long, short)]
        recursive: bool,
    },

    /// Upload a local file
    Put {
        bucket: String,
        object: String,
        file: PathBuf,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Upload a local file under a unique name and print a presigned URL
    Publish {
        bucket: String,
        file: PathBuf,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print a presigned GET URL
    Url {
        bucket: String,
        object: String,

        /// Validity in seconds, at most 604800 (defaults to the configured expiry)
        #[arg(long)]
        expires_secs: Option<u64>,
    },

    /// Remove one or more objects
    Rm {
        bucket: String,

        #[arg(required = true)]
        objects: Vec<String>,
    },
}
