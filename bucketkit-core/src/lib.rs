//! Core types for bucketkit
//!
//! This crate provides the error type and the connection settings shared by
//! the storage crate and the command line binary.

pub mod error;
pub mod settings;

pub use error::{ErrorCode, StoreError};
pub use settings::{Settings, StoreSettings};
