//! Connection settings for the object store

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::StoreError;

/// Longest expiry S3 accepts for a presigned URL
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreSettings,
}

/// Where the object store lives and how to authenticate against it
#[derive(Deserialize, Clone)]
pub struct StoreSettings {
    /// Custom endpoint such as `http://localhost:9000`; AWS endpoints when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    #[serde(default = "default_true")]
    pub path_style: bool,

    /// Expiry of presigned URLs when the caller does not choose one
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: default_region(),
            path_style: default_true(),
            presign_expiry_secs: default_presign_expiry_secs(),
        }
    }
}

// The secret key must never end up in logs.
impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("path_style", &self.path_style)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .finish()
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_presign_expiry_secs() -> u64 {
    MAX_PRESIGN_EXPIRY.as_secs()
}

impl StoreSettings {
    /// Settings for a store with static credentials
    pub fn with_credentials(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            ..Self::default()
        }
    }

    /// Static credentials, if both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(endpoint) = &self.endpoint {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| StoreError::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(StoreError::Config(format!(
                    "endpoint '{endpoint}' must use http or https"
                )));
            }
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(StoreError::Config(
                "access_key and secret_key must be set together".to_string(),
            ));
        }

        if self.region.is_empty() {
            return Err(StoreError::Config("region must not be empty".to_string()));
        }

        let expiry = self.presign_expiry();
        if expiry.is_zero() || expiry > MAX_PRESIGN_EXPIRY {
            return Err(StoreError::Config(format!(
                "presign_expiry_secs must be between 1 and {}",
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }

        Ok(())
    }
}

impl Settings {
    /// Load configuration from `bucketkit.*` in the working directory and
    /// `BUCKETKIT_*` environment variables
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(None)
    }

    /// Like [`Settings::load`], reading `path` instead of the default file
    pub fn load_from(path: Option<&Path>) -> Result<Self, StoreError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("bucketkit").required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("BUCKETKIT")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let settings = Self::build(builder)?;
        tracing::info!(
            endpoint = settings.store.endpoint.as_deref().unwrap_or("<aws default>"),
            access_key = settings.store.access_key.as_deref().unwrap_or("<ambient>"),
            region = %settings.store.region,
            "Loaded object store settings"
        );
        Ok(settings)
    }

    /// Parse settings from a TOML document
    pub fn from_toml(document: &str) -> Result<Self, StoreError> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::from_str(document, config::FileFormat::Toml)),
        )
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, StoreError> {
        let settings = builder
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| StoreError::Config(e.to_string()))?;
        settings.store.validate()?;
        Ok(settings)
    }
}
