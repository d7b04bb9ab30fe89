//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted file size in bytes.
    ///
    /// Checked against the client-declared total size before accepting parts
    /// and, for uploads that went directly to storage, post-hoc against the
    /// stored object's actual size.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Extra request-body headroom in bytes for multipart framing.
    #[serde(default = "default_body_overhead")]
    pub body_overhead: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_file_size() -> u64 {
    crate::DEFAULT_MAX_FILE_SIZE
}

fn default_body_overhead() -> u64 {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_file_size: default_max_file_size(),
            body_overhead: default_body_overhead(),
        }
    }
}

impl ServerConfig {
    /// Request-body limit derived from the file size limit plus framing headroom.
    pub fn max_body_size(&self) -> usize {
        usize::try_from(self.max_file_size.saturating_add(self.body_overhead))
            .unwrap_or(usize::MAX)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for parts and combined uploads.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

/// How declared `content-length-range` bounds are compared to configured limits.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizeBoundCheck {
    /// The declared bounds must equal the configured limits, compared as
    /// strings. This is the historical behavior of upload policy endpoints.
    #[default]
    Exact,
    /// The declared bounds must fall within the configured limits numerically.
    Range,
}

/// Configured size limits for signed upload policies.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeBounds {
    /// Minimum accepted size in bytes.
    pub min: u64,
    /// Maximum accepted size in bytes.
    pub max: u64,
}

/// Signing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// The only bucket this server will sign requests for.
    pub expected_bucket: String,
    /// Declared size bounds a policy must carry. When absent, policies are
    /// signed without a size check.
    #[serde(default)]
    pub size_bounds: Option<SizeBounds>,
    /// Exact-string vs numeric-range comparison for declared size bounds.
    #[serde(default)]
    pub size_bound_check: SizeBoundCheck,
    /// Secret key source.
    pub secret_key: SecretKeyConfig,
}

/// Secret key source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SecretKeyConfig {
    /// Key stored in a file.
    File {
        /// Path to the key file.
        path: PathBuf,
    },
    /// Key stored in an environment variable.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Key provided directly as a value (NOT recommended for production).
    Value {
        /// The secret key string.
        key: String,
    },
}

impl SigningConfig {
    /// Validate signing configuration invariants.
    ///
    /// Returns warnings for settings that are allowed but risky, and an error
    /// for configurations that cannot work.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.expected_bucket.is_empty() {
            return Err("signing.expected_bucket cannot be empty".to_string());
        }

        if let Some(bounds) = &self.size_bounds
            && bounds.min > bounds.max
        {
            return Err(format!(
                "signing.size_bounds min {} exceeds max {}",
                bounds.min, bounds.max
            ));
        }

        if matches!(self.secret_key, SecretKeyConfig::Value { .. }) {
            warnings.push(
                "signing.secret_key is stored inline in the config file. \
                 Prefer a file or environment variable so the secret stays \
                 out of configuration management."
                    .to_string(),
            );
        }

        Ok(warnings)
    }

    /// Create a test configuration with an inline dummy secret.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            expected_bucket: "my-bucket".to_string(),
            size_bounds: Some(SizeBounds { min: 0, max: 1000 }),
            size_bound_check: SizeBoundCheck::Exact,
            secret_key: SecretKeyConfig::Value {
                key: "test-secret-key".to_string(),
            },
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Signing configuration (optional; without it the signature endpoint is
    /// unavailable but uploads still work).
    pub signing: Option<SigningConfig>,
}

impl AppConfig {
    /// Create a test configuration with filesystem storage and a dummy signer.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            signing: Some(SigningConfig::for_testing()),
        }
    }

    /// Validate the whole configuration, collecting warnings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if let Some(signing) = &self.signing {
            warnings.extend(signing.validate()?);
        } else {
            warnings.push(
                "no signing key configured, the signature endpoint will be disabled".to_string(),
            );
        }

        if self.server.max_file_size == 0 {
            return Err("server.max_file_size cannot be 0".to_string());
        }

        Ok(warnings)
    }
}
