//! Error types for dbu-core

use thiserror::Error;

/// Core error type for dbupgrade
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Schema version string could not be parsed
    #[error("[C001] Invalid schema version '{text}': {reason}")]
    InvalidVersion { text: String, reason: String },

    /// C002: Configuration file not found
    #[error("[C002] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: Generic column type has no mapping
    #[error("[C004] Unknown generic column type '{generic}'")]
    UnknownGenericType { generic: String },

    /// C005: Generic column type has no SQL type for the vendor and no default
    #[error("[C005] Generic column type '{generic}' has no mapping for vendor '{vendor}'")]
    UnmappedVendorType { generic: String, vendor: String },

    /// C006: IO error with file path context
    #[error("[C006] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C007: YAML parse error
    #[error("[C007] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
