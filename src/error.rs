//! Error types for the harvester.
//!
//! One `HarvesterError` enum for library consumers with detailed error
//! context; per-field extraction problems never surface here, they degrade
//! to the rule's empty value instead.

use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Document is not well-formed XML.
    #[error("Could not parse XML metadata: {0}")]
    MetadataFormat(#[from] roxmltree::Error),

    /// A mapping was asked for a field it does not declare.
    #[error("No mapping found for attribute '{0}'")]
    MappingNotFound(String),

    /// A path query string could not be compiled.
    #[error("Invalid path query '{path}': {reason}")]
    InvalidQuery { path: String, reason: String },

    /// Catalog search yielded no records, or a record fetch came back empty.
    #[error("No dataset found: {0}")]
    DatasetNotFound(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid organization slug.
    #[error("Invalid organization slug: '{0}'. Expected lowercase letters, digits and dashes")]
    InvalidOrganization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
