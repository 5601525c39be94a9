//! Geocat Harvester - Import Swiss geodata metadata from the geocat.ch CSW.
//!
//! This crate discovers ISO19139/GMD metadata records (with the geocat
//! `che` extension) through a CSW 2.0.2 catalog, extracts their fields
//! with declarative path rules and normalizes them into DCAT-style
//! datasets with classified distributions.
//!
//! # Example
//!
//! ```
//! use geocat_harvester::config;
//!
//! // Organization slugs are validated before any catalog request
//! assert!(config::validate_organization("swisstopo").is_ok());
//! assert_eq!(
//!     config::qualified_identifier("abc-123", "swisstopo"),
//!     "abc-123@swisstopo"
//! );
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`config`]: Configuration constants and validation
//! - [`types`]: Canonical output types (Dataset, Distribution, etc.)
//! - [`error`]: Error types and Result alias
//! - [`http`]: HTTP client for talking to the CSW endpoint
//! - [`xml`]: XML parsing, namespaces and path queries
//! - [`rules`]: Declarative extraction rules
//! - [`mapping`]: Compiled field mappings per record kind
//! - [`normalize`]: Raw record to canonical dataset normalization
//! - [`distribution`]: Online resource classification
//! - [`csw`]: CSW catalog client (GetRecords / GetRecordById)
//! - [`cli`]: Command-line interface
//! - [`harvester`]: Main import and harvest orchestration

pub mod cli;
pub mod config;
pub mod csw;
pub mod distribution;
pub mod error;
pub mod harvester;
pub mod http;
pub mod mapping;
pub mod normalize;
pub mod rules;
pub mod types;
pub mod xml;

// Re-export main functions
pub use harvester::{harvest, import_record};

// Re-export commonly used items
pub use config::{qualified_identifier, validate_organization};
pub use csw::CswClient;
pub use error::{HarvesterError, Result};
pub use types::{Dataset, Distribution, Locale, LocaleMap};
