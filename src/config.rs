//! Configuration constants and validation functions for the harvester.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{HarvesterError, Result};

/// Default CSW endpoint of the geocat.ch catalog.
pub const DEFAULT_CSW_URL: &str = "https://www.geocat.ch/geonetwork/srv/eng/csw";

/// Default CQL filter used for discovery harvesting.
pub const DEFAULT_CQL: &str = "keyword = 'opendata.swiss'";

/// Number of records requested per `GetRecords` page.
pub const PAGE_SIZE: u32 = 50;

/// HTTP timeout in seconds.
///
/// Full `che` records can be large, so allow for slow responses.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Organization slug pattern: lowercase alphanumeric with dashes.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ORGANIZATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*$").expect("valid regex"));

/// Validate an organization slug.
///
/// The slug becomes part of every qualified dataset identifier, so it is
/// validated before any catalog request is made.
///
/// # Examples
/// ```
/// use geocat_harvester::config::validate_organization;
///
/// assert!(validate_organization("swisstopo").is_ok());
/// assert!(validate_organization("bundesamt-fuer-energie").is_ok());
/// assert!(validate_organization("Not A Slug").is_err());
/// ```
pub fn validate_organization(slug: &str) -> Result<()> {
    if ORGANIZATION_PATTERN.is_match(slug) {
        Ok(())
    } else {
        Err(HarvesterError::InvalidOrganization(slug.to_string()))
    }
}

/// Build the qualified identifier under which a harvested dataset is
/// published: `<source-id>@<organization-slug>`.
///
/// # Examples
/// ```
/// use geocat_harvester::config::qualified_identifier;
///
/// assert_eq!(
///     qualified_identifier("93814e81-2466-4690-b54d-c1d958f1c3b8", "swisstopo"),
///     "93814e81-2466-4690-b54d-c1d958f1c3b8@swisstopo"
/// );
/// ```
pub fn qualified_identifier(source_id: &str, organization: &str) -> String {
    format!("{source_id}@{organization}")
}
