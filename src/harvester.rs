//! End-to-end import: XML record in, canonical dataset out, plus the
//! harvest loop tying discovery and retrieval together.

use tracing::{debug, warn};

use crate::config::{qualified_identifier, validate_organization};
use crate::csw::CswClient;
use crate::distribution::classify;
use crate::error::Result;
use crate::mapping::DATASET_MAPPING;
use crate::normalize::normalize_dataset;
use crate::types::Dataset;
use crate::xml;

/// Import one full metadata record for an organization.
///
/// Parses the XML, extracts and normalizes the dataset fields, qualifies
/// the identifier with the organization slug and attaches the classified
/// distributions.
pub fn import_record(xml: &str, organization: &str) -> Result<Dataset> {
    validate_organization(organization)?;
    let doc = xml::parse(xml)?;
    let record = DATASET_MAPPING.evaluate(doc.root());
    let mut dataset = normalize_dataset(&record);
    dataset.identifier = qualified_identifier(&dataset.identifier, organization);
    dataset.resources = classify(doc.root(), &dataset);
    debug!(
        identifier = %dataset.identifier,
        resources = dataset.resources.len(),
        "imported record"
    );
    Ok(dataset)
}

/// Outcome of one harvest run.
pub struct HarvestReport {
    pub datasets: Vec<Dataset>,
    /// Record ids that failed to fetch or import, with the failure reason.
    pub skipped: Vec<(String, String)>,
}

/// Harvest every record matching a CQL constraint.
///
/// A failing record is skipped with a warning; only discovery failures
/// (the search itself) abort the run. `progress` is called once per
/// attempted record.
pub fn harvest(
    client: &CswClient,
    cql: &str,
    organization: &str,
    mut progress: impl FnMut(&str),
) -> Result<HarvestReport> {
    validate_organization(organization)?;
    let mut report = HarvestReport {
        datasets: Vec::new(),
        skipped: Vec::new(),
    };

    for id in client.search(cql) {
        let id = id?;
        progress(&id);
        match client
            .get_record_by_id(&id)
            .and_then(|xml| import_record(&xml, organization))
        {
            Ok(dataset) => report.datasets.push(dataset),
            Err(err) => {
                warn!(record = %id, error = %err, "skipping record");
                report.skipped.push((id, err.to_string()));
            }
        }
    }

    Ok(report)
}
