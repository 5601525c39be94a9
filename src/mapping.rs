//! Field mappings: compiled, ordered (field, rule) lists per document type.
//!
//! A mapping fixes the output schema of one record kind at construction
//! time: every declared field is always present in the evaluated
//! [`RawRecord`], and asking for an undeclared field is a programmer error
//! ([`MappingNotFound`]), never a document problem.
//!
//! [`MappingNotFound`]: crate::error::HarvesterError::MappingNotFound

use std::collections::BTreeMap;
use std::sync::LazyLock;

use roxmltree::Node;

use crate::error::{HarvesterError, Result};
use crate::rules::{
    array, constant, empty_list, evaluate, first_match, multi_text, path_text, sub_node_list, Env,
    ExtractionRule, RawValue,
};
use crate::types::Locale;

/// A named, ordered set of extraction rules.
#[derive(Debug, Clone)]
pub struct Mapping {
    name: &'static str,
    fields: Vec<(String, ExtractionRule)>,
}

impl Mapping {
    pub fn builder(name: &'static str) -> MappingBuilder {
        MappingBuilder {
            name,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared field names, in mapping order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// The rule declared for a field.
    pub fn rule(&self, field: &str) -> Result<&ExtractionRule> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rule)| rule)
            .ok_or_else(|| HarvesterError::MappingNotFound(field.to_string()))
    }

    /// Evaluate every rule against one document node.
    ///
    /// Every declared field ends up in the result, defaulting to the rule's
    /// empty representation when the document carries no data for it.
    pub fn evaluate(&self, node: Node<'_, '_>) -> RawRecord {
        let env = Env::default();
        let mut values = BTreeMap::new();
        for (field, rule) in &self.fields {
            values.insert(field.clone(), evaluate(rule, node, &env));
        }
        RawRecord { values }
    }
}

/// Builder validating the field list at construction time.
pub struct MappingBuilder {
    name: &'static str,
    fields: Vec<(String, ExtractionRule)>,
}

impl MappingBuilder {
    pub fn field(mut self, name: impl Into<String>, rule: ExtractionRule) -> Self {
        self.fields.push((name.into(), rule));
        self
    }

    pub fn build(self) -> Result<Mapping> {
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|(other, _)| other == name) {
                return Err(HarvesterError::InvalidQuery {
                    path: self.name.to_string(),
                    reason: format!("duplicate field '{name}'"),
                });
            }
        }
        Ok(Mapping {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// One evaluated record: every mapping field, keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    values: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.values.get(field)
    }

    /// Scalar view of a field; `''` when absent or non-scalar.
    pub fn text(&self, field: &str) -> &str {
        self.values.get(field).map(RawValue::as_text).unwrap_or("")
    }

    /// List view of a field; empty when absent.
    pub fn list(&self, field: &str) -> Vec<String> {
        self.values
            .get(field)
            .map(RawValue::to_list)
            .unwrap_or_default()
    }

    /// Row view of a field; empty when absent or not row-shaped.
    pub fn rows(&self, field: &str) -> Vec<Vec<String>> {
        match self.values.get(field) {
            Some(RawValue::Rows(rows)) => rows.clone(),
            _ => Vec::new(),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl FromIterator<(String, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        RawRecord {
            values: iter.into_iter().collect(),
        }
    }
}

/// The dataset-level mapping for `che:CHE_MD_Metadata` records.
#[allow(clippy::expect_used)] // Static mapping that is guaranteed to be valid
pub static DATASET_MAPPING: LazyLock<Mapping> =
    LazyLock::new(|| dataset_mapping().expect("valid dataset mapping"));

/// Mapping for download distributions (one `gmd:CI_OnlineResource`).
#[allow(clippy::expect_used)] // Static mapping that is guaranteed to be valid
pub static DOWNLOAD_DISTRIBUTION_MAPPING: LazyLock<Mapping> =
    LazyLock::new(|| download_distribution_mapping().expect("valid download mapping"));

/// Mapping for service distributions (one `gmd:CI_OnlineResource`).
#[allow(clippy::expect_used)] // Static mapping that is guaranteed to be valid
pub static SERVICE_DISTRIBUTION_MAPPING: LazyLock<Mapping> =
    LazyLock::new(|| service_distribution_mapping().expect("valid service mapping"));

/// Mapping for service operations (one `srv:SV_OperationMetadata`).
#[allow(clippy::expect_used)] // Static mapping that is guaranteed to be valid
pub static SERVICE_OPERATION_MAPPING: LazyLock<Mapping> =
    LazyLock::new(|| service_operation_mapping().expect("valid service operation mapping"));

/// Localized landing-page / relation URL candidates inside one online
/// resource, in the fallback order the portal expects.
fn localised_url_candidates(prefix: &str) -> Result<ExtractionRule> {
    let mut rules = Vec::new();
    for locale in ["#DE", "#FR", "#EN", "#IT"] {
        rules.push(path_text(&format!(
            "{prefix}//che:LocalisedURL[@locale='{locale}']/text()"
        ))?);
    }
    rules.push(path_text(&format!("{prefix}//che:LocalisedURL/text()"))?);
    Ok(first_match(rules))
}

/// Like [`localised_url_candidates`], restricted to URLs with actual text,
/// with a plain `gmd:URL` fallback for records without `che` localization.
fn linkage_url_candidates(prefix: &str, with_plain_url: bool) -> Result<ExtractionRule> {
    let mut rules = Vec::new();
    for locale in ["#DE", "#FR", "#EN", "#IT"] {
        rules.push(path_text(&format!(
            "{prefix}//che:LocalisedURL[@locale='{locale}'][text()]/text()"
        ))?);
    }
    rules.push(path_text(&format!(
        "{prefix}//che:LocalisedURL[text()]/text()"
    ))?);
    if with_plain_url {
        rules.push(path_text(&format!("{prefix}//gmd:URL[text()]/text()"))?);
    }
    Ok(first_match(rules))
}

/// A `(url, label)` row list for relation links of one protocol.
fn relation_rows(resource_path: &str) -> Result<ExtractionRule> {
    sub_node_list(
        resource_path,
        vec![
            localised_url_candidates(".")?,
            path_text(".//gmd:description/gco:CharacterString/text()")?,
        ],
    )
}

fn dataset_mapping() -> Result<Mapping> {
    let mut builder = Mapping::builder("dataset")
        .field(
            "identifier",
            path_text("//gmd:fileIdentifier/gco:CharacterString/text()")?,
        );

    for locale in Locale::ALL {
        let attr = locale.locale_ref();
        builder = builder
            .field(
                format!("title_{locale}"),
                path_text(&format!(
                    "//gmd:identificationInfo//gmd:citation//gmd:title//gmd:textGroup/gmd:LocalisedCharacterString[@locale='{attr}']/text()"
                ))?,
            )
            .field(
                format!("description_{locale}"),
                path_text(&format!(
                    "//gmd:identificationInfo//gmd:abstract//gmd:textGroup/gmd:LocalisedCharacterString[@locale='{attr}']/text()"
                ))?,
            );
    }

    // publication is preferred for issued, falling back to creation, then
    // revision; modified only ever reflects a revision
    let mut issued_candidates = Vec::new();
    for date_type in ["publication", "creation", "revision"] {
        for leaf in ["gco:DateTime", "gco:Date"] {
            issued_candidates.push(path_text(&format!(
                "//gmd:identificationInfo//gmd:citation//gmd:CI_Date[.//gmd:CI_DateTypeCode/@codeListValue = '{date_type}']//{leaf}/text()"
            ))?);
        }
    }
    let mut modified_candidates = Vec::new();
    for leaf in ["gco:DateTime", "gco:Date"] {
        modified_candidates.push(path_text(&format!(
            "//gmd:identificationInfo//gmd:citation//gmd:CI_Date[.//gmd:CI_DateTypeCode/@codeListValue = 'revision']//{leaf}/text()"
        ))?);
    }

    builder = builder
        .field("issued", first_match(issued_candidates))
        .field("modified", first_match(modified_candidates));

    // contacts by role precedence, with the metadata-level responsible party
    // as the last resort
    let mut publisher_candidates = Vec::new();
    let mut contact_candidates = Vec::new();
    for role in [
        "publisher",
        "owner",
        "pointOfContact",
        "distributor",
        "custodian",
    ] {
        publisher_candidates.push(path_text(&format!(
            "//gmd:identificationInfo//gmd:pointOfContact[.//gmd:CI_RoleCode/@codeListValue = '{role}']//gmd:organisationName/gco:CharacterString/text()"
        ))?);
        contact_candidates.push(path_text(&format!(
            "//gmd:identificationInfo//gmd:pointOfContact[.//gmd:CI_RoleCode/@codeListValue = '{role}']//gmd:address//gmd:electronicMailAddress/gco:CharacterString/text()"
        ))?);
    }
    publisher_candidates.push(path_text(
        "//gmd:contact//che:CHE_CI_ResponsibleParty//gmd:organisationName/gco:CharacterString/text()",
    )?);
    contact_candidates.push(path_text(
        "//gmd:contact//che:CHE_CI_ResponsibleParty//gmd:address//gmd:electronicMailAddress/gco:CharacterString/text()",
    )?);

    builder = builder
        .field("publishers", array(vec![first_match(publisher_candidates)]))
        .field(
            "contact_points",
            array(vec![first_match(contact_candidates)]),
        )
        .field(
            "groups",
            multi_text(
                "//gmd:identificationInfo//gmd:topicCategory/gmd:MD_TopicCategoryCode/text()",
            )?,
        )
        .field(
            "language",
            first_match(vec![
                path_text("//gmd:identificationInfo//gmd:language/gco:CharacterString/text()")?,
                path_text("//che:CHE_MD_Metadata/gmd:language/gco:CharacterString/text()")?,
            ]),
        )
        .field(
            "relations",
            array(vec![
                // every WWW:LINK beyond the first (the first is the landing
                // page, mapped to `url` below)
                relation_rows(
                    "(//gmd:distributionInfo/gmd:MD_Distribution//gmd:transferOptions//gmd:CI_OnlineResource[.//gmd:protocol/gco:CharacterString/text() = 'WWW:LINK-1.0-http--link'])[position()>1]",
                )?,
                relation_rows(
                    "//gmd:distributionInfo/gmd:MD_Distribution//gmd:transferOptions//gmd:CI_OnlineResource[.//gmd:protocol/gco:CharacterString/text() = 'CHTOPO:specialised-geoportal']",
                )?,
            ]),
        );

    for locale in Locale::ALL {
        builder = builder.field(
            format!("keywords_{locale}"),
            multi_text(&format!(
                "//gmd:identificationInfo//gmd:descriptiveKeywords//gmd:keyword//gmd:textGroup//gmd:LocalisedCharacterString[@locale='{}']/text()",
                locale.locale_ref()
            ))?,
        );
    }

    builder
        .field(
            "url",
            localised_url_candidates(
                "//gmd:distributionInfo/gmd:MD_Distribution//gmd:transferOptions//gmd:CI_OnlineResource[.//gmd:protocol/gco:CharacterString/text() = 'WWW:LINK-1.0-http--link']",
            )?,
        )
        .field(
            "spatial",
            path_text(
                "//gmd:identificationInfo//gmd:extent//gmd:description/gco:CharacterString/text()",
            )?,
        )
        .field("coverage", constant(""))
        .field(
            "temporals_start",
            path_text(
                "//gmd:identificationInfo//gmd:extent//gmd:temporalElement//gml:TimePeriod/gml:beginPosition/text()",
            )?,
        )
        .field(
            "temporals_end",
            path_text(
                "//gmd:identificationInfo//gmd:extent//gmd:temporalElement//gml:TimePeriod/gml:endPosition/text()",
            )?,
        )
        .field(
            "accrual_periodicity",
            path_text(
                "//gmd:identificationInfo//gmd:MD_MaintenanceInformation/gmd:maintenanceAndUpdateFrequency/gmd:MD_MaintenanceFrequencyCode/@codeListValue",
            )?,
        )
        .field(
            "see_alsos",
            multi_text(
                "//gmd:identificationInfo//gmd:aggregationInfo//gmd:aggregateDataSetIdentifier/gmd:MD_Identifier/gmd:code/gco:CharacterString/text()",
            )?,
        )
        .build()
}

/// Fields shared by download and service distribution mappings.
fn distribution_common(mut builder: MappingBuilder) -> Result<MappingBuilder> {
    builder = builder
        .field("name", path_text(".//gmd:name/gco:CharacterString/text()")?)
        .field(
            "protocol",
            path_text(".//gmd:protocol/gco:CharacterString/text()")?,
        );

    for locale in Locale::ALL {
        builder = builder
            .field(
                format!("description_{locale}"),
                path_text(&format!(
                    ".//gmd:description//gmd:LocalisedCharacterString[@locale='{}']/text()",
                    locale.locale_ref()
                ))?,
            )
            .field(
                format!("loc_url_{locale}"),
                path_text(&format!(
                    ".//che:LocalisedURL[@locale='{}']/text()",
                    locale.locale_ref()
                ))?,
            );
    }

    Ok(builder
        .field("license", constant(""))
        .field("identifier", constant(""))
        .field("byte_size", constant(""))
        .field("media_type", constant(""))
        .field("format", constant(""))
        .field("coverage", constant("")))
}

fn download_distribution_mapping() -> Result<Mapping> {
    let builder = Mapping::builder("download-distribution")
        .field("language", constant(""))
        .field("url", linkage_url_candidates(".//gmd:linkage", true)?)
        .field(
            "download_url",
            linkage_url_candidates(".//gmd:linkage", true)?,
        );
    distribution_common(builder)?.build()
}

fn service_distribution_mapping() -> Result<Mapping> {
    let builder = Mapping::builder("service-distribution")
        .field("language", empty_list())
        .field("url", linkage_url_candidates(".//gmd:linkage", false)?)
        .field("download_url", constant(""));
    distribution_common(builder)?.build()
}

fn service_operation_mapping() -> Result<Mapping> {
    let mut builder = Mapping::builder("service-operation");
    for locale in Locale::ALL {
        builder = builder.field(
            format!("title_{locale}"),
            path_text(".//srv:operationName/gco:CharacterString/text()")?,
        );
    }
    builder
        .field("language", empty_list())
        .field(
            "url",
            linkage_url_candidates(".//srv:connectPoint//gmd:linkage", false)?,
        )
        .field("description", constant(""))
        .field("license", constant(""))
        .field("identifier", constant(""))
        .field("download_url", constant(""))
        .field("byte_size", constant(""))
        .field("media_type", constant(""))
        .field("format", constant(""))
        .field("coverage", constant(""))
        .build()
}
