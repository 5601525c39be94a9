//! Classification of online resources into dataset distributions.
//!
//! A metadata record advertises its resources as `gmd:CI_OnlineResource`
//! elements whose `gmd:protocol` decides what they are: direct downloads,
//! OGC service endpoints, or nothing we publish. Service-type records
//! additionally list `srv:SV_OperationMetadata` operations that become
//! distributions of their own.

use std::sync::LazyLock;

use roxmltree::Node;

use crate::mapping::{
    RawRecord, DOWNLOAD_DISTRIBUTION_MAPPING, SERVICE_DISTRIBUTION_MAPPING,
    SERVICE_OPERATION_MAPPING,
};
use crate::normalize::locale_map;
use crate::types::{Dataset, Distribution, Locale, LocaleMap};
use crate::xml::Query;

/// Protocols published as direct downloads.
pub const DOWNLOAD_PROTOCOLS: &[&str] = &["WWW:DOWNLOAD-1.0-http--download", "WWW:DOWNLOAD-URL"];

/// Protocols published as service endpoints.
pub const SERVICE_PROTOCOLS: &[&str] = &[
    "OGC:WMTS-http-get-capabilities",
    "OGC:WMS-http-get-map",
    "OGC:WMS-http-get-capabilities",
    "OGC:WFS-http-get-capabilities",
];

/// Human-readable title prefix per protocol.
const PROTOCOL_TITLES: &[(&str, &str)] = &[
    ("OGC:WMTS-http-get-capabilities", "WMTS (GetCapabilities)"),
    ("OGC:WMS-http-get-map", "WMS (GetMap)"),
    ("OGC:WMS-http-get-capabilities", "WMS (GetCapabilities)"),
    ("OGC:WFS-http-get-capabilities", "WFS (GetCapabilities)"),
    ("WWW:DOWNLOAD-1.0-http--download", "Download"),
    ("WWW:DOWNLOAD-URL", "Download"),
];

#[allow(clippy::expect_used)] // Static query that is guaranteed to be valid
static ONLINE_RESOURCES: LazyLock<Query> = LazyLock::new(|| {
    Query::parse(
        "//gmd:distributionInfo/gmd:MD_Distribution//gmd:transferOptions//gmd:CI_OnlineResource",
    )
    .expect("valid online resource query")
});

#[allow(clippy::expect_used)] // Static query that is guaranteed to be valid
static SERVICE_OPERATIONS: LazyLock<Query> = LazyLock::new(|| {
    Query::parse("//gmd:identificationInfo//srv:containsOperations/srv:SV_OperationMetadata")
        .expect("valid service operation query")
});

#[allow(clippy::expect_used)] // Static query that is guaranteed to be valid
static SERVICE_MEDIA_TYPE: LazyLock<Query> = LazyLock::new(|| {
    Query::parse("//gmd:identificationInfo//srv:serviceType/gco:LocalName/text()")
        .expect("valid service type query")
});

#[allow(clippy::expect_used)] // Static query that is guaranteed to be valid
static FORMAT_MEDIA_TYPE: LazyLock<Query> = LazyLock::new(|| {
    Query::parse("//gmd:distributionInfo//gmd:distributionFormat//gmd:name//gco:CharacterString/text()")
        .expect("valid distribution format query")
});

/// Extract every distribution of one metadata record.
///
/// `dataset` supplies the inherited fields (issued, modified, description).
/// Resources whose protocol is neither a download nor a service protocol are
/// dropped; operations without a name are dropped.
pub fn classify(root: Node<'_, '_>, dataset: &Dataset) -> Vec<Distribution> {
    let media_type = record_media_type(root);
    let mut distributions = Vec::new();

    for resource in ONLINE_RESOURCES.find_all(root) {
        let protocol = resource_protocol(resource);
        if DOWNLOAD_PROTOCOLS.contains(&protocol.as_str()) {
            let record = DOWNLOAD_DISTRIBUTION_MAPPING.evaluate(resource);
            distributions.push(download_distribution(&record, dataset, &media_type));
        } else if SERVICE_PROTOCOLS.contains(&protocol.as_str()) {
            let record = SERVICE_DISTRIBUTION_MAPPING.evaluate(resource);
            distributions.push(service_distribution(&record, dataset));
        }
    }

    for operation in SERVICE_OPERATIONS.find_all(root) {
        let record = SERVICE_OPERATION_MAPPING.evaluate(operation);
        if record.text("title_de").is_empty() {
            continue;
        }
        distributions.push(operation_distribution(&record, dataset, &media_type));
    }

    distributions
}

/// The record-level media type: the service type name, overridden by the
/// distribution format name when both are declared.
fn record_media_type(root: Node<'_, '_>) -> String {
    FORMAT_MEDIA_TYPE
        .first_text(root)
        .or_else(|| SERVICE_MEDIA_TYPE.first_text(root))
        .unwrap_or_default()
}

#[allow(clippy::expect_used)] // Static query that is guaranteed to be valid
fn resource_protocol(resource: Node<'_, '_>) -> String {
    static PROTOCOL: LazyLock<Query> = LazyLock::new(|| {
        Query::parse(".//gmd:protocol/gco:CharacterString/text()").expect("valid protocol query")
    });
    PROTOCOL.first_text(resource).unwrap_or_default()
}

fn download_distribution(record: &RawRecord, dataset: &Dataset, media_type: &str) -> Distribution {
    let mut dist = base_distribution(record, dataset);
    dist.download_url = record.text("download_url").to_string();
    // zip downloads get their media type fixed regardless of the record
    if dist.download_url.ends_with(".zip") {
        dist.media_type = "application/zip".to_string();
    } else {
        dist.media_type = media_type.to_string();
    }
    dist
}

fn service_distribution(record: &RawRecord, dataset: &Dataset) -> Distribution {
    // service endpoints have no meaningful media type
    base_distribution(record, dataset)
}

fn operation_distribution(record: &RawRecord, dataset: &Dataset, media_type: &str) -> Distribution {
    Distribution {
        title: locale_map(record, "title"),
        description: dataset.description.clone(),
        language: Vec::new(),
        url: record.text("url").to_string(),
        download_url: String::new(),
        issued: dataset.issued,
        modified: dataset.modified,
        media_type: media_type.to_string(),
        format: String::new(),
        ..Distribution::default()
    }
}

/// Fields shared by download and service distributions.
fn base_distribution(record: &RawRecord, dataset: &Dataset) -> Distribution {
    Distribution {
        title: distribution_title(record),
        description: locale_map(record, "description"),
        language: declared_languages(record),
        url: record.text("url").to_string(),
        download_url: String::new(),
        issued: dataset.issued,
        modified: dataset.modified,
        media_type: String::new(),
        format: String::new(),
        ..Distribution::default()
    }
}

/// Locales for which the resource declares a localized URL.
fn declared_languages(record: &RawRecord) -> Vec<String> {
    Locale::ALL
        .iter()
        .filter(|locale| !record.text(&format!("loc_url_{locale}")).is_empty())
        .map(|locale| locale.code().to_string())
        .collect()
}

/// `<protocol title> <name>`, trimmed; falls back to the localized
/// description when neither part is present.
fn distribution_title(record: &RawRecord) -> LocaleMap {
    let prefix = PROTOCOL_TITLES
        .iter()
        .find(|(protocol, _)| *protocol == record.text("protocol"))
        .map(|(_, title)| *title)
        .unwrap_or("");
    let title = format!("{prefix} {}", record.text("name"));
    let title = title.trim();
    if title.is_empty() {
        locale_map(record, "description")
    } else {
        LocaleMap::uniform(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RawValue;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), RawValue::Text(v.to_string())))
            .collect()
    }

    fn dataset() -> Dataset {
        Dataset {
            issued: 1325289600,
            modified: Some(1356912000),
            description: LocaleMap {
                de: "Beschreibung".to_string(),
                ..LocaleMap::default()
            },
            ..Dataset::default()
        }
    }

    #[test]
    fn test_title_from_protocol_and_name() {
        let rec = record(&[
            ("protocol", "OGC:WMS-http-get-map"),
            ("name", "ch.example.layer"),
        ]);
        assert_eq!(
            distribution_title(&rec),
            LocaleMap::uniform("WMS (GetMap) ch.example.layer")
        );
    }

    #[test]
    fn test_title_protocol_only_is_trimmed() {
        let rec = record(&[("protocol", "WWW:DOWNLOAD-URL")]);
        assert_eq!(distribution_title(&rec), LocaleMap::uniform("Download"));
    }

    #[test]
    fn test_title_falls_back_to_description() {
        let rec = record(&[
            ("protocol", "SOMETHING:else"),
            ("description_de", "Datenblatt"),
        ]);
        let title = distribution_title(&rec);
        assert_eq!(title.de, "Datenblatt");
        assert_eq!(title.fr, "");
    }

    #[test]
    fn test_languages_follow_localized_urls() {
        let rec = record(&[
            ("loc_url_de", "https://example.ch/de"),
            ("loc_url_it", "https://example.ch/it"),
        ]);
        assert_eq!(
            declared_languages(&rec),
            vec!["de".to_string(), "it".to_string()]
        );
    }

    #[test]
    fn test_zip_download_overrides_media_type() {
        let rec = record(&[
            ("protocol", "WWW:DOWNLOAD-URL"),
            ("download_url", "https://example.ch/data.zip"),
        ]);
        let dist = download_distribution(&rec, &dataset(), "text/csv");
        assert_eq!(dist.media_type, "application/zip");
        assert_eq!(dist.download_url, "https://example.ch/data.zip");
    }

    #[test]
    fn test_non_zip_download_inherits_media_type() {
        let rec = record(&[("download_url", "https://example.ch/data.csv")]);
        let dist = download_distribution(&rec, &dataset(), "text/csv");
        assert_eq!(dist.media_type, "text/csv");
    }

    #[test]
    fn test_classify_dispatches_on_protocol() {
        let xml = r##"
            <che:CHE_MD_Metadata xmlns:che="http://www.geocat.ch/2008/che"
                                 xmlns:gmd="http://www.isotc211.org/2005/gmd"
                                 xmlns:gco="http://www.isotc211.org/2005/gco">
              <gmd:distributionInfo>
                <gmd:MD_Distribution>
                  <gmd:transferOptions>
                    <gmd:MD_DigitalTransferOptions>
                      <gmd:onLine>
                        <gmd:CI_OnlineResource>
                          <gmd:linkage>
                            <che:PT_FreeURL>
                              <che:URLGroup>
                                <che:LocalisedURL locale="#DE">https://example.ch/download.zip</che:LocalisedURL>
                              </che:URLGroup>
                            </che:PT_FreeURL>
                          </gmd:linkage>
                          <gmd:protocol><gco:CharacterString>WWW:DOWNLOAD-URL</gco:CharacterString></gmd:protocol>
                        </gmd:CI_OnlineResource>
                      </gmd:onLine>
                      <gmd:onLine>
                        <gmd:CI_OnlineResource>
                          <gmd:linkage>
                            <che:PT_FreeURL>
                              <che:URLGroup>
                                <che:LocalisedURL locale="#DE">https://wms.example.ch</che:LocalisedURL>
                              </che:URLGroup>
                            </che:PT_FreeURL>
                          </gmd:linkage>
                          <gmd:protocol><gco:CharacterString>OGC:WMS-http-get-map</gco:CharacterString></gmd:protocol>
                        </gmd:CI_OnlineResource>
                      </gmd:onLine>
                      <gmd:onLine>
                        <gmd:CI_OnlineResource>
                          <gmd:protocol><gco:CharacterString>WWW:LINK-1.0-http--link</gco:CharacterString></gmd:protocol>
                        </gmd:CI_OnlineResource>
                      </gmd:onLine>
                    </gmd:MD_DigitalTransferOptions>
                  </gmd:transferOptions>
                </gmd:MD_Distribution>
              </gmd:distributionInfo>
            </che:CHE_MD_Metadata>"##;
        let doc = Document::parse(xml).unwrap();
        let distributions = classify(doc.root(), &dataset());

        // the landing-page link is not a distribution
        assert_eq!(distributions.len(), 2);
        assert_eq!(distributions[0].media_type, "application/zip");
        assert_eq!(distributions[0].title, LocaleMap::uniform("Download"));
        assert_eq!(distributions[1].title, LocaleMap::uniform("WMS (GetMap)"));
        assert_eq!(distributions[1].media_type, "");
        assert_eq!(distributions[1].url, "https://wms.example.ch");
        assert_eq!(distributions[1].issued, 1325289600);
    }

    #[test]
    fn test_classify_service_operations() {
        let xml = r##"
            <che:CHE_MD_Metadata xmlns:che="http://www.geocat.ch/2008/che"
                                 xmlns:gmd="http://www.isotc211.org/2005/gmd"
                                 xmlns:gco="http://www.isotc211.org/2005/gco"
                                 xmlns:srv="http://www.isotc211.org/2005/srv">
              <gmd:identificationInfo>
                <che:CHE_SV_ServiceIdentification>
                  <srv:serviceType><gco:LocalName>OGC:WMS</gco:LocalName></srv:serviceType>
                  <srv:containsOperations>
                    <srv:SV_OperationMetadata>
                      <srv:operationName><gco:CharacterString>GetCapabilities</gco:CharacterString></srv:operationName>
                      <srv:connectPoint>
                        <gmd:CI_OnlineResource>
                          <gmd:linkage>
                            <che:PT_FreeURL>
                              <che:URLGroup>
                                <che:LocalisedURL locale="#DE">https://wms.example.ch?request=GetCapabilities</che:LocalisedURL>
                              </che:URLGroup>
                            </che:PT_FreeURL>
                          </gmd:linkage>
                        </gmd:CI_OnlineResource>
                      </srv:connectPoint>
                    </srv:SV_OperationMetadata>
                  </srv:containsOperations>
                  <srv:containsOperations>
                    <srv:SV_OperationMetadata>
                      <srv:operationName><gco:CharacterString></gco:CharacterString></srv:operationName>
                    </srv:SV_OperationMetadata>
                  </srv:containsOperations>
                </che:CHE_SV_ServiceIdentification>
              </gmd:identificationInfo>
            </che:CHE_MD_Metadata>"##;
        let doc = Document::parse(xml).unwrap();
        let distributions = classify(doc.root(), &dataset());

        // the unnamed operation is dropped
        assert_eq!(distributions.len(), 1);
        let op = &distributions[0];
        assert_eq!(op.title, LocaleMap::uniform("GetCapabilities"));
        assert_eq!(op.description.de, "Beschreibung");
        assert_eq!(op.media_type, "OGC:WMS");
        assert_eq!(op.url, "https://wms.example.ch?request=GetCapabilities");
    }
}
