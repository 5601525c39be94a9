//! CSW 2.0.2 catalog client: paged `GetRecords` discovery and
//! `GetRecordById` retrieval in the vendor `che` output schema.

use std::collections::VecDeque;
use std::sync::LazyLock;

use reqwest::blocking::Client;
use roxmltree::Document;
use tracing::debug;

use crate::config::PAGE_SIZE;
use crate::error::{HarvesterError, Result};
use crate::http;
use crate::xml::{namespace_uri, Query};

const CSW_NS: &str = "http://www.opengis.net/cat/csw/2.0.2";

#[allow(clippy::expect_used)] // Static query that is guaranteed to be valid
static RECORD_IDS: LazyLock<Query> = LazyLock::new(|| {
    Query::parse("//che:CHE_MD_Metadata/gmd:fileIdentifier/gco:CharacterString/text()")
        .expect("valid record id query")
});

/// Client for one CSW endpoint.
pub struct CswClient {
    endpoint: String,
    client: Client,
}

impl CswClient {
    pub fn new(endpoint: &str) -> Result<CswClient> {
        Ok(CswClient {
            endpoint: endpoint.to_string(),
            client: http::create_client()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Search for record identifiers matching a CQL constraint.
    ///
    /// Pages of [`PAGE_SIZE`] records are fetched lazily while the iterator
    /// is consumed; the server's `nextRecord` cursor drives the paging. A
    /// search with zero matches yields a single
    /// [`HarvesterError::DatasetNotFound`].
    pub fn search<'a>(&'a self, cql: &str) -> RecordIds<'a> {
        RecordIds {
            client: self,
            cql: cql.to_string(),
            next_position: Some(0),
            buffer: VecDeque::new(),
        }
    }

    /// Fetch one full record in the `che` output schema.
    ///
    /// The response is returned verbatim; a response without any
    /// `che:CHE_MD_Metadata` element means the id is unknown to the catalog.
    pub fn get_record_by_id(&self, id: &str) -> Result<String> {
        #[allow(clippy::expect_used)] // namespace table carries the prefix
        let che = namespace_uri("che").expect("che namespace");
        let response = http::get_text(
            &self.client,
            &self.endpoint,
            &[
                ("service", "CSW"),
                ("version", "2.0.2"),
                ("request", "GetRecordById"),
                ("id", id),
                ("outputschema", che),
                ("elementsetname", "full"),
            ],
        )?;

        let doc = Document::parse(&response)?;
        let found = doc
            .descendants()
            .any(|n| n.has_tag_name((che, "CHE_MD_Metadata")));
        if !found {
            return Err(HarvesterError::DatasetNotFound(id.to_string()));
        }
        Ok(response)
    }

    fn fetch_page(&self, cql: &str, start_position: u32) -> Result<String> {
        debug!(start_position, "requesting GetRecords page");
        let body = get_records_request(cql, start_position);
        http::post_xml(&self.client, &self.endpoint, body)
    }
}

/// Lazy iterator over the record identifiers of one search.
pub struct RecordIds<'a> {
    client: &'a CswClient,
    cql: String,
    /// `startposition` of the next page; `None` once exhausted.
    next_position: Option<u32>,
    buffer: VecDeque<String>,
}

impl Iterator for RecordIds<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(id) = self.buffer.pop_front() {
                return Some(Ok(id));
            }
            let position = self.next_position.take()?;
            match self.fetch(position) {
                Ok(()) => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl RecordIds<'_> {
    fn fetch(&mut self, position: u32) -> Result<()> {
        let response = self.client.fetch_page(&self.cql, position)?;
        let page = parse_search_results(&response)?;
        if page.matched == 0 {
            return Err(HarvesterError::DatasetNotFound(self.cql.clone()));
        }
        debug!(
            matched = page.matched,
            returned = page.returned,
            next_record = page.next_record,
            "received GetRecords page"
        );
        if page.returned > 0 && page.next_record > 0 {
            self.next_position = Some(page.next_record);
        }
        self.buffer.extend(page.ids);
        Ok(())
    }
}

struct SearchResultsPage {
    matched: u32,
    returned: u32,
    next_record: u32,
    ids: Vec<String>,
}

fn parse_search_results(response: &str) -> Result<SearchResultsPage> {
    let doc = Document::parse(response)?;
    let results = doc
        .descendants()
        .find(|n| n.has_tag_name((CSW_NS, "SearchResults")))
        .ok_or_else(|| HarvesterError::DatasetNotFound("no search results".to_string()))?;

    Ok(SearchResultsPage {
        matched: attr_u32(results, "numberOfRecordsMatched"),
        returned: attr_u32(results, "numberOfRecordsReturned"),
        next_record: attr_u32(results, "nextRecord"),
        ids: RECORD_IDS.texts(doc.root()),
    })
}

fn attr_u32(node: roxmltree::Node<'_, '_>, name: &str) -> u32 {
    node.attribute(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn get_records_request(cql: &str, start_position: u32) -> String {
    #[allow(clippy::expect_used)] // namespace table carries the prefix
    let che = namespace_uri("che").expect("che namespace");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<csw:GetRecords xmlns:csw="{CSW_NS}" service="CSW" version="2.0.2"
    resultType="results" outputSchema="{che}"
    startPosition="{start_position}" maxRecords="{PAGE_SIZE}">
  <csw:Query typeNames="csw:Record">
    <csw:ElementSetName>summary</csw:ElementSetName>
    <csw:Constraint version="1.1.0">
      <csw:CqlText>{}</csw:CqlText>
    </csw:Constraint>
  </csw:Query>
</csw:GetRecords>"#,
        escape_xml(cql)
    )
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}
