//! XML parsing and namespace-aware path queries for ISO19139/GMD documents.

pub mod query;

pub use query::Query;

use roxmltree::{Document, Node};

use crate::error::Result;

/// Namespace table for ISO19139/GMD documents with the geocat `che`
/// extension. One process-wide immutable constant; query compilation
/// resolves prefixes against it explicitly.
pub const NAMESPACES: &[(&str, &str)] = &[
    ("atom", "http://www.w3.org/2005/Atom"),
    ("che", "http://www.geocat.ch/2008/che"),
    ("csw", "http://www.opengis.net/cat/csw/2.0.2"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dct", "http://purl.org/dc/terms/"),
    ("gco", "http://www.isotc211.org/2005/gco"),
    ("gmd", "http://www.isotc211.org/2005/gmd"),
    ("gml", "http://www.opengis.net/gml"),
    ("ogc", "http://www.opengis.net/ogc"),
    ("ows", "http://www.opengis.net/ows"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("srv", "http://www.isotc211.org/2005/srv"),
    ("xlink", "http://www.w3.org/1999/xlink"),
    ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
];

/// Resolve a namespace prefix to its URI.
pub fn namespace_uri(prefix: &str) -> Option<&'static str> {
    NAMESPACES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, uri)| *uri)
}

/// Parse an XML string into a document.
///
/// A malformed document fails with [`HarvesterError::MetadataFormat`] before
/// any rule evaluation happens.
///
/// [`HarvesterError::MetadataFormat`]: crate::error::HarvesterError::MetadataFormat
pub fn parse(xml: &str) -> Result<Document<'_>> {
    Ok(Document::parse(xml)?)
}

/// Get the trimmed text content of a node, or an empty string.
pub fn node_text(node: Node<'_, '_>) -> String {
    node.text().map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Check whether a node carries non-whitespace text.
pub fn has_text(node: Node<'_, '_>) -> bool {
    node.text().is_some_and(|s| !s.trim().is_empty())
}
