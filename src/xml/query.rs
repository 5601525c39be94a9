//! Compiled, namespace-aware path queries against ISO19139/GMD documents.
//!
//! Queries cover the subset of XPath the geocat mappings actually need:
//!
//! - child (`/`) and descendant (`//`) steps with `prefix:name` tests
//! - predicates: `[@attr='v']`, `[text()]`, `[rel/path/text() = 'v']`,
//!   `[rel/path/@attr = 'v']` and bare existence forms of the latter
//! - trailing `/text()` or `/@attr` extraction
//! - a whole-query skip: `(path)[position()>N]`
//!
//! A query is compiled once (prefixes resolved against [`NAMESPACES`]) and is
//! immutable afterwards, so it can be shared freely between threads.
//!
//! [`NAMESPACES`]: super::NAMESPACES

use roxmltree::Node;

use crate::error::{HarvesterError, Result};
use crate::xml::{namespace_uri, node_text};

/// A compiled path query.
#[derive(Debug, Clone)]
pub struct Query {
    source: String,
    steps: Vec<Step>,
    /// Number of leading matches dropped, from `(path)[position()>N]`.
    skip: usize,
    extract: Extract,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    name: NameTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone)]
enum NameTest {
    Any,
    Named {
        namespace: Option<&'static str>,
        local: String,
    },
}

#[derive(Debug, Clone)]
enum Predicate {
    /// `[@attr]` or `[@attr='value']`
    Attr { name: String, value: Option<String> },
    /// `[text()]`: the node itself has non-whitespace text.
    HasText,
    /// `[rel/path]` or `[rel/path = 'value']`: a relative sub-query yields a
    /// non-empty result (optionally equal to `value`).
    SubQuery {
        query: Box<Query>,
        value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Extract {
    Nodes,
    Text,
    Attr(String),
}

impl Query {
    /// Compile a path query.
    ///
    /// Unknown namespace prefixes and malformed syntax are construction-time
    /// errors, never evaluation-time ones.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        let (inner, skip) = parse_position_wrapper(source)?;
        let mut query = parse_steps(inner)?;
        query.source = source.to_string();
        query.skip = skip;
        Ok(query)
    }

    /// The original query string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All nodes matched by the query, in document order.
    ///
    /// Trailing `/text()` or `/@attr` extraction is ignored here; the nodes
    /// the values would be read from are returned.
    pub fn find_all<'a, 'input>(&self, node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        let mut current = vec![node];
        for step in &self.steps {
            let mut next: Vec<Node<'a, 'input>> = Vec::new();
            for n in &current {
                match step.axis {
                    Axis::Child => {
                        for child in n.children().filter(|c| c.is_element()) {
                            if step.matches(child) && !next.contains(&child) {
                                next.push(child);
                            }
                        }
                    }
                    Axis::Descendant => {
                        for desc in n.descendants().filter(|d| d.is_element() && d != n) {
                            if step.matches(desc) && !next.contains(&desc) {
                                next.push(desc);
                            }
                        }
                    }
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        if self.skip > 0 && !current.is_empty() {
            current.drain(..self.skip.min(current.len()));
        }
        current
    }

    /// All extracted values: trimmed node texts, or attribute values if the
    /// query ends in `/@attr`. Empty strings are dropped.
    pub fn texts(&self, node: Node<'_, '_>) -> Vec<String> {
        self.find_all(node)
            .into_iter()
            .filter_map(|n| match &self.extract {
                Extract::Nodes | Extract::Text => Some(node_text(n)),
                Extract::Attr(attr) => attribute_value(n, attr).map(|v| v.trim().to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The first extracted value, if any.
    pub fn first_text(&self, node: Node<'_, '_>) -> Option<String> {
        self.texts(node).into_iter().next()
    }
}

impl Step {
    fn matches(&self, node: Node<'_, '_>) -> bool {
        let name_ok = match &self.name {
            NameTest::Any => true,
            NameTest::Named { namespace, local } => {
                node.tag_name().name() == local && node.tag_name().namespace() == *namespace
            }
        };
        name_ok && self.predicates.iter().all(|p| p.matches(node))
    }
}

impl Predicate {
    fn matches(&self, node: Node<'_, '_>) -> bool {
        match self {
            Predicate::Attr { name, value } => match attribute_value(node, name) {
                Some(actual) => value.as_ref().is_none_or(|v| actual == v.as_str()),
                None => false,
            },
            Predicate::HasText => crate::xml::has_text(node),
            Predicate::SubQuery { query, value } => {
                let results = query.texts(node);
                match value {
                    Some(v) => results.iter().any(|r| r == v),
                    None => !results.is_empty(),
                }
            }
        }
    }
}

/// Look up an attribute by local name, ignoring any namespace prefix.
fn attribute_value<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

fn invalid(source: &str, reason: impl Into<String>) -> HarvesterError {
    HarvesterError::InvalidQuery {
        path: source.to_string(),
        reason: reason.into(),
    }
}

/// Strip an optional `(inner)[position()>N]` wrapper, returning the inner
/// path and the number of leading matches to skip.
fn parse_position_wrapper(source: &str) -> Result<(&str, usize)> {
    if !source.starts_with('(') {
        return Ok((source, 0));
    }
    let close = find_matching_paren(source)
        .ok_or_else(|| invalid(source, "unbalanced parenthesis"))?;
    let inner = &source[1..close];
    let rest = source[close + 1..].trim();
    let skip = rest
        .strip_prefix("[position()>")
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| invalid(source, "expected [position()>N] after parenthesis"))?
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid(source, "position bound is not a number"))?;
    Ok((inner, skip))
}

fn find_matching_paren(source: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in source.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a path on a separator, ignoring occurrences inside brackets or
/// quotes. Empty segments are kept: they encode `//` descendant axes.
fn split_top_level(path: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (i, c) in path.char_indices() {
        match c {
            '\'' | '"' => match quote {
                Some(q) if q == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            '[' | '(' if quote.is_none() => depth += 1,
            ']' | ')' if quote.is_none() => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 && quote.is_none() => {
                parts.push(&path[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts
}

fn parse_steps(path: &str) -> Result<Query> {
    let path = path.trim();
    if path.is_empty() {
        return Err(invalid(path, "empty query"));
    }

    let segments = split_top_level(path, '/');
    let mut steps = Vec::new();
    let mut extract = Extract::Nodes;
    let mut next_axis = Axis::Child;

    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.trim();
        let last = i == segments.len() - 1;
        if segment.is_empty() {
            // a `//` separator; a trailing slash is malformed
            if last {
                return Err(invalid(path, "trailing slash"));
            }
            next_axis = Axis::Descendant;
            continue;
        }
        if segment == "." {
            // context step, as in `.//gmd:name`
            continue;
        }
        if segment == "text()" {
            if !last {
                return Err(invalid(path, "text() is only allowed as the last step"));
            }
            extract = Extract::Text;
            continue;
        }
        if let Some(attr) = segment.strip_prefix('@') {
            if !last {
                return Err(invalid(path, "@attribute is only allowed as the last step"));
            }
            if attr.is_empty() {
                return Err(invalid(path, "empty attribute name"));
            }
            extract = Extract::Attr(attr.to_string());
            continue;
        }
        steps.push(parse_step(path, segment, next_axis)?);
        next_axis = Axis::Child;
    }

    if steps.is_empty() {
        return Err(invalid(path, "query has no element steps"));
    }

    Ok(Query {
        source: path.to_string(),
        steps,
        skip: 0,
        extract,
    })
}

fn parse_step(source: &str, segment: &str, axis: Axis) -> Result<Step> {
    let name_end = segment.find('[').unwrap_or(segment.len());
    let name_part = segment[..name_end].trim();
    let name = parse_name_test(source, name_part)?;

    let mut predicates = Vec::new();
    let mut rest = segment[name_end..].trim();
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(invalid(source, format!("unexpected token '{rest}'")));
        }
        let close = find_matching_bracket(rest)
            .ok_or_else(|| invalid(source, "unbalanced bracket"))?;
        predicates.push(parse_predicate(source, &rest[1..close])?);
        rest = rest[close + 1..].trim();
    }

    Ok(Step {
        axis,
        name,
        predicates,
    })
}

fn find_matching_bracket(source: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in source.char_indices() {
        match c {
            '\'' | '"' => match quote {
                Some(q) if q == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            '[' if quote.is_none() => depth += 1,
            ']' if quote.is_none() => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_name_test(source: &str, name: &str) -> Result<NameTest> {
    if name == "*" {
        return Ok(NameTest::Any);
    }
    if name.is_empty() {
        return Err(invalid(source, "empty element name"));
    }
    match name.split_once(':') {
        Some((prefix, local)) => {
            if local.is_empty() {
                return Err(invalid(source, "empty element name"));
            }
            let uri = namespace_uri(prefix)
                .ok_or_else(|| invalid(source, format!("unknown namespace prefix '{prefix}'")))?;
            Ok(NameTest::Named {
                namespace: Some(uri),
                local: local.to_string(),
            })
        }
        None => Ok(NameTest::Named {
            namespace: None,
            local: name.to_string(),
        }),
    }
}

fn parse_predicate(source: &str, content: &str) -> Result<Predicate> {
    let content = content.trim();
    let (lhs, value) = match find_top_level_equals(content) {
        Some(pos) => {
            let value = unquote(source, content[pos + 1..].trim())?;
            (content[..pos].trim(), Some(value))
        }
        None => (content, None),
    };

    if let Some(attr) = lhs.strip_prefix('@') {
        if attr.is_empty() {
            return Err(invalid(source, "empty attribute name in predicate"));
        }
        return Ok(Predicate::Attr {
            name: attr.trim().to_string(),
            value,
        });
    }
    if lhs == "text()" || lhs == "./text()" {
        return match value {
            // `[text()='v']` is expressible as a sub-query on `.` but the
            // mappings never need it; reject rather than guess.
            Some(_) => Err(invalid(source, "text() comparison is not supported")),
            None => Ok(Predicate::HasText),
        };
    }

    let query = parse_steps(lhs).map_err(|_| {
        invalid(source, format!("cannot parse predicate path '{lhs}'"))
    })?;
    Ok(Predicate::SubQuery {
        query: Box::new(query),
        value,
    })
}

/// Position of the first `=` outside quotes and brackets.
fn find_top_level_equals(content: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in content.char_indices() {
        match c {
            '\'' | '"' => match quote {
                Some(q) if q == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            '[' | '(' if quote.is_none() => depth += 1,
            ']' | ')' if quote.is_none() => depth = depth.saturating_sub(1),
            '=' if quote.is_none() && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn unquote(source: &str, value: &str) -> Result<String> {
    let stripped = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')));
    match stripped {
        Some(v) => Ok(v.to_string()),
        None => Err(invalid(source, format!("expected quoted value, got '{value}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    const SAMPLE: &str = r#"
        <gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd"
                         xmlns:gco="http://www.isotc211.org/2005/gco">
          <gmd:fileIdentifier>
            <gco:CharacterString>abc-123</gco:CharacterString>
          </gmd:fileIdentifier>
          <gmd:contact>
            <gmd:CI_ResponsibleParty>
              <gmd:organisationName>
                <gco:CharacterString>Bundesamt</gco:CharacterString>
              </gmd:organisationName>
              <gmd:role>
                <gmd:CI_RoleCode codeListValue="publisher"/>
              </gmd:role>
            </gmd:CI_ResponsibleParty>
          </gmd:contact>
          <gmd:contact>
            <gmd:CI_ResponsibleParty>
              <gmd:organisationName>
                <gco:CharacterString>Kanton</gco:CharacterString>
              </gmd:organisationName>
              <gmd:role>
                <gmd:CI_RoleCode codeListValue="owner"/>
              </gmd:role>
            </gmd:CI_ResponsibleParty>
          </gmd:contact>
          <gmd:empty/>
        </gmd:MD_Metadata>"#;

    fn doc() -> Document<'static> {
        Document::parse(SAMPLE).unwrap()
    }

    #[test]
    fn test_child_and_descendant_steps() {
        let d = doc();
        let q = Query::parse("//gmd:fileIdentifier/gco:CharacterString/text()").unwrap();
        assert_eq!(q.texts(d.root()), vec!["abc-123".to_string()]);
    }

    #[test]
    fn test_descendant_in_the_middle() {
        let d = doc();
        let q = Query::parse("//gmd:contact//gco:CharacterString/text()").unwrap();
        assert_eq!(q.texts(d.root()), vec!["Bundesamt", "Kanton"]);
    }

    #[test]
    fn test_relative_context_path() {
        let d = doc();
        let contact = Query::parse("//gmd:contact").unwrap();
        let contacts = contact.find_all(d.root());
        assert_eq!(contacts.len(), 2);

        let name = Query::parse(".//gmd:organisationName/gco:CharacterString/text()").unwrap();
        assert_eq!(name.texts(contacts[1]), vec!["Kanton"]);
    }

    #[test]
    fn test_attribute_extraction() {
        let d = doc();
        let q = Query::parse("//gmd:role/gmd:CI_RoleCode/@codeListValue").unwrap();
        assert_eq!(q.texts(d.root()), vec!["publisher", "owner"]);
    }

    #[test]
    fn test_subquery_predicate_with_attribute() {
        let d = doc();
        let q = Query::parse(
            "//gmd:contact[.//gmd:CI_RoleCode/@codeListValue = 'owner']//gco:CharacterString/text()",
        )
        .unwrap();
        assert_eq!(q.texts(d.root()), vec!["Kanton"]);
    }

    #[test]
    fn test_subquery_predicate_with_text_equality() {
        let d = doc();
        let q = Query::parse(
            "//gmd:CI_ResponsibleParty[gmd:organisationName/gco:CharacterString/text() = 'Bundesamt']",
        )
        .unwrap();
        assert_eq!(q.find_all(d.root()).len(), 1);
    }

    #[test]
    fn test_has_text_predicate() {
        let d = doc();
        let with_text = Query::parse("//gco:CharacterString[text()]").unwrap();
        assert_eq!(with_text.find_all(d.root()).len(), 2);

        let empty = Query::parse("//gmd:empty[text()]").unwrap();
        assert!(empty.find_all(d.root()).is_empty());
    }

    #[test]
    fn test_attr_equals_predicate() {
        let d = doc();
        let q = Query::parse("//gmd:CI_RoleCode[@codeListValue='publisher']").unwrap();
        assert_eq!(q.find_all(d.root()).len(), 1);
        let none = Query::parse("//gmd:CI_RoleCode[@codeListValue='custodian']").unwrap();
        assert!(none.find_all(d.root()).is_empty());
    }

    #[test]
    fn test_position_skip() {
        let d = doc();
        let q = Query::parse("(//gmd:contact)[position()>1]").unwrap();
        assert_eq!(q.find_all(d.root()).len(), 1);
        let all_skipped = Query::parse("(//gmd:contact)[position()>5]").unwrap();
        assert!(all_skipped.find_all(d.root()).is_empty());
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let d = doc();
        let q = Query::parse("//gmd:doesNotExist/text()").unwrap();
        assert!(q.texts(d.root()).is_empty());
        assert_eq!(q.first_text(d.root()), None);
    }

    #[test]
    fn test_unknown_prefix_fails_at_parse_time() {
        assert!(Query::parse("//nosuch:element").is_err());
    }

    #[test]
    fn test_malformed_queries_fail_at_parse_time() {
        assert!(Query::parse("").is_err());
        assert!(Query::parse("//gmd:a/").is_err());
        assert!(Query::parse("//gmd:a[@='x']").is_err());
        assert!(Query::parse("(//gmd:a").is_err());
        assert!(Query::parse("(//gmd:a)[position()>x]").is_err());
        assert!(Query::parse("//gmd:").is_err());
    }

    #[test]
    fn test_namespace_mismatch_does_not_match() {
        let d = doc();
        // gco prefix resolves to a different URI than the gmd elements carry
        let q = Query::parse("//gco:fileIdentifier").unwrap();
        assert!(q.find_all(d.root()).is_empty());
    }

    #[test]
    fn test_unprefixed_name_matches_no_namespace_only() {
        let xml = "<root><child>x</child></root>";
        let d = Document::parse(xml).unwrap();
        let q = Query::parse("//child/text()").unwrap();
        assert_eq!(q.texts(d.root()), vec!["x"]);

        let namespaced = doc();
        let q2 = Query::parse("//fileIdentifier").unwrap();
        assert!(q2.find_all(namespaced.root()).is_empty());
    }
}
