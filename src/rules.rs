//! Declarative extraction rules evaluated against XML document nodes.
//!
//! A rule tree is built once per mapping and never mutated; [`evaluate`] is a
//! pure function of the rule, the context node and a call-scoped [`Env`], so
//! rules can be shared and evaluated concurrently without coordination.

use roxmltree::Node;

use crate::error::Result;
use crate::xml::Query;

/// A raw extracted value: a string, a list of strings, or a list of
/// correlated string tuples (one per matched sub-node).
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    List(Vec<String>),
    Rows(Vec<Vec<String>>),
}

impl RawValue {
    /// The uniform presence rule: a non-empty string or a non-empty list.
    pub fn is_present(&self) -> bool {
        match self {
            RawValue::Text(s) => !s.is_empty(),
            RawValue::List(v) => !v.is_empty(),
            RawValue::Rows(r) => !r.is_empty(),
        }
    }

    /// Scalar view: the string itself, or the first list element.
    pub fn as_text(&self) -> &str {
        match self {
            RawValue::Text(s) => s,
            RawValue::List(v) => v.first().map(String::as_str).unwrap_or(""),
            RawValue::Rows(_) => "",
        }
    }

    /// List view: a single string becomes a one-element list if non-empty.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            RawValue::Text(s) if s.is_empty() => Vec::new(),
            RawValue::Text(s) => vec![s.clone()],
            RawValue::List(v) => v.clone(),
            RawValue::Rows(r) => r.iter().filter_map(|row| row.first().cloned()).collect(),
        }
    }
}

/// Extraction rule variants, matched exhaustively by the evaluator.
#[derive(Debug, Clone)]
pub enum ExtractionRule {
    /// Returns the value unconditionally.
    Constant(RawValue),
    /// Text of the first node matched by the query, or the empty value.
    PathText(Query),
    /// Ordered texts of all matched nodes.
    PathMultiText(Query),
    /// First rule whose result is present; order is significant.
    FirstMatch(Vec<ExtractionRule>),
    /// For every node matched by `path`, evaluate all `subrules` with that
    /// node as context, producing one row per match.
    SubNodeList {
        path: Query,
        subrules: Vec<ExtractionRule>,
    },
    /// Evaluates all rules; sequence results are flattened in order.
    Array(Vec<ExtractionRule>),
    /// Concatenates all non-empty scalar results with a separator.
    Combined {
        rules: Vec<ExtractionRule>,
        separator: String,
    },
}

/// Call-scoped evaluation environment. Carries overrides only; rules never
/// store per-call state.
#[derive(Debug, Clone)]
pub struct Env {
    /// Returned where a rule has nothing to extract. Defaults to `''`.
    pub empty_value: RawValue,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            empty_value: RawValue::Text(String::new()),
        }
    }
}

impl Env {
    pub fn with_empty_value(empty_value: RawValue) -> Self {
        Self { empty_value }
    }
}

/// Evaluate a rule against a document node.
pub fn evaluate(rule: &ExtractionRule, node: Node<'_, '_>, env: &Env) -> RawValue {
    match rule {
        ExtractionRule::Constant(value) => value.clone(),
        ExtractionRule::PathText(query) => match query.first_text(node) {
            Some(text) => RawValue::Text(text),
            None => env.empty_value.clone(),
        },
        ExtractionRule::PathMultiText(query) => RawValue::List(query.texts(node)),
        ExtractionRule::FirstMatch(rules) => {
            for candidate in rules {
                let value = evaluate(candidate, node, env);
                if value.is_present() {
                    return value;
                }
            }
            env.empty_value.clone()
        }
        ExtractionRule::SubNodeList { path, subrules } => {
            let mut rows = Vec::new();
            for sub_node in path.find_all(node) {
                let row = subrules
                    .iter()
                    .map(|sub| evaluate(sub, sub_node, env).as_text().to_string())
                    .collect();
                rows.push(row);
            }
            RawValue::Rows(rows)
        }
        ExtractionRule::Array(rules) => {
            let mut scalars: Vec<String> = Vec::new();
            let mut rows: Vec<Vec<String>> = Vec::new();
            for rule in rules {
                match evaluate(rule, node, env) {
                    // absent scalars contribute nothing to the sequence
                    RawValue::Text(s) if s.is_empty() => {}
                    RawValue::Text(s) => scalars.push(s),
                    RawValue::List(v) => scalars.extend(v),
                    RawValue::Rows(r) => rows.extend(r),
                }
            }
            if rows.is_empty() {
                RawValue::List(scalars)
            } else {
                rows.extend(scalars.into_iter().map(|s| vec![s]));
                RawValue::Rows(rows)
            }
        }
        ExtractionRule::Combined { rules, separator } => {
            let parts: Vec<String> = rules
                .iter()
                .map(|r| evaluate(r, node, env).as_text().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            RawValue::Text(parts.join(separator))
        }
    }
}

/// A constant string rule.
pub fn constant(value: &str) -> ExtractionRule {
    ExtractionRule::Constant(RawValue::Text(value.to_string()))
}

/// A constant empty-list rule.
pub fn empty_list() -> ExtractionRule {
    ExtractionRule::Constant(RawValue::List(Vec::new()))
}

/// Text of the first match of a path query.
pub fn path_text(path: &str) -> Result<ExtractionRule> {
    Ok(ExtractionRule::PathText(Query::parse(path)?))
}

/// Texts of all matches of a path query.
pub fn multi_text(path: &str) -> Result<ExtractionRule> {
    Ok(ExtractionRule::PathMultiText(Query::parse(path)?))
}

/// First present result among ordered candidates.
pub fn first_match(rules: Vec<ExtractionRule>) -> ExtractionRule {
    ExtractionRule::FirstMatch(rules)
}

/// Correlated sub-rule rows, one per node matched by `path`.
pub fn sub_node_list(path: &str, subrules: Vec<ExtractionRule>) -> Result<ExtractionRule> {
    Ok(ExtractionRule::SubNodeList {
        path: Query::parse(path)?,
        subrules,
    })
}

/// Flattening list of rule results.
pub fn array(rules: Vec<ExtractionRule>) -> ExtractionRule {
    ExtractionRule::Array(rules)
}

/// Non-empty results joined with a separator.
pub fn combined(rules: Vec<ExtractionRule>, separator: &str) -> ExtractionRule {
    ExtractionRule::Combined {
        rules,
        separator: separator.to_string(),
    }
}
