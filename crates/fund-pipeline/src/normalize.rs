//! Parameter normalization
//!
//! Upstream payloads place the same parameter object at different depths
//! depending on which backend produced them. Each place is described by one
//! [`PathExtractor`]; a [`ParameterChain`] tries its extractors in order and
//! normalizes the first non-null hit into a [`ParameterSet`].

use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::model::{Parameter, ParameterSet};

/// Mandate sections that carry parameters for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MandateSection {
    Sourcing,
    Screening,
    Risk,
}

impl MandateSection {
    pub fn field(self) -> &'static str {
        match self {
            Self::Sourcing => "sourcing_parameters",
            Self::Screening => "screening_parameters",
            Self::Risk => "risk_parameters",
        }
    }
}

/// Looks up one fixed path of object keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExtractor {
    path: Vec<String>,
}

impl PathExtractor {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Walk the path; a missing key or an explicit `null` both count as absent
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        self.path
            .iter()
            .try_fold(payload, |node, key| node.get(key))
            .filter(|v| !v.is_null())
    }
}

impl fmt::Display for PathExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path.join("."))
    }
}

/// Ordered list of extractors; the first non-null hit wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterChain {
    extractors: Vec<PathExtractor>,
}

impl ParameterChain {
    pub fn new(extractors: Vec<PathExtractor>) -> Self {
        Self { extractors }
    }

    /// `criteria.mandate.<field>`, then `criteria.<field>`, then `<field>`
    pub fn for_field(field: &str) -> Self {
        Self::new(vec![
            PathExtractor::new(["criteria", "mandate", field]),
            PathExtractor::new(["criteria", field]),
            PathExtractor::new([field]),
        ])
    }

    pub fn for_section(section: MandateSection) -> Self {
        Self::for_field(section.field())
    }

    pub fn extractors(&self) -> &[PathExtractor] {
        &self.extractors
    }

    /// First extractor that finds a non-null value, with that value
    pub fn resolve<'a>(&self, payload: &'a Value) -> Option<(&PathExtractor, &'a Value)> {
        self.extractors
            .iter()
            .find_map(|ex| ex.extract(payload).map(|v| (ex, v)))
    }

    pub fn normalize(&self, payload: &Value) -> ParameterSet {
        match self.resolve(payload) {
            Some((extractor, value)) => {
                debug!(path = %extractor, "resolved parameter source");
                normalize_value(value)
            }
            None => {
                debug!("no parameter source found");
                ParameterSet::default()
            }
        }
    }
}

/// Convert an array or object into parameters, one per element or entry.
///
/// - string array elements become `{key: element, value: ""}`
/// - object array elements contribute their first key/value pair
/// - object entries keep iteration order and have their keys title-cased
pub fn normalize_value(value: &Value) -> ParameterSet {
    match value {
        Value::Array(items) => items.iter().map(array_element).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Parameter::new(title_case(k), display_value(v)))
            .collect(),
        Value::Null => ParameterSet::default(),
        other => {
            warn!(value = %other, "parameter source is a scalar, ignoring");
            ParameterSet::default()
        }
    }
}

fn array_element(item: &Value) -> Parameter {
    match item {
        Value::String(s) => Parameter::new(s.clone(), ""),
        Value::Object(map) => match map.iter().next() {
            Some((k, v)) => Parameter::new(k.clone(), display_value(v)),
            None => Parameter::new("", ""),
        },
        other => Parameter::new(display_value(other), ""),
    }
}

/// Render a JSON value the way it is displayed next to its key
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// `net_income` -> `Net Income`.
///
/// Splits on `_`, upper-cases the first character of each word, joins with a
/// single space. Keys that are already spaced pass through unchanged.
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
