//! Company rows returned by the sourcing and screening engines

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field names under which upstream payloads carry the entity name
const NAME_FIELDS: [&str; 2] = ["Company", "Company "];

/// Stable synthetic identity assigned to a row when a result is ingested.
///
/// Selection is keyed by this id instead of list position so a regenerated
/// list can never re-point a selection at a different company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(u64);

impl RowId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

/// One row of opaque named columns.
///
/// Column order is the order the engine sent them in. Only the entity name
/// has meaning to the pipeline; everything else is carried through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyRecord(Map<String, Value>);

impl CompanyRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Single-column record, mostly useful in tests
    pub fn named(name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("Company".to_string(), Value::String(name.into()));
        Self(fields)
    }

    /// Entity name from `"Company"` or `"Company "`
    pub fn name(&self) -> Option<&str> {
        NAME_FIELDS
            .iter()
            .find_map(|field| self.0.get(*field).and_then(Value::as_str))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CompanyRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
