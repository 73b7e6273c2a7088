/*!
 * Tabular record model.
 *
 * A `Record` is an ordered list of column-key/scalar pairs. Columns outside
 * an optional `ColumnSchema` are kept in a passthrough bucket so they survive
 * write-back without ever being offered for translation.
 */

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::app_config::DEFAULT_LOCKED_KEY_PATTERN;
use crate::errors::RecordError;

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Textual content, the only translatable kind
    Text(String),
    /// Numeric content
    Number(Number),
    /// Boolean content
    Bool(bool),
    /// Explicit null
    Null,
}

impl CellValue {
    /// Convert a JSON value, rejecting arrays and objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Null => Some(Self::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert back into a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Null => Value::Null,
        }
    }

    /// Text content, if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Identifies one translatable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    /// Row index in the record set
    pub row: usize,
    /// Column key within the row
    pub column: String,
}

impl CellAddress {
    pub fn new(row: usize, column: impl Into<String>) -> Self {
        Self {
            row,
            column: column.into(),
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} '{}'", self.row, self.column)
    }
}

/// One row of the document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Schema columns in document order
    fields: Vec<(String, CellValue)>,

    /// Columns outside the schema, carried through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    passthrough: Vec<(String, CellValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from ordered pairs; a repeated key keeps its last value
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<CellValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.set(key, value.into());
        }
        record
    }

    /// Get a schema column value
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get the text of a schema column
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(CellValue::as_text)
    }

    /// Set a schema column, keeping its position when it already exists
    pub fn set(&mut self, key: impl Into<String>, value: CellValue) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Schema column keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Schema columns in order
    pub fn fields(&self) -> &[(String, CellValue)] {
        &self.fields
    }

    /// Text cells in order
    pub fn text_cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_text().map(|t| (k.as_str(), t)))
    }

    /// Columns held outside the schema
    pub fn passthrough(&self) -> &[(String, CellValue)] {
        &self.passthrough
    }

    /// Number of schema columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A copy holding only the listed text columns, in this record's order
    pub fn project(&self, keys: &[String]) -> Record {
        let fields = self
            .fields
            .iter()
            .filter(|(k, v)| keys.contains(k) && v.as_text().is_some())
            .cloned()
            .collect();
        Record {
            fields,
            passthrough: Vec::new(),
        }
    }

    /// Serialize into an ordered JSON object, passthrough columns last
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in self.fields.iter().chain(self.passthrough.iter()) {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

/// Optional column allow-list applied at ingestion
#[derive(Debug, Clone, Default)]
pub struct ColumnSchema {
    /// Allowed columns; `None` accepts every column
    columns: Option<Vec<String>>,
}

impl ColumnSchema {
    /// A schema that accepts every column
    pub fn open() -> Self {
        Self { columns: None }
    }

    /// A schema restricted to the given columns
    pub fn with_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
        }
    }

    fn accepts(&self, key: &str) -> bool {
        self.columns
            .as_ref()
            .is_none_or(|columns| columns.iter().any(|c| c == key))
    }

    /// Validate one JSON row and convert it into a record
    pub fn ingest_row(&self, row: usize, value: &Value) -> Result<Record, RecordError> {
        let object = value.as_object().ok_or(RecordError::NotAnObject { row })?;
        let mut record = Record::new();

        for (key, raw) in object {
            let cell = CellValue::from_json(raw).ok_or_else(|| RecordError::NonScalar {
                row,
                column: key.clone(),
            })?;
            if self.accepts(key) {
                record.fields.push((key.clone(), cell));
            } else {
                record.passthrough.push((key.clone(), cell));
            }
        }

        Ok(record)
    }
}

/// Column keys whose cells must never be translated
#[derive(Debug, Clone)]
pub struct LockedKeys {
    pattern: Option<Regex>,
}

impl LockedKeys {
    /// Lock every key matching `pattern`; an empty pattern locks nothing
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.trim().is_empty() {
            return Ok(Self::none());
        }
        Ok(Self {
            pattern: Some(Regex::new(pattern)?),
        })
    }

    pub fn none() -> Self {
        Self { pattern: None }
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(key))
    }
}

impl Default for LockedKeys {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_LOCKED_KEY_PATTERN).ok(),
        }
    }
}

/// Ordered sequence of records
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Validate JSON rows against a schema
    pub fn ingest(rows: &[Value], schema: &ColumnSchema) -> Result<Self, RecordError> {
        let records = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| schema.ingest_row(idx, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Record> {
        self.records.get(row)
    }

    pub fn get_mut(&mut self, row: usize) -> Option<&mut Record> {
        self.records.get_mut(row)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Serialize every record into a JSON array
    pub fn to_json(&self) -> Value {
        Value::Array(self.records.iter().map(Record::to_json).collect())
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}
