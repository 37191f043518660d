//! Column values, rows and result sets
//!
//! Rows are decoded defensively: every typed getter reports a missing column
//! or a value of the wrong type as `Error::Decode`, naming the column.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use spanstore_core::{DayKey, Error, Result};

/// A single column value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    BigInt(i64),
    /// UTF-8 text
    Text(String),
    /// Opaque bytes
    Blob(Vec<u8>),
    /// Calendar date
    Date(NaiveDate),
    /// Collection, used for `IN` markers
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::BigInt(_) => "bigint",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Date(_) => "date",
            Value::List(_) => "list",
        }
    }

    /// True for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a list value from anything convertible
    pub fn list<I, V>(items: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DayKey> for Value {
    fn from(v: DayKey) -> Self {
        Value::Date(v.date())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One row of a result set, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Raw access; `None` if the column is absent
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Value of a column, `Value::Null` if absent
    pub fn value(&self, column: &str) -> &Value {
        self.columns.get(column).unwrap_or(&Value::Null)
    }

    /// Column names present in this row
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Merge `other` into this row, overwriting shared columns
    pub fn merge(&mut self, other: Row) {
        self.columns.extend(other.columns);
    }

    /// Keep only the named columns
    pub fn project(&self, columns: &[String]) -> Row {
        Row {
            columns: columns
                .iter()
                .filter_map(|c| self.columns.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        }
    }

    fn required(&self, column: &str) -> Result<&Value> {
        match self.columns.get(column) {
            Some(Value::Null) | None => {
                Err(Error::decode(format!("column '{}' is missing", column)))
            }
            Some(value) => Ok(value),
        }
    }

    fn mismatch(column: &str, expected: &str, found: &Value) -> Error {
        Error::decode(format!(
            "column '{}' expected {}, found {}",
            column,
            expected,
            found.type_name()
        ))
    }

    /// Text column
    pub fn get_text(&self, column: &str) -> Result<&str> {
        match self.required(column)? {
            Value::Text(s) => Ok(s),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    /// Optional text column; absent or null yields `None`
    pub fn get_opt_text(&self, column: &str) -> Result<Option<&str>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    /// Bigint column
    pub fn get_bigint(&self, column: &str) -> Result<i64> {
        match self.required(column)? {
            Value::BigInt(v) => Ok(*v),
            other => Err(Self::mismatch(column, "bigint", other)),
        }
    }

    /// Optional bigint column
    pub fn get_opt_bigint(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::BigInt(v) => Ok(Some(*v)),
            other => Err(Self::mismatch(column, "bigint", other)),
        }
    }

    /// Blob column
    pub fn get_blob(&self, column: &str) -> Result<&[u8]> {
        match self.required(column)? {
            Value::Blob(b) => Ok(b),
            other => Err(Self::mismatch(column, "blob", other)),
        }
    }

    /// Date column
    pub fn get_date(&self, column: &str) -> Result<NaiveDate> {
        match self.required(column)? {
            Value::Date(d) => Ok(*d),
            other => Err(Self::mismatch(column, "date", other)),
        }
    }
}

/// Rows returned by one statement, in the order the session produced them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<Row>,
}

impl ResultSet {
    /// Wrap rows
    pub fn new(rows: Vec<Row>) -> Self {
        ResultSet { rows }
    }

    /// No rows, as returned by writes
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if no rows were returned
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
