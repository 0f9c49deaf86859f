//! Query parameters and results.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::error::BoxError;

/// A parameter or column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl SqlValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// JSON form used for row mapping and log payloads.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(f) => Value::from(*f),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Bytes(b) => Value::from(b.clone()),
            SqlValue::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Parameter list; most statements bind only a handful of values.
pub type Params = SmallVec<[SqlValue; 8]>;

/// Build a [`Params`] list from heterogeneous values.
#[macro_export]
macro_rules! params {
    () => { $crate::types::Params::new() };
    ($($value:expr),+ $(,)?) => {{
        let mut params = $crate::types::Params::new();
        $( params.push($crate::types::SqlValue::from($value)); )+
        params
    }};
}

/// Raw result of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Row data
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: u64,
}

impl QueryResult {
    /// Result of a statement that returns no rows.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Map every row onto `T` by column name.
    pub fn rows_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(SqlValue::to_json))
                    .collect();
                serde_json::from_value(Value::Object(object))
            })
            .collect()
    }
}

/// Conversion from a raw [`QueryResult`] into the caller's type.
pub trait FromQueryResult: Sized {
    fn from_query_result(result: QueryResult) -> Result<Self, BoxError>;
}

impl FromQueryResult for QueryResult {
    fn from_query_result(result: QueryResult) -> Result<Self, BoxError> {
        Ok(result)
    }
}

impl FromQueryResult for () {
    fn from_query_result(_: QueryResult) -> Result<Self, BoxError> {
        Ok(())
    }
}

/// Rows affected.
impl FromQueryResult for u64 {
    fn from_query_result(result: QueryResult) -> Result<Self, BoxError> {
        Ok(result.rows_affected)
    }
}

/// Rows deserialized by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows<T>(pub Vec<T>);

impl<T> Rows<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: DeserializeOwned> FromQueryResult for Rows<T> {
    fn from_query_result(result: QueryResult) -> Result<Self, BoxError> {
        Ok(Rows(result.rows_as()?))
    }
}
