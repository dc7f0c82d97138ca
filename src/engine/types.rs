//! Universal data types for the MySQL engine layer
//!
//! These types are the normalized representation the HTTP surface, the
//! query builders, and the dump engine all speak.

use serde::{Deserialize, Serialize};

use crate::observability::Sensitive;

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Sensitive<String>,
    pub database: Option<String>,
    pub ssl: bool,
}

/// Universal value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Json(serde_json::Value),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl Value {
    /// Converts a JSON value submitted by a caller into a bindable value.
    /// Arrays and objects stay JSON (MySQL JSON columns accept them as text).
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }

    /// Reads the value as an unsigned count, for COUNT(*)-style cells.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }
}

/// A single row of data (indexed by column order)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

/// Query execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column names, in statement order
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Number of affected rows (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    pub fn with_rows_affected(affected: u64, time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: Some(affected),
            execution_time_ms: time_ms,
        }
    }

    /// Reshapes rows into JSON objects keyed by column name.
    pub fn to_objects(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (name, value) in self.columns.iter().zip(row.values.iter()) {
                    object.insert(
                        name.clone(),
                        serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                    );
                }
                serde_json::Value::Object(object)
            })
            .collect()
    }

    /// The single cell of a one-row, one-column result (COUNT(*) etc).
    pub fn single_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.values.first())
    }
}

/// Key role of a column, as reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    Primary,
    Unique,
    None,
}

/// One column of a table structure, derived fresh from the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type as MySQL reports it, e.g. `varchar(255)`
    pub data_type: String,
    pub nullable: bool,
    pub key: KeyRole,
    pub default_value: Option<String>,
    /// Extra attributes such as `auto_increment`
    pub extra: String,
}

/// One column entry of an index, as reported by SHOW INDEX
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableIndex {
    pub name: String,
    pub column: String,
    pub seq_in_index: u32,
    pub unique: bool,
    pub nullable: bool,
}

/// Full structure of a table: ordered columns plus index metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStructure {
    pub columns: Vec<ColumnDescriptor>,
    pub indexes: Vec<TableIndex>,
}

/// Column facts needed to validate inserts and build search predicates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    pub name: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

/// Pagination and search bounds for a row listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub search: Option<String>,
}

impl PageRequest {
    /// Effective limit, clamped to [1, 100] with a default of 10.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    /// Effective offset, clamped to >= 0 with a default of 0.
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// The search term, if one was given and it is non-empty.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

/// One page of rows plus the unfiltered total
#[derive(Debug, Clone, Serialize)]
pub struct RowPage {
    pub rows: Vec<serde_json::Value>,
    pub total: u64,
    pub limit: i64,
    pub offset: i64,
}

/// Column definition for table creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// Table definition for table creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

/// Outcome of replaying one dump statement that failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatementError {
    /// Zero-based position of the statement in the dump
    pub index: usize,
    /// Leading fragment of the failing statement
    pub statement: String,
    pub error: String,
}

/// Structured result of a dump replay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<ImportStatementError>,
}
