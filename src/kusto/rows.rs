//! Management result tables
//!
//! Decodes the primary table of a v1 REST response into named columns and
//! raw JSON rows. Cell typing is left to the caller.

use crate::error::{ResourceError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Column definition from the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: String,
}

impl Column {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: "string".to_string(),
        }
    }
}

/// Clusters send `DataType`, `ColumnType`, or both
#[derive(Debug, Deserialize)]
struct RawColumn {
    #[serde(rename = "ColumnName")]
    name: String,
    #[serde(rename = "ColumnType", default)]
    column_type: Option<String>,
    #[serde(rename = "DataType", default)]
    data_type: Option<String>,
}

impl From<RawColumn> for Column {
    fn from(raw: RawColumn) -> Self {
        Self {
            name: raw.name,
            column_type: raw.column_type.or(raw.data_type).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(rename = "Columns")]
    columns: Vec<RawColumn>,
    #[serde(rename = "Rows", default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(rename = "Tables")]
    tables: Vec<RawTable>,
}

/// A decoded result table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build an all-string table, mostly useful for mocks
    pub fn from_strings(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            columns: columns.iter().map(|c| Column::string(c)).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| Value::String(v.to_string())).collect())
                .collect(),
        }
    }

    /// Decode the primary (first) table of a v1 response
    pub fn from_v1_response(value: Value) -> Result<Self> {
        let response: RawResponse = serde_json::from_value(value)
            .map_err(|e| ResourceError::decode(format!("unexpected response shape: {}", e)))?;

        let Some(table) = response.tables.into_iter().next() else {
            return Err(ResourceError::decode("response contains no tables"));
        };

        let width = table.columns.len();
        if let Some(pos) = table.rows.iter().position(|row| row.len() != width) {
            return Err(ResourceError::decode(format!(
                "row {} has {} cells, expected {}",
                pos,
                table.rows[pos].len(),
                width
            )));
        }

        Ok(Self {
            columns: table.columns.into_iter().map(Column::from).collect(),
            rows: table.rows,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of a column that must be present
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| ResourceError::decode(format!("missing column '{}'", name)))
    }

    /// String cell at `(row, column)`, rejecting nulls and other types
    pub fn string_at(&self, row: usize, column: usize) -> Result<&str> {
        let cell = self
            .rows
            .get(row)
            .and_then(|r| r.get(column))
            .ok_or_else(|| ResourceError::decode(format!("no cell at row {} column {}", row, column)))?;

        cell.as_str().ok_or_else(|| {
            ResourceError::decode(format!(
                "column '{}' row {} is not a string: {}",
                self.columns[column].name, row, cell
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_first_table() {
        let rows = RowSet::from_v1_response(json!({
            "Tables": [
                {
                    "TableName": "Table_0",
                    "Columns": [
                        {"ColumnName": "ResourceTypeName", "DataType": "String"},
                        {"ColumnName": "StorageRoot", "DataType": "String", "ColumnType": "string"}
                    ],
                    "Rows": [["TempStorage", "https://acct.blob.core.windows.net/c"]]
                },
                {"TableName": "Table_1", "Columns": [], "Rows": []}
            ]
        }))
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows.column_index("StorageRoot"), Some(1));
        assert_eq!(rows.columns[0].column_type, "String");
        assert_eq!(rows.columns[1].column_type, "string");
        assert_eq!(rows.string_at(0, 0).unwrap(), "TempStorage");
    }

    #[test]
    fn test_missing_tables_is_decode_error() {
        let err = RowSet::from_v1_response(json!({"Tables": []})).unwrap_err();
        assert!(matches!(err, ResourceError::Decode(_)));

        let err = RowSet::from_v1_response(json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, ResourceError::Decode(_)));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = RowSet::from_v1_response(json!({
            "Tables": [{
                "Columns": [{"ColumnName": "A"}, {"ColumnName": "B"}],
                "Rows": [["a", "b"], ["only-one"]]
            }]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ResourceError::decode("row 1 has 1 cells, expected 2")
        );
    }

    #[test]
    fn test_string_at_rejects_null() {
        let rows = RowSet::new(
            vec![Column::string("A")],
            vec![vec![Value::Null]],
        );
        assert!(rows.string_at(0, 0).is_err());
        assert!(rows.require_column("B").is_err());
    }
}
