//! Table definitions shared by statements, the CRUD service and schema creation.

use std::sync::Arc;

/// Column that marks a row as logically deleted.
pub const LOGICAL_DELETE_FIELD: &str = "is_deleted";

/// Values of the logical delete marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i64)]
pub enum IsDelete {
    NoDelete = 0,
    Delete = 1,
}

impl IsDelete {
    pub fn value(self) -> serde_json::Value {
        serde_json::Value::from(self as i64)
    }
}

/// Storage type of a column, used for DDL and for decoding rows.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnType {
    Text { max_length: Option<u32> },
    Int,
    BigInt,
    Bool,
    Double,
    Json,
}

impl ColumnType {
    pub fn sql_name(&self) -> String {
        match self {
            ColumnType::Text { max_length: Some(n) } => format!("VARCHAR({})", n),
            ColumnType::Text { max_length: None } => "TEXT".into(),
            ColumnType::Int => "INTEGER".into(),
            ColumnType::BigInt => "BIGINT".into(),
            ColumnType::Bool => "BOOLEAN".into(),
            ColumnType::Double => "DOUBLE PRECISION".into(),
            ColumnType::Json => "JSONB".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        ColumnInfo {
            name: name.to_string(),
            column_type,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub pk: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableDef {
    /// Table with the base record columns (`id`, `created_time`, `updated_time`, `is_deleted`)
    /// followed by `columns`.
    pub fn with_base_columns(name: &str, columns: Vec<ColumnInfo>) -> Arc<TableDef> {
        let mut all = vec![
            ColumnInfo::new("id", ColumnType::Text { max_length: Some(32) }),
            ColumnInfo::new("created_time", ColumnType::BigInt),
            ColumnInfo::new("updated_time", ColumnType::BigInt),
            ColumnInfo::new(LOGICAL_DELETE_FIELD, ColumnType::Int),
        ];
        all.extend(columns);
        Arc::new(TableDef {
            name: name.to_string(),
            pk: "id".into(),
            columns: all,
        })
    }

    /// Table with exactly the given columns; no marker unless listed.
    pub fn plain(name: &str, pk: &str, columns: Vec<ColumnInfo>) -> Arc<TableDef> {
        Arc::new(TableDef {
            name: name.to_string(),
            pk: pk.to_string(),
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn has_marker(&self) -> bool {
        self.has_column(LOGICAL_DELETE_FIELD)
    }
}

/// A table used as a statement source or target, optionally aliased.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRef {
    pub table: Arc<TableDef>,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: Arc<TableDef>) -> Self {
        TableRef { table, alias: None }
    }

    pub fn aliased(table: Arc<TableDef>, alias: &str) -> Self {
        TableRef {
            table,
            alias: Some(alias.to_string()),
        }
    }

    /// Name columns of this source are qualified with.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.name)
    }
}
