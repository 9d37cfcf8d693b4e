//! Persisted records: rows of tables carrying the base columns, plus their unit-of-work state.

mod user;

pub use user::user_table;

use crate::sql::{IsDelete, TableDef, LOGICAL_DELETE_FIELD};
use serde_json::{Map, Value};
use std::sync::Arc;

/// 32-char hex id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Epoch milliseconds.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Where a record stands relative to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    /// Built in memory, never written.
    Transient,
    /// Loaded or flushed by the session holding it.
    Persistent,
    /// Exists in the database but is not tracked by any session.
    Detached,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub table: Arc<TableDef>,
    pub values: Map<String, Value>,
    pub state: InstanceState,
}

impl Record {
    /// New transient record. Base columns the caller left out are filled with defaults;
    /// keys that are not columns of `table` are dropped.
    pub fn new(table: Arc<TableDef>, values: Map<String, Value>) -> Self {
        let mut values: Map<String, Value> = values
            .into_iter()
            .filter(|(k, v)| table.has_column(k) && !v.is_null())
            .collect();
        let now = current_timestamp();
        let defaults = [
            (table.pk.as_str(), Value::String(new_id())),
            ("created_time", Value::from(now)),
            ("updated_time", Value::from(now)),
            (LOGICAL_DELETE_FIELD, IsDelete::NoDelete.value()),
        ];
        for (col, default) in defaults {
            if table.has_column(col) && !values.contains_key(col) {
                values.insert(col.to_string(), default);
            }
        }
        Record {
            table,
            values,
            state: InstanceState::Transient,
        }
    }

    /// Record for a row that was read from the database outside the current session.
    pub fn detached(table: Arc<TableDef>, row: Value) -> Self {
        let values = match row {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        Record {
            table,
            values,
            state: InstanceState::Detached,
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.values.get(&self.table.pk)
    }

    /// Identity used to find an attached copy of this record: table name and primary key.
    pub fn identity(&self) -> Option<(String, String)> {
        let id = match self.id()? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some((self.table.name.clone(), id))
    }

    pub fn is_deleted(&self) -> bool {
        self.values.get(LOGICAL_DELETE_FIELD) == Some(&IsDelete::Delete.value())
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}
