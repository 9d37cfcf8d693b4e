//! Checks on client-supplied sort keys, paging and filter values before they reach a statement.

use crate::error::AppError;
use crate::sql::{ColumnInfo, ColumnType, SortDirection, TableDef};
use regex::Regex;
use serde_json::{Map, Value};

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 1000;

const IDENT_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

pub struct QueryValidator;

impl QueryValidator {
    pub fn sort_direction(sort: &str) -> Result<SortDirection, AppError> {
        match sort.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(AppError::Validation(format!("sort must be asc or desc, got {}", other))),
        }
    }

    /// `orderby` must name a column of `table`.
    pub fn order_column<'t>(table: &'t TableDef, orderby: &str) -> Result<&'t ColumnInfo, AppError> {
        let ident = Regex::new(IDENT_PATTERN).map_err(|_| AppError::Validation("invalid identifier pattern".into()))?;
        if !ident.is_match(orderby) {
            return Err(AppError::Validation(format!("orderby {} is not a column name", orderby)));
        }
        table
            .column(orderby)
            .ok_or_else(|| AppError::Validation(format!("{} has no column {}", table.name, orderby)))
    }

    /// Page number and size, both at least 1. The size is capped at [`MAX_PAGE_SIZE`] and the
    /// resulting row offset must fit a signed 64-bit `OFFSET`.
    pub fn page(page_number: u64, page_size: u64) -> Result<(u64, u64), AppError> {
        if page_number < 1 {
            return Err(AppError::Validation("page_number must be at least 1".into()));
        }
        if page_size < 1 {
            return Err(AppError::Validation("page_size must be at least 1".into()));
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);
        match (page_number - 1).checked_mul(page_size) {
            Some(offset) if offset <= i64::MAX as u64 => Ok((page_number, page_size)),
            _ => Err(AppError::Validation(format!("page_number {} is out of range", page_number))),
        }
    }

    /// Convert a value to the column's storage type. Query strings arrive as text, so numeric
    /// and boolean columns parse them.
    pub fn coerce(column: &ColumnInfo, v: Value) -> Result<Value, AppError> {
        let bad = |v: &Value| {
            AppError::Validation(format!(
                "{} expects {}, got {}",
                column.name,
                column.column_type.sql_name(),
                v
            ))
        };
        match (&column.column_type, v) {
            (_, Value::Null) => Ok(Value::Null),
            (ColumnType::Int | ColumnType::BigInt, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| bad(&Value::String(s))),
            (ColumnType::Int | ColumnType::BigInt, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
            (ColumnType::Double, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| bad(&Value::String(s))),
            (ColumnType::Double, Value::Number(n)) => Ok(Value::Number(n)),
            (ColumnType::Bool, Value::String(s)) => match s.as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(bad(&Value::String(s))),
            },
            (ColumnType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ColumnType::Text { max_length }, Value::String(s)) => match max_length {
                Some(max) if s.chars().count() > *max as usize => Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    column.name, max
                ))),
                _ => Ok(Value::String(s)),
            },
            (ColumnType::Text { .. }, v @ (Value::Number(_) | Value::Bool(_))) => Ok(Value::String(v.to_string())),
            (ColumnType::Json, v) => Ok(v),
            (_, v) => Err(bad(&v)),
        }
    }

    /// Every non-nullable column must have a value.
    pub fn required(table: &TableDef, values: &Map<String, Value>) -> Result<(), AppError> {
        match table
            .columns
            .iter()
            .find(|c| !c.nullable && values.get(&c.name).map_or(true, Value::is_null))
        {
            Some(c) => Err(AppError::Validation(format!("{} is required", c.name))),
            None => Ok(()),
        }
    }

    /// Keep only keys that are columns of `table`, coerced to their types.
    pub fn columns_only(table: &TableDef, values: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        values
            .into_iter()
            .filter_map(|(k, v)| table.column(&k).map(|c| (c, k, v)))
            .map(|(c, k, v)| Ok((k, Self::coerce(c, v)?)))
            .collect()
    }
}
