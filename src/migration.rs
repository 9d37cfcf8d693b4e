//! Create tables from their definitions. Idempotent: existing tables are left alone.

use crate::error::AppError;
use crate::sql::{quoted, TableDef};
use sqlx::PgPool;
use std::sync::Arc;

/// `CREATE TABLE IF NOT EXISTS` statement for `table`.
pub fn create_table_sql(table: &TableDef) -> String {
    let mut col_defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quoted(&c.name), c.column_type.sql_name());
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    if table.has_column(&table.pk) {
        col_defs.push(format!("PRIMARY KEY ({})", quoted(&table.pk)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(&table.name),
        col_defs.join(", ")
    )
}

pub async fn create_tables(pool: &PgPool, tables: &[Arc<TableDef>]) -> Result<(), AppError> {
    for t in tables {
        let sql = create_table_sql(t);
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
        tracing::info!(table = %t.name, "table ready");
    }
    Ok(())
}
