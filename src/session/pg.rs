//! PostgreSQL sessions: one transaction per session.

use crate::error::AppError;
use crate::session::{ExecResult, Executor, Session, SessionSource};
use crate::sql::{render, PgBindValue, Statement};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Transaction};

#[derive(Clone)]
pub struct PgSessionSource {
    pool: PgPool,
}

impl PgSessionSource {
    pub fn new(pool: PgPool) -> Self {
        PgSessionSource { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionSource for PgSessionSource {
    async fn open(&self) -> Result<Session, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Session::new(Box::new(PgExecutor { tx })))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgExecutor {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Executor for PgExecutor {
    async fn run(&mut self, stmt: &Statement) -> Result<ExecResult, AppError> {
        let q = render(stmt);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        if stmt.returns_rows() {
            let rows = query.fetch_all(&mut *self.tx).await?;
            Ok(ExecResult {
                rows_affected: rows.len() as u64,
                rows: rows.iter().map(row_to_json).collect(),
            })
        } else {
            let done = query.execute(&mut *self.tx).await?;
            Ok(ExecResult {
                rows: Vec::new(),
                rows_affected: done.rows_affected(),
            })
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row};
    let map = row
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.ordinal())))
        .collect();
    Value::Object(map)
}

/// Decode by trying the column types the schema produces, narrowest first.
fn cell_to_value(row: &PgRow, idx: usize) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(idx) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        return serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        return Value::String(u.simple().to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return Value::from(d.timestamp_millis());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(idx) {
        return j;
    }
    Value::Null
}
