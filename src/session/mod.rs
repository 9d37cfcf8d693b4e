//! Unit-of-work. A [`Session`] is acquired per request from a [`SessionSource`] and passed
//! explicitly to whatever needs it. Every statement it executes goes through
//! [`intercept`](crate::intercept::intercept) first.

pub mod memory;
pub mod pg;

use crate::entity::{current_timestamp, InstanceState, Record};
use crate::error::AppError;
use crate::intercept::{intercept, ExecutionOptions};
use crate::sql::{Delete, Expr, Insert, Predicate, Select, Statement, TableRef, Update};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub use memory::MemoryDatabase;
pub use pg::PgSessionSource;

/// Outcome of one statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecResult {
    pub rows: Vec<Value>,
    pub rows_affected: u64,
}

/// The engine a session hands rewritten statements to. Owns one open transaction.
#[async_trait]
pub trait Executor: Send {
    async fn run(&mut self, stmt: &Statement) -> Result<ExecResult, AppError>;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Opens sessions. Held in application state; there is no process-wide engine.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn open(&self) -> Result<Session, AppError>;
    /// Cheap liveness check of the underlying engine.
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Debug)]
enum PendingOp {
    Insert(Record),
    Update(Record),
    Remove(Record),
}

impl PendingOp {
    fn record(&self) -> &Record {
        match self {
            PendingOp::Insert(r) | PendingOp::Update(r) | PendingOp::Remove(r) => r,
        }
    }
}

pub struct Session {
    executor: Box<dyn Executor>,
    pending: Vec<PendingOp>,
}

impl Session {
    pub fn new(executor: Box<dyn Executor>) -> Self {
        Session {
            executor,
            pending: Vec::new(),
        }
    }

    /// Rewrite `stmt` for soft delete and run it.
    pub async fn execute(
        &mut self,
        stmt: impl Into<Statement>,
        opts: ExecutionOptions,
    ) -> Result<ExecResult, AppError> {
        let stmt = intercept(stmt.into(), &opts);
        self.executor.run(&stmt).await
    }

    pub async fn fetch_all(&mut self, select: Select) -> Result<Vec<Value>, AppError> {
        Ok(self.execute(select, ExecutionOptions::default()).await?.rows)
    }

    pub async fn fetch_optional(&mut self, select: Select) -> Result<Option<Value>, AppError> {
        Ok(self.fetch_all(select.limit(1)).await?.into_iter().next())
    }

    /// Value of the single selected column in the first row.
    pub async fn scalar(&mut self, select: Select) -> Result<Option<Value>, AppError> {
        let row = self.fetch_all(select).await?.into_iter().next();
        Ok(row.and_then(|r| match r {
            Value::Object(m) => m.into_iter().next().map(|(_, v)| v),
            other => Some(other),
        }))
    }

    /// Attach a record: transient ones are inserted on flush, persistent or detached ones
    /// updated. A record already attached under the same identity is replaced.
    pub fn add(&mut self, record: Record) {
        let slot = record
            .identity()
            .and_then(|id| self.pending.iter().position(|op| op.record().identity().as_ref() == Some(&id)));
        let op = match (slot.map(|i| &self.pending[i]), record.state) {
            (Some(PendingOp::Insert(_)), _) | (_, InstanceState::Transient) => PendingOp::Insert(record),
            _ => PendingOp::Update(record),
        };
        match slot {
            Some(i) => self.pending[i] = op,
            None => self.pending.push(op),
        }
    }

    /// Delete one record instance. See [`soft_delete_instance`].
    pub fn delete(&mut self, record: Record) {
        soft_delete_instance(record, self);
    }

    /// Whether a record with this identity is waiting to be flushed.
    pub fn is_attached(&self, record: &Record) -> bool {
        let Some(id) = record.identity() else {
            return false;
        };
        self.pending
            .iter()
            .any(|op| op.record().identity().as_ref() == Some(&id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Write attached records. Returns the total number of affected rows.
    pub async fn flush(&mut self) -> Result<u64, AppError> {
        let mut affected = 0;
        for op in std::mem::take(&mut self.pending) {
            let (stmt, opts) = flush_statement(&op)?;
            affected += self.execute(stmt, opts).await?.rows_affected;
        }
        Ok(affected)
    }

    pub async fn commit(mut self) -> Result<(), AppError> {
        self.flush().await?;
        self.executor.commit().await
    }

    /// Drop pending work and roll back the transaction.
    pub async fn rollback(self) -> Result<(), AppError> {
        self.executor.rollback().await
    }
}

/// Delete a loaded record. When its table has the marker the marker is set and the record
/// attached to `session` for update (or insert, if it was never written); otherwise a
/// physical delete by primary key is scheduled and any pending write for it is dropped.
pub fn soft_delete_instance(mut record: Record, session: &mut Session) {
    if record.table.has_marker() {
        record.values.insert(
            crate::sql::LOGICAL_DELETE_FIELD.to_string(),
            crate::sql::IsDelete::Delete.value(),
        );
        session.add(record);
        return;
    }
    let id = record.identity();
    let was_pending_insert = session.pending.iter().any(|op| {
        matches!(op, PendingOp::Insert(_)) && id.is_some() && op.record().identity() == id
    });
    if id.is_some() {
        session.pending.retain(|op| op.record().identity() != id);
    }
    if record.state != InstanceState::Transient && !was_pending_insert {
        session.pending.push(PendingOp::Remove(record));
    }
}

fn by_pk(record: &Record) -> Result<Predicate, AppError> {
    let id = record
        .id()
        .cloned()
        .ok_or_else(|| AppError::Validation(format!("{} record without primary key", record.table.name)))?;
    Ok(Predicate::eq(Expr::column(&record.table.pk), Expr::Value(id)))
}

fn flush_statement(op: &PendingOp) -> Result<(Statement, ExecutionOptions), AppError> {
    Ok(match op {
        PendingOp::Insert(r) => {
            let (columns, row): (Vec<String>, Vec<Value>) = r.values.clone().into_iter().unzip();
            let insert = Insert {
                table: TableRef::new(r.table.clone()),
                columns,
                rows: vec![row],
                returning: Vec::new(),
            };
            (insert.into(), ExecutionOptions::default())
        }
        PendingOp::Update(r) => {
            let mut update = Update::new(r.table.clone()).filter(by_pk(r)?);
            for (k, v) in &r.values {
                if k != &r.table.pk && k != "updated_time" {
                    update = update.set(k, v.clone());
                }
            }
            if r.table.has_column("updated_time") {
                update = update.set("updated_time", Value::from(current_timestamp()));
            }
            (update.into(), ExecutionOptions::default())
        }
        PendingOp::Remove(r) => {
            let delete = Delete::new(r.table.clone()).filter(by_pk(r)?);
            (delete.into(), ExecutionOptions::hard_delete())
        }
    })
}

pub type ScopedFuture<'s, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 's>>;

/// Run `op` inside a fresh session: commit when it returns `Ok`, roll back when it returns `Err`.
///
/// ```ignore
/// let page = with_session(&*state.sessions, move |s| Box::pin(async move {
///     service.get_by_page(s, &query).await
/// })).await?;
/// ```
pub async fn with_session<S, T, F>(source: &S, op: F) -> Result<T, AppError>
where
    S: SessionSource + ?Sized,
    F: for<'s> FnOnce(&'s mut Session) -> ScopedFuture<'s, T>,
{
    let mut session = source.open().await?;
    match op(&mut session).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            tracing::warn!(error = %e, "rolling back session");
            if let Err(rb) = session.rollback().await {
                tracing::error!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
