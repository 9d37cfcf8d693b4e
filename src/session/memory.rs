//! In-process engine. Evaluates statements against JSON rows so the service and routes can run
//! without PostgreSQL (local runs with `USE_MEMORY_ENGINE=true`, and tests).

use crate::error::AppError;
use crate::session::{ExecResult, Executor, Session, SessionSource};
use crate::sql::{Expr, FromItem, Predicate, Select, SelectItem, SortDirection, Statement};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Row = Map<String, Value>;
type Tables = HashMap<String, Vec<Row>>;

/// Shared table storage. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    executed: Arc<Mutex<Vec<Statement>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of `table`, including logically deleted ones.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    /// Every statement handed to an executor so far, after rewriting.
    pub fn executed(&self) -> Vec<Statement> {
        lock(&self.executed).clone()
    }
}

#[async_trait]
impl SessionSource for MemoryDatabase {
    async fn open(&self) -> Result<Session, AppError> {
        let working = lock(&self.tables).clone();
        Ok(Session::new(Box::new(MemoryExecutor {
            db: self.clone(),
            working,
        })))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Works on a private copy of the tables; commit writes the copy back.
pub struct MemoryExecutor {
    db: MemoryDatabase,
    working: Tables,
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn run(&mut self, stmt: &Statement) -> Result<ExecResult, AppError> {
        lock(&self.db.executed).push(stmt.clone());
        tracing::debug!(statement = ?stmt, "memory query");
        match stmt {
            Statement::Select(s) => {
                let rows = self.select(s)?;
                Ok(ExecResult {
                    rows_affected: rows.len() as u64,
                    rows: rows.into_iter().map(Value::Object).collect(),
                })
            }
            Statement::Insert(i) => {
                let pk = i.table.table.pk.clone();
                let table = self.working.entry(i.table.table.name.clone()).or_default();
                let mut returned = Vec::new();
                for values in &i.rows {
                    let row: Row = i.columns.iter().cloned().zip(values.iter().cloned()).collect();
                    if let Some(id) = row.get(&pk) {
                        if table.iter().any(|r| r.get(&pk) == Some(id)) {
                            return Err(AppError::Conflict(format!("{} {} already exists", i.table.table.name, id)));
                        }
                    }
                    if !i.returning.is_empty() {
                        returned.push(Value::Object(project(&row, &i.returning)));
                    }
                    table.push(row);
                }
                Ok(ExecResult {
                    rows: returned,
                    rows_affected: i.rows.len() as u64,
                })
            }
            Statement::Update(u) => {
                let table = self.working.entry(u.table.table.name.clone()).or_default();
                let mut affected = 0;
                let mut returned = Vec::new();
                for row in table.iter_mut() {
                    if !matches(u.predicate.as_ref(), row) {
                        continue;
                    }
                    for (col, value) in &u.assignments {
                        row.insert(col.clone(), value.clone());
                    }
                    affected += 1;
                    if !u.returning.is_empty() {
                        returned.push(Value::Object(project(row, &u.returning)));
                    }
                }
                Ok(ExecResult {
                    rows: returned,
                    rows_affected: affected,
                })
            }
            Statement::Delete(d) => {
                let table = self.working.entry(d.table.table.name.clone()).or_default();
                let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(table)
                    .into_iter()
                    .partition(|row| matches(d.predicate.as_ref(), row));
                *table = kept;
                let rows = if d.returning.is_empty() {
                    Vec::new()
                } else {
                    removed.iter().map(|r| Value::Object(project(r, &d.returning))).collect()
                };
                Ok(ExecResult {
                    rows,
                    rows_affected: removed.len() as u64,
                })
            }
            Statement::Raw { sql, .. } => Err(AppError::Unsupported(format!(
                "memory engine cannot run raw sql: {}",
                sql
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        *lock(&self.db.tables) = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

impl MemoryExecutor {
    fn select(&self, s: &Select) -> Result<Vec<Row>, AppError> {
        let mut rows = match s.from.as_slice() {
            [] => vec![Row::new()],
            [FromItem::Table(t)] => self.working.get(&t.table.name).cloned().unwrap_or_default(),
            [FromItem::SubSelect { select, .. }] => self.select(select)?,
            _ => {
                return Err(AppError::Unsupported(
                    "memory engine reads from a single source".into(),
                ))
            }
        };
        rows.retain(|row| matches(s.predicate.as_ref(), row));

        if let Some(alias) = s.columns.iter().find_map(|c| match c {
            SelectItem::Count { alias } => Some(alias),
            _ => None,
        }) {
            let mut out = Row::new();
            out.insert(alias.clone(), Value::from(rows.len() as u64));
            return Ok(vec![out]);
        }

        if !s.order_by.is_empty() {
            rows.sort_by(|a, b| {
                s.order_by
                    .iter()
                    .map(|o| {
                        let ord = compare(&eval(&o.expr, a), &eval(&o.expr, b)).unwrap_or(Ordering::Equal);
                        match o.direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        let offset = s.offset.unwrap_or(0) as usize;
        let limit = s.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(&row, &s.columns))
            .collect())
    }
}

fn project(row: &Row, items: &[SelectItem]) -> Row {
    if items.is_empty() || items.iter().any(|i| matches!(i, SelectItem::Star)) {
        return row.clone();
    }
    items
        .iter()
        .filter_map(|item| match item {
            SelectItem::Expr { expr, .. } => item.output_name().map(|n| (n.to_string(), eval(expr, row))),
            _ => None,
        })
        .collect()
}

fn eval(expr: &Expr, row: &Row) -> Value {
    match expr {
        Expr::Column { name, .. } => row.get(name).cloned().unwrap_or(Value::Null),
        Expr::Value(v) => v.clone(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        _ => None,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    !a.is_null() && !b.is_null() && (a == b || compare(a, b) == Some(Ordering::Equal))
}

fn ordered(a: &Value, b: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    compare(a, b).map(accept).unwrap_or(false)
}

fn matches(p: Option<&Predicate>, row: &Row) -> bool {
    p.map_or(true, |p| holds(p, row))
}

fn holds(p: &Predicate, row: &Row) -> bool {
    match p {
        Predicate::True => true,
        Predicate::False => false,
        Predicate::Eq(l, Expr::Value(Value::Null)) => eval(l, row).is_null(),
        Predicate::Neq(l, Expr::Value(Value::Null)) => !eval(l, row).is_null(),
        Predicate::Eq(l, r) => equal(&eval(l, row), &eval(r, row)),
        Predicate::Neq(l, r) => {
            let (a, b) = (eval(l, row), eval(r, row));
            !a.is_null() && !b.is_null() && !equal(&a, &b)
        }
        Predicate::Lt(l, r) => ordered(&eval(l, row), &eval(r, row), Ordering::is_lt),
        Predicate::Lte(l, r) => ordered(&eval(l, row), &eval(r, row), Ordering::is_le),
        Predicate::Gt(l, r) => ordered(&eval(l, row), &eval(r, row), Ordering::is_gt),
        Predicate::Gte(l, r) => ordered(&eval(l, row), &eval(r, row), Ordering::is_ge),
        Predicate::In(l, items) => {
            let v = eval(l, row);
            items.iter().any(|i| equal(&v, &eval(i, row)))
        }
        Predicate::And(l, r) => holds(l, row) && holds(r, row),
        Predicate::Or(l, r) => holds(l, row) || holds(r, row),
        Predicate::Not(p) => !holds(p, row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::user_table;
    use crate::intercept::ExecutionOptions;
    use crate::sql::{Delete, Insert, TableRef};
    use serde_json::json;

    async fn seeded() -> (MemoryDatabase, Session) {
        let db = MemoryDatabase::new();
        let mut session = db.open().await.unwrap();
        let insert = Insert {
            table: TableRef::new(user_table()),
            columns: vec!["id".into(), "username".into(), "is_deleted".into()],
            rows: vec![
                vec![json!("u1"), json!("alice"), json!(0)],
                vec![json!("u2"), json!("bob"), json!(0)],
                vec![json!("u3"), json!("carol"), json!(1)],
            ],
            returning: Vec::new(),
        };
        session.execute(insert, ExecutionOptions::default()).await.unwrap();
        (db, session)
    }

    #[tokio::test]
    async fn reads_skip_deleted_rows() {
        let (_db, mut session) = seeded().await;
        let rows = session.fetch_all(Select::from_table(user_table())).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn orders_and_pages() {
        let (_db, mut session) = seeded().await;
        let select = Select::from_table(user_table())
            .columns(vec![SelectItem::column("username")])
            .order_by(Expr::column("username"), SortDirection::Desc)
            .limit(1)
            .offset(1);
        let rows = session.fetch_all(select).await.unwrap();
        assert_eq!(rows, vec![json!({"username": "alice"})]);
    }

    #[tokio::test]
    async fn duplicate_primary_key_conflicts() {
        let (_db, mut session) = seeded().await;
        let insert = Insert {
            table: TableRef::new(user_table()),
            columns: vec!["id".into()],
            rows: vec![vec![json!("u1")]],
            returning: Vec::new(),
        };
        let err = session.execute(insert, ExecutionOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_flips_marker_unless_skipped() {
        let (db, mut session) = seeded().await;
        let by_id = |id: &str| Predicate::eq(Expr::column("id"), Expr::value(id));

        let soft = Delete::new(user_table()).filter(by_id("u1"));
        let res = session.execute(soft, ExecutionOptions::default()).await.unwrap();
        assert_eq!(res.rows_affected, 1);

        let hard = Delete::new(user_table()).filter(by_id("u2"));
        session.execute(hard, ExecutionOptions::hard_delete()).await.unwrap();
        session.commit().await.unwrap();

        let rows = db.rows("user");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.get("is_deleted") == Some(&json!(1))));
    }

    #[tokio::test]
    async fn writes_return_projected_rows() {
        let (_db, mut session) = seeded().await;
        let insert = Insert {
            table: TableRef::new(user_table()),
            columns: vec!["id".into(), "username".into(), "is_deleted".into()],
            rows: vec![vec![json!("u4"), json!("dave"), json!(0)]],
            returning: vec![SelectItem::column("id")],
        };
        let res = session.execute(insert, ExecutionOptions::default()).await.unwrap();
        assert_eq!(res.rows, vec![json!({"id": "u4"})]);

        let by_id = |id: &str| Predicate::eq(Expr::column("id"), Expr::value(id));
        let soft = Delete::new(user_table())
            .filter(by_id("u1"))
            .returning(vec![SelectItem::column("id"), SelectItem::column("is_deleted")]);
        let res = session.execute(soft, ExecutionOptions::default()).await.unwrap();
        assert_eq!(res.rows, vec![json!({"id": "u1", "is_deleted": 1})]);

        let hard = Delete::new(user_table())
            .filter(by_id("u2"))
            .returning(vec![SelectItem::column("username")]);
        let res = session.execute(hard, ExecutionOptions::hard_delete()).await.unwrap();
        assert_eq!(res.rows, vec![json!({"username": "bob"})]);
        assert_eq!(res.rows_affected, 1);
    }

    #[tokio::test]
    async fn raw_sql_is_unsupported() {
        let db = MemoryDatabase::new();
        let mut session = db.open().await.unwrap();
        let raw = Statement::Raw {
            sql: "SELECT 1".into(),
            params: Vec::new(),
        };
        let err = session.execute(raw, ExecutionOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let (db, session) = seeded().await;
        session.rollback().await.unwrap();
        assert!(db.rows("user").is_empty());
    }

    #[test]
    fn null_comparisons_follow_sql() {
        let row: Row = serde_json::from_value(json!({"a": null, "b": 2})).unwrap();
        assert!(holds(&Predicate::eq(Expr::column("a"), Expr::Value(Value::Null)), &row));
        assert!(!holds(&Predicate::eq(Expr::column("a"), Expr::value(2)), &row));
        assert!(!holds(&Predicate::Neq(Expr::column("a"), Expr::value(2)), &row));
        assert!(holds(&Predicate::Gte(Expr::column("b"), Expr::value(2.0)), &row));
        assert!(!holds(&Predicate::In(Expr::column("b"), vec![]), &row));
    }
}
