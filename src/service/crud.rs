//! Generic CRUD over one table. Every read and delete goes through the session, so deleted rows
//! stay hidden and deletes stay logical unless the caller asks otherwise.

use crate::dto::{BasePageQueryReq, BasePageResp, BaseQueryReq};
use crate::entity::{current_timestamp, Record};
use crate::error::AppError;
use crate::intercept::ExecutionOptions;
use crate::service::validation::QueryValidator;
use crate::session::Session;
use crate::sql::{Delete, Expr, Insert, Predicate, Select, SelectItem, TableDef, TableRef, Update};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct CrudService {
    table: Arc<TableDef>,
}

impl CrudService {
    pub fn new(table: Arc<TableDef>) -> Self {
        CrudService { table }
    }

    pub fn table(&self) -> &Arc<TableDef> {
        &self.table
    }

    /// Select with `column = value` for every filter naming a column. Unknown keys and nulls
    /// are ignored.
    pub fn query_stmt(&self, filters: &Map<String, Value>, fields: Option<&[&str]>) -> Result<Select, AppError> {
        let mut select = Select::from_table(self.table.clone());
        if let Some(fields) = fields {
            for f in fields {
                QueryValidator::order_column(&self.table, f)?;
            }
            select = select.columns(fields.iter().map(|f| SelectItem::column(f)).collect());
        }
        let filters = QueryValidator::columns_only(&self.table, filters.clone())?;
        for (col, value) in filters {
            if !value.is_null() {
                select = select.filter(Predicate::eq(Expr::column(&col), Expr::Value(value)));
            }
        }
        Ok(select)
    }

    fn ordered(&self, select: Select, sort: &str, orderby: &str) -> Result<Select, AppError> {
        let direction = QueryValidator::sort_direction(sort)?;
        let column = QueryValidator::order_column(&self.table, orderby)?;
        Ok(select.order_by(Expr::column(&column.name), direction))
    }

    pub async fn get_by_page(
        &self,
        session: &mut Session,
        req: &BasePageQueryReq,
    ) -> Result<BasePageResp<Value>, AppError> {
        let stmt = self.query_stmt(&req.query.filters, None)?;
        self.auto_page(session, stmt, req).await
    }

    /// Page an arbitrary select: the total comes from a count over it, the items from the
    /// select itself ordered and sliced.
    pub async fn auto_page(
        &self,
        session: &mut Session,
        stmt: Select,
        req: &BasePageQueryReq,
    ) -> Result<BasePageResp<Value>, AppError> {
        let (page_number, page_size) = QueryValidator::page(req.page_number, req.page_size)?;
        let sort = req.query.sort.to_ascii_lowercase();
        let orderby = req.query.orderby.clone();
        let items = self.ordered(stmt.clone(), &sort, &orderby)?;

        let total = session
            .scalar(Select::count_of(stmt, "page_count", "total"))
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let mut resp = BasePageResp {
            page_number,
            page_size,
            page_count: 0,
            count: total,
            sort,
            orderby,
            data: Vec::new(),
        };
        if total == 0 {
            return Ok(resp);
        }
        resp.page_count = total.div_ceil(page_size);
        resp.data = session
            .fetch_all(items.limit(page_size).offset((page_number - 1) * page_size))
            .await?;
        Ok(resp)
    }

    pub async fn get_list(&self, session: &mut Session, req: &BaseQueryReq) -> Result<Vec<Value>, AppError> {
        let stmt = self.query_stmt(&req.filters, None)?;
        session.fetch_all(self.ordered(stmt, &req.sort, &req.orderby)?).await
    }

    pub async fn get_id_list(&self, session: &mut Session, req: &BaseQueryReq) -> Result<Vec<Value>, AppError> {
        let pk = self.table.pk.clone();
        let stmt = self.query_stmt(&req.filters, Some(&[pk.as_str()][..]))?;
        let rows = session.fetch_all(self.ordered(stmt, &req.sort, &req.orderby)?).await?;
        Ok(rows.into_iter().filter_map(|mut r| r.get_mut(&pk).map(Value::take)).collect())
    }

    /// Insert one record and return it with its generated base columns.
    pub async fn save(&self, session: &mut Session, values: Map<String, Value>) -> Result<Value, AppError> {
        let values = QueryValidator::columns_only(&self.table, values)?;
        let record = Record::new(self.table.clone(), values);
        QueryValidator::required(&self.table, &record.values)?;
        let out = record.to_value();
        session.add(record);
        session.flush().await?;
        Ok(out)
    }

    /// Insert `rows` in chunks of `batch_size`, one multi-row statement per chunk.
    pub async fn insert_many(
        &self,
        session: &mut Session,
        rows: Vec<Map<String, Value>>,
        batch_size: usize,
    ) -> Result<u64, AppError> {
        let records = rows
            .into_iter()
            .map(|r| {
                let record = Record::new(self.table.clone(), QueryValidator::columns_only(&self.table, r)?);
                QueryValidator::required(&self.table, &record.values)?;
                Ok(record)
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        let mut affected = 0;
        for chunk in records.chunks(batch_size.max(1)) {
            let columns: Vec<String> = self
                .table
                .columns
                .iter()
                .filter(|c| chunk.iter().any(|r| r.values.contains_key(&c.name)))
                .map(|c| c.name.clone())
                .collect();
            let rows = chunk
                .iter()
                .map(|r| columns.iter().map(|c| r.values.get(c).cloned().unwrap_or(Value::Null)).collect())
                .collect();
            let insert = Insert {
                table: TableRef::new(self.table.clone()),
                columns,
                rows,
                returning: Vec::new(),
            };
            affected += session.execute(insert, ExecutionOptions::default()).await?.rows_affected;
        }
        tracing::debug!(table = %self.table.name, rows = affected, "inserted batch");
        Ok(affected)
    }

    fn update_stmt(&self, id: &Value, values: Map<String, Value>) -> Result<Update, AppError> {
        let values = QueryValidator::columns_only(&self.table, values)?;
        let mut update = Update::new(self.table.clone()).filter(self.by_id(id));
        for (col, value) in values {
            if col != self.table.pk && col != "created_time" && col != "updated_time" {
                update = update.set(&col, value);
            }
        }
        if self.table.has_column("updated_time") {
            update = update.set("updated_time", Value::from(current_timestamp()));
        }
        if update.assignments.is_empty() {
            return Err(AppError::Validation("nothing to update".into()));
        }
        Ok(update)
    }

    /// Returns the number of rows updated.
    pub async fn update_by_id(
        &self,
        session: &mut Session,
        id: &Value,
        values: Map<String, Value>,
    ) -> Result<u64, AppError> {
        let update = self.update_stmt(id, values)?;
        Ok(session.execute(update, ExecutionOptions::default()).await?.rows_affected)
    }

    /// Each row must carry its primary key.
    pub async fn update_many_by_id(
        &self,
        session: &mut Session,
        rows: Vec<Map<String, Value>>,
    ) -> Result<u64, AppError> {
        let mut affected = 0;
        for row in rows {
            let id = row
                .get(&self.table.pk)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| AppError::Validation(format!("each item must have '{}'", self.table.pk)))?;
            affected += self.update_by_id(session, &id, row).await?;
        }
        Ok(affected)
    }

    pub async fn get_by_id(&self, session: &mut Session, id: &Value) -> Result<Option<Value>, AppError> {
        let select = Select::from_table(self.table.clone()).filter(self.by_id(id));
        session.fetch_optional(select).await
    }

    pub async fn get_by_ids(
        &self,
        session: &mut Session,
        ids: &[Value],
        cols: Option<&[&str]>,
    ) -> Result<Vec<Value>, AppError> {
        let select = self.query_stmt(&Map::new(), cols)?.filter(self.by_ids(ids));
        session.fetch_all(select).await
    }

    /// Returns the number of rows deleted, logically unless `opts` asks for a hard delete.
    pub async fn delete_by_id(
        &self,
        session: &mut Session,
        id: &Value,
        opts: ExecutionOptions,
    ) -> Result<u64, AppError> {
        let delete = Delete::new(self.table.clone()).filter(self.by_id(id));
        Ok(session.execute(delete, opts).await?.rows_affected)
    }

    pub async fn delete_by_ids(
        &self,
        session: &mut Session,
        ids: &[Value],
        opts: ExecutionOptions,
    ) -> Result<u64, AppError> {
        let delete = Delete::new(self.table.clone()).filter(self.by_ids(ids));
        Ok(session.execute(delete, opts).await?.rows_affected)
    }

    /// Count rows matching `filters`. At least one filter is required.
    pub async fn get_data_count(&self, session: &mut Session, filters: &Map<String, Value>) -> Result<u64, AppError> {
        if filters.is_empty() {
            return Err(AppError::BadRequest("count requires at least one filter".into()));
        }
        let select = self
            .query_stmt(filters, None)?
            .columns(vec![SelectItem::Count { alias: "total".into() }]);
        Ok(session.scalar(select).await?.and_then(|v| v.as_u64()).unwrap_or(0))
    }

    pub async fn is_exist(&self, session: &mut Session, filters: &Map<String, Value>) -> Result<bool, AppError> {
        Ok(self.get_data_count(session, filters).await? > 0)
    }

    fn by_id(&self, id: &Value) -> Predicate {
        Predicate::eq(Expr::column(&self.table.pk), Expr::Value(id.clone()))
    }

    fn by_ids(&self, ids: &[Value]) -> Predicate {
        Predicate::In(
            Expr::column(&self.table.pk),
            ids.iter().cloned().map(Expr::Value).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::user_table;
    use crate::session::{MemoryDatabase, SessionSource};
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    async fn seeded(n: usize) -> (CrudService, Session) {
        let svc = CrudService::new(user_table());
        let db = MemoryDatabase::new();
        let mut session = db.open().await.unwrap();
        let rows = (0..n)
            .map(|i| {
                obj(json!({
                    "id": format!("u{}", i),
                    "username": format!("user{}", i),
                    "password": "pw",
                    "created_time": i
                }))
            })
            .collect();
        svc.insert_many(&mut session, rows, 3).await.unwrap();
        (svc, session)
    }

    #[test]
    fn query_stmt_ignores_unknown_and_null_filters() {
        let svc = CrudService::new(user_table());
        let filters = obj(json!({"username": "a", "password": null, "nope": 1}));
        let s = svc.query_stmt(&filters, None).unwrap();
        assert_eq!(
            s.predicate,
            Some(Predicate::eq(Expr::column("username"), Expr::value("a")))
        );
    }

    #[tokio::test]
    async fn pages_with_counts() {
        let (svc, mut session) = seeded(25).await;
        let req = BasePageQueryReq {
            page_number: 3,
            page_size: 10,
            ..Default::default()
        };
        let page = svc.get_by_page(&mut session, &req).await.unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.data.len(), 5);
        // desc by created_time: the last page holds the oldest rows
        assert_eq!(page.data[4]["id"], json!("u0"));
    }

    #[tokio::test]
    async fn huge_page_number_is_rejected() {
        let (svc, mut session) = seeded(1).await;
        let req = BasePageQueryReq {
            page_number: u64::MAX / 2,
            page_size: 1000,
            ..Default::default()
        };
        let err = svc.get_by_page(&mut session, &req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_page_short_circuits() {
        let (svc, mut session) = seeded(0).await;
        let page = svc.get_by_page(&mut session, &BasePageQueryReq::default()).await.unwrap();
        assert_eq!((page.count, page.page_count), (0, 0));
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn deleted_rows_leave_counts_and_lists() {
        let (svc, mut session) = seeded(4).await;
        let n = svc
            .delete_by_ids(&mut session, &[json!("u1"), json!("u2")], ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(svc.get_list(&mut session, &BaseQueryReq::default()).await.unwrap().len(), 2);
        assert_eq!(svc.get_by_id(&mut session, &json!("u1")).await.unwrap(), None);

        let deleted = BaseQueryReq::default().filter("is_deleted", "1");
        let ids = svc.get_id_list(&mut session, &deleted).await.unwrap();
        assert_eq!(ids, vec![json!("u2"), json!("u1")]);
    }

    #[tokio::test]
    async fn update_and_count() {
        let (svc, mut session) = seeded(3).await;
        let n = svc
            .update_by_id(&mut session, &json!("u0"), obj(json!({"username": "renamed"})))
            .await
            .unwrap();
        assert_eq!(n, 1);
        let filters = obj(json!({"username": "renamed"}));
        assert_eq!(svc.get_data_count(&mut session, &filters).await.unwrap(), 1);
        assert!(svc.is_exist(&mut session, &filters).await.unwrap());
        assert!(matches!(
            svc.get_data_count(&mut session, &Map::new()).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn update_many_requires_ids() {
        let (svc, mut session) = seeded(2).await;
        let err = svc
            .update_many_by_id(&mut session, vec![obj(json!({"username": "x"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn get_by_ids_projects_columns() {
        let (svc, mut session) = seeded(3).await;
        let rows = svc
            .get_by_ids(&mut session, &[json!("u0"), json!("u2")], Some(&["id"][..]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.as_object().map(|m| m.len()) == Some(1)));
    }

    #[tokio::test]
    async fn save_returns_generated_columns() {
        let (svc, mut session) = seeded(0).await;
        let err = svc.save(&mut session, obj(json!({"username": "new"}))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let saved = svc
            .save(&mut session, obj(json!({"username": "new", "password": "pw"})))
            .await
            .unwrap();
        assert_eq!(saved["is_deleted"], json!(0));
        assert_eq!(saved["id"].as_str().map(str::len), Some(32));
        assert!(svc.get_by_id(&mut session, &saved["id"]).await.unwrap().is_some());
    }
}
