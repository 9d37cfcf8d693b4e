//! Renders statements into parameterized PostgreSQL. Identifiers come from table definitions,
//! values are always bound as `$n` parameters.

use crate::sql::predicate::{Expr, Predicate};
use crate::sql::stmt::{Delete, FromItem, Insert, Select, SelectItem, SortDirection, Statement, Update};
use crate::sql::table::TableRef;
use serde_json::Value;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }
}

/// Build SQL and parameters for any statement.
pub fn render(stmt: &Statement) -> QueryBuf {
    let mut q = QueryBuf::new();
    match stmt {
        Statement::Select(s) => select(&mut q, s),
        Statement::Insert(i) => insert(&mut q, i),
        Statement::Update(u) => update(&mut q, u),
        Statement::Delete(d) => delete(&mut q, d),
        Statement::Raw { sql, params } => {
            q.sql = sql.clone();
            q.params = params.clone();
        }
    }
    q
}

fn table_ref(q: &mut QueryBuf, t: &TableRef) {
    q.push_str(&quoted(&t.table.name));
    if let Some(alias) = &t.alias {
        if alias != &t.table.name {
            q.push_str(" AS ");
            q.push_str(&quoted(alias));
        }
    }
}

fn expr(q: &mut QueryBuf, e: &Expr) {
    match e {
        Expr::Column { qualifier: Some(t), name } => {
            let s = format!("{}.{}", quoted(t), quoted(name));
            q.push_str(&s);
        }
        Expr::Column { qualifier: None, name } => q.push_str(&quoted(name)),
        Expr::Value(v) => {
            let n = q.push_param(v.clone());
            q.push_str(&format!("${}", n));
        }
    }
}

fn binary(q: &mut QueryBuf, l: &Expr, op: &str, r: &Expr) {
    expr(q, l);
    q.push_str(op);
    expr(q, r);
}

fn predicate(q: &mut QueryBuf, p: &Predicate) {
    match p {
        Predicate::True => q.push_str("TRUE"),
        Predicate::False => q.push_str("FALSE"),
        Predicate::Eq(l, Expr::Value(Value::Null)) => {
            expr(q, l);
            q.push_str(" IS NULL");
        }
        Predicate::Neq(l, Expr::Value(Value::Null)) => {
            expr(q, l);
            q.push_str(" IS NOT NULL");
        }
        Predicate::Eq(l, r) => binary(q, l, " = ", r),
        Predicate::Neq(l, r) => binary(q, l, " <> ", r),
        Predicate::Lt(l, r) => binary(q, l, " < ", r),
        Predicate::Lte(l, r) => binary(q, l, " <= ", r),
        Predicate::Gt(l, r) => binary(q, l, " > ", r),
        Predicate::Gte(l, r) => binary(q, l, " >= ", r),
        Predicate::In(_, items) if items.is_empty() => q.push_str("FALSE"),
        Predicate::In(l, items) => {
            expr(q, l);
            q.push_str(" IN (");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    q.push_str(", ");
                }
                expr(q, item);
            }
            q.push_str(")");
        }
        Predicate::And(l, r) => {
            nested(q, l);
            q.push_str(" AND ");
            nested(q, r);
        }
        Predicate::Or(l, r) => {
            nested(q, l);
            q.push_str(" OR ");
            nested(q, r);
        }
        Predicate::Not(inner) => {
            q.push_str("NOT ");
            nested(q, inner);
        }
    }
}

/// Parenthesize compound operands so precedence never depends on the surrounding operator.
fn nested(q: &mut QueryBuf, p: &Predicate) {
    if matches!(p, Predicate::And(..) | Predicate::Or(..)) {
        q.push_str("(");
        predicate(q, p);
        q.push_str(")");
    } else {
        predicate(q, p);
    }
}

fn where_clause(q: &mut QueryBuf, p: &Option<Predicate>) {
    if let Some(p) = p {
        q.push_str(" WHERE ");
        predicate(q, p);
    }
}

fn select_items(q: &mut QueryBuf, items: &[SelectItem]) {
    if items.is_empty() {
        q.push_str("*");
        return;
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            q.push_str(", ");
        }
        match item {
            SelectItem::Star => q.push_str("*"),
            SelectItem::Expr { expr: e, alias } => {
                expr(q, e);
                if let Some(a) = alias {
                    q.push_str(" AS ");
                    q.push_str(&quoted(a));
                }
            }
            SelectItem::Count { alias } => {
                q.push_str("count(*) AS ");
                q.push_str(&quoted(alias));
            }
        }
    }
}

fn returning(q: &mut QueryBuf, items: &[SelectItem]) {
    if !items.is_empty() {
        q.push_str(" RETURNING ");
        select_items(q, items);
    }
}

fn select(q: &mut QueryBuf, s: &Select) {
    q.push_str("SELECT ");
    select_items(q, &s.columns);
    if !s.from.is_empty() {
        q.push_str(" FROM ");
        for (i, item) in s.from.iter().enumerate() {
            if i > 0 {
                q.push_str(", ");
            }
            match item {
                FromItem::Table(t) => table_ref(q, t),
                FromItem::SubSelect { select: inner, alias } => {
                    q.push_str("(");
                    select(q, inner);
                    q.push_str(") AS ");
                    q.push_str(&quoted(alias));
                }
            }
        }
    }
    where_clause(q, &s.predicate);
    if !s.order_by.is_empty() {
        q.push_str(" ORDER BY ");
        for (i, o) in s.order_by.iter().enumerate() {
            if i > 0 {
                q.push_str(", ");
            }
            expr(q, &o.expr);
            q.push_str(match o.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }
    }
    if let Some(n) = s.limit {
        q.push_str(&format!(" LIMIT {}", n));
    }
    if let Some(n) = s.offset {
        q.push_str(&format!(" OFFSET {}", n));
    }
}

fn insert(q: &mut QueryBuf, i: &Insert) {
    q.push_str("INSERT INTO ");
    table_ref(q, &i.table);
    let cols: Vec<String> = i.columns.iter().map(|c| quoted(c)).collect();
    q.push_str(&format!(" ({}) VALUES ", cols.join(", ")));
    for (r, row) in i.rows.iter().enumerate() {
        if r > 0 {
            q.push_str(", ");
        }
        let placeholders: Vec<String> = row
            .iter()
            .map(|v| format!("${}", q.push_param(v.clone())))
            .collect();
        q.push_str(&format!("({})", placeholders.join(", ")));
    }
    returning(q, &i.returning);
}

fn update(q: &mut QueryBuf, u: &Update) {
    q.push_str("UPDATE ");
    table_ref(q, &u.table);
    q.push_str(" SET ");
    let sets: Vec<String> = u
        .assignments
        .iter()
        .map(|(col, v)| format!("{} = ${}", quoted(col), q.push_param(v.clone())))
        .collect();
    q.push_str(&sets.join(", "));
    where_clause(q, &u.predicate);
    returning(q, &u.returning);
}

fn delete(q: &mut QueryBuf, d: &Delete) {
    q.push_str("DELETE FROM ");
    table_ref(q, &d.table);
    where_clause(q, &d.predicate);
    returning(q, &d.returning);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::table::{ColumnInfo, ColumnType, TableDef};
    use serde_json::json;

    fn user() -> std::sync::Arc<TableDef> {
        TableDef::with_base_columns("user", vec![ColumnInfo::new("username", ColumnType::Text { max_length: None })])
    }

    #[test]
    fn select_with_filter_order_and_page() {
        let s = Select::from_table(user())
            .filter(Predicate::eq(Expr::column("username"), Expr::value("u1")))
            .order_by(Expr::column("created_time"), SortDirection::Desc)
            .limit(12)
            .offset(24);
        let q = render(&s.into());
        assert_eq!(
            q.sql,
            r#"SELECT * FROM "user" WHERE "username" = $1 ORDER BY "created_time" DESC LIMIT 12 OFFSET 24"#
        );
        assert_eq!(q.params, vec![json!("u1")]);
    }

    #[test]
    fn count_wrapper_renders_subselect() {
        let inner = Select::from_table(user()).filter(Predicate::eq(Expr::column("username"), Expr::value("a")));
        let q = render(&Select::count_of(inner, "page_count", "total").into());
        assert_eq!(
            q.sql,
            r#"SELECT count(*) AS "total" FROM (SELECT * FROM "user" WHERE "username" = $1) AS "page_count""#
        );
    }

    #[test]
    fn compound_predicates_are_parenthesized() {
        let p = Predicate::and(
            Predicate::or(
                Predicate::eq(Expr::column("a"), Expr::value(1)),
                Predicate::eq(Expr::column("b"), Expr::Value(Value::Null)),
            ),
            Predicate::In(Expr::qualified("user", "id"), vec![Expr::value("x"), Expr::value("y")]),
        );
        let q = render(&Select::from_table(user()).filter(p).into());
        assert_eq!(
            q.sql,
            r#"SELECT * FROM "user" WHERE ("a" = $1 OR "b" IS NULL) AND "user"."id" IN ($2, $3)"#
        );
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn update_and_delete_with_returning() {
        let u = Update::new(user())
            .set("is_deleted", json!(1))
            .filter(Predicate::eq(Expr::column("id"), Expr::value("u1")));
        let mut u = u;
        u.returning = vec![SelectItem::column("id")];
        assert_eq!(
            render(&u.into()).sql,
            r#"UPDATE "user" SET "is_deleted" = $1 WHERE "id" = $2 RETURNING "id""#
        );

        let d = Delete::new(user()).filter(Predicate::eq(Expr::column("id"), Expr::value("u1")));
        assert_eq!(render(&d.into()).sql, r#"DELETE FROM "user" WHERE "id" = $1"#);
    }

    #[test]
    fn multi_row_insert_numbers_params_in_order() {
        let i = Insert {
            table: TableRef::new(user()),
            columns: vec!["id".into(), "username".into()],
            rows: vec![vec![json!("a"), json!("x")], vec![json!("b"), json!("y")]],
            returning: vec![],
        };
        let q = render(&i.into());
        assert_eq!(q.sql, r#"INSERT INTO "user" ("id", "username") VALUES ($1, $2), ($3, $4)"#);
        assert_eq!(q.params, vec![json!("a"), json!("x"), json!("b"), json!("y")]);
    }

    #[test]
    fn empty_in_list_is_false() {
        let p = Predicate::In(Expr::column("id"), vec![]);
        let q = render(&Select::from_table(user()).filter(p).into());
        assert_eq!(q.sql, r#"SELECT * FROM "user" WHERE FALSE"#);
    }
}
