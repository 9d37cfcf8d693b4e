//! Not-yet-executed statements. Built by the service, rewritten by `intercept`, run by an executor.

use crate::sql::predicate::{Expr, Predicate};
use crate::sql::table::{TableDef, TableRef};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    /// `*`
    Star,
    Expr { expr: Expr, alias: Option<String> },
    /// `count(*)`
    Count { alias: String },
}

impl SelectItem {
    pub fn column(name: &str) -> Self {
        SelectItem::Expr {
            expr: Expr::column(name),
            alias: None,
        }
    }

    /// Key the item's value is returned under.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            SelectItem::Star => None,
            SelectItem::Expr { alias: Some(a), .. } => Some(a),
            SelectItem::Expr { expr: Expr::Column { name, .. }, .. } => Some(name),
            SelectItem::Expr { .. } => None,
            SelectItem::Count { alias } => Some(alias),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FromItem {
    Table(TableRef),
    SubSelect { select: Box<Select>, alias: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub columns: Vec<SelectItem>,
    pub from: Vec<FromItem>,
    pub predicate: Option<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    /// `SELECT * FROM <table>`
    pub fn from_table(table: Arc<TableDef>) -> Self {
        Select {
            columns: vec![SelectItem::Star],
            from: vec![FromItem::Table(TableRef::new(table))],
            predicate: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// `SELECT count(*) AS <alias> FROM (<inner>) AS <sub_alias>`, the shape pagination uses for totals.
    pub fn count_of(inner: Select, sub_alias: &str, alias: &str) -> Self {
        Select {
            columns: vec![SelectItem::Count {
                alias: alias.to_string(),
            }],
            from: vec![FromItem::SubSelect {
                select: Box::new(inner),
                alias: sub_alias.to_string(),
            }],
            predicate: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn columns(mut self, columns: Vec<SelectItem>) -> Self {
        self.columns = columns;
        self
    }

    /// ANDs `p` onto the current filter.
    pub fn filter(mut self, p: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => Predicate::and(existing, p),
            None => p,
        });
        self
    }

    pub fn order_by(mut self, expr: Expr, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy { expr, direction });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Insert {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub returning: Vec<SelectItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    pub table: TableRef,
    pub assignments: Vec<(String, Value)>,
    pub predicate: Option<Predicate>,
    pub returning: Vec<SelectItem>,
}

impl Update {
    pub fn new(table: Arc<TableDef>) -> Self {
        Update {
            table: TableRef::new(table),
            assignments: Vec::new(),
            predicate: None,
            returning: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: Value) -> Self {
        self.assignments.push((column.to_string(), value));
        self
    }

    pub fn filter(mut self, p: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => Predicate::and(existing, p),
            None => p,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delete {
    pub table: TableRef,
    pub predicate: Option<Predicate>,
    pub returning: Vec<SelectItem>,
}

impl Delete {
    pub fn new(table: Arc<TableDef>) -> Self {
        Delete {
            table: TableRef::new(table),
            predicate: None,
            returning: Vec::new(),
        }
    }

    pub fn filter(mut self, p: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => Predicate::and(existing, p),
            None => p,
        });
        self
    }

    pub fn returning(mut self, items: Vec<SelectItem>) -> Self {
        self.returning = items;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    /// Hand-written SQL with positional `$n` parameters. Never rewritten.
    Raw { sql: String, params: Vec<Value> },
}

impl Statement {
    /// Whether executing the statement yields rows rather than just a count.
    pub fn returns_rows(&self) -> bool {
        match self {
            Statement::Select(_) | Statement::Raw { .. } => true,
            Statement::Insert(i) => !i.returning.is_empty(),
            Statement::Update(u) => !u.returning.is_empty(),
            Statement::Delete(d) => !d.returning.is_empty(),
        }
    }
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Statement::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(s: Insert) -> Self {
        Statement::Insert(s)
    }
}

impl From<Update> for Statement {
    fn from(s: Update) -> Self {
        Statement::Update(s)
    }
}

impl From<Delete> for Statement {
    fn from(s: Delete) -> Self {
        Statement::Delete(s)
    }
}
