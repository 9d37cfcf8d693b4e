//! Scalar expressions and boolean predicates used in WHERE clauses.

use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `"qualifier"."name"`, or just `"name"` when unqualified.
    Column { qualifier: Option<String>, name: String },
    /// A bound parameter.
    Value(Value),
}

impl Expr {
    pub fn column(name: &str) -> Self {
        Expr::Column {
            qualifier: None,
            name: name.to_string(),
        }
    }

    pub fn qualified(qualifier: &str, name: &str) -> Self {
        Expr::Column {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
        }
    }

    pub fn value(v: impl Into<Value>) -> Self {
        Expr::Value(v.into())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    True,
    False,
    Eq(Expr, Expr),
    Neq(Expr, Expr),
    Lt(Expr, Expr),
    Lte(Expr, Expr),
    Gt(Expr, Expr),
    Gte(Expr, Expr),
    In(Expr, Vec<Expr>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Predicate::Eq(lhs, rhs)
    }

    /// `lhs AND rhs`, kept as written (no simplification) so callers can rely on the shape.
    pub fn and(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn not(p: Predicate) -> Self {
        Predicate::Not(Box::new(p))
    }

    /// AND of all predicates, `None` for an empty input.
    pub fn conjunction(preds: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        preds.into_iter().reduce(Predicate::and)
    }

    /// Whether any column operand matches `f`.
    pub fn references(&self, f: &impl Fn(Option<&str>, &str) -> bool) -> bool {
        let expr_matches = |e: &Expr| match e {
            Expr::Column { qualifier, name } => f(qualifier.as_deref(), name),
            Expr::Value(_) => false,
        };
        match self {
            Predicate::True | Predicate::False => false,
            Predicate::Eq(l, r)
            | Predicate::Neq(l, r)
            | Predicate::Lt(l, r)
            | Predicate::Lte(l, r)
            | Predicate::Gt(l, r)
            | Predicate::Gte(l, r) => expr_matches(l) || expr_matches(r),
            Predicate::In(l, items) => expr_matches(l) || items.iter().any(expr_matches),
            Predicate::And(l, r) | Predicate::Or(l, r) => l.references(f) || r.references(f),
            Predicate::Not(p) => p.references(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjunction_folds_left() {
        let a = Predicate::eq(Expr::column("a"), Expr::value(1));
        let b = Predicate::eq(Expr::column("b"), Expr::value(2));
        let c = Predicate::eq(Expr::column("c"), Expr::value(3));
        let all = Predicate::conjunction(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(all, Predicate::and(Predicate::and(a, b), c));
        assert_eq!(Predicate::conjunction(Vec::new()), None);
    }

    #[test]
    fn references_sees_nested_columns() {
        let p = Predicate::not(Predicate::or(
            Predicate::True,
            Predicate::In(Expr::qualified("u", "id"), vec![Expr::value("x")]),
        ));
        assert!(p.references(&|q, n| q == Some("u") && n == "id"));
        assert!(!p.references(&|_, n| n == "is_deleted"));
    }
}
