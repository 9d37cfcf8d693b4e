use crate::sql::Statement;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Selection,
    Deletion,
    Other,
}

pub fn classify(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Select(_) => StatementKind::Selection,
        Statement::Delete(_) => StatementKind::Deletion,
        Statement::Insert(_) | Statement::Update(_) | Statement::Raw { .. } => StatementKind::Other,
    }
}
