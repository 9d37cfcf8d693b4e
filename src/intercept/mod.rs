//! Soft-delete interception: every statement passes through [`intercept`] before it is executed.
//! Reads only see live rows; deletes on marker-carrying tables become marker updates.

mod classify;
mod inject;
mod rewrite;

pub use classify::{classify, StatementKind};
pub use inject::transform_for_read;
pub use rewrite::transform_for_delete;

use crate::sql::Statement;

/// Per-call options carried next to a statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Execute deletes physically instead of flipping the marker.
    pub skip_soft_delete: bool,
}

impl ExecutionOptions {
    pub fn hard_delete() -> Self {
        ExecutionOptions { skip_soft_delete: true }
    }
}

/// Rewrite a statement according to its kind. Never fails and never executes anything.
pub fn intercept(stmt: Statement, opts: &ExecutionOptions) -> Statement {
    match (classify(&stmt), stmt) {
        (StatementKind::Selection, Statement::Select(s)) => Statement::Select(transform_for_read(s)),
        (StatementKind::Deletion, Statement::Delete(d)) => transform_for_delete(d, opts.skip_soft_delete),
        (_, other) => other,
    }
}
