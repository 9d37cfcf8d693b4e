//! Turns physical deletes into logical ones.

use crate::sql::{Delete, IsDelete, Statement, Update, LOGICAL_DELETE_FIELD};

/// Replace a delete on a marker-carrying table by `UPDATE ... SET is_deleted = 1` with the same
/// filter and returning list. With `skip_soft_delete`, or when the table has no marker, the
/// delete is returned unchanged.
pub fn transform_for_delete(delete: Delete, skip_soft_delete: bool) -> Statement {
    if skip_soft_delete || !delete.table.table.has_marker() {
        return Statement::Delete(delete);
    }
    tracing::debug!(table = %delete.table.table.name, "delete rewritten to soft delete");
    let Delete {
        table,
        predicate,
        returning,
    } = delete;
    Statement::Update(Update {
        table,
        assignments: vec![(LOGICAL_DELETE_FIELD.to_string(), IsDelete::Delete.value())],
        predicate,
        returning,
    })
}
