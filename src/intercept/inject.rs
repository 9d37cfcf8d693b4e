//! Adds the not-deleted predicate to reads.

use crate::sql::{Expr, FromItem, IsDelete, Predicate, Select, TableRef, LOGICAL_DELETE_FIELD};

/// Conjoin `<source>.is_deleted = 0` onto the filter for every marker-carrying table the
/// select reads from directly.
///
/// A select whose only source is a sub-selection (the pagination count wrapper) is left as is
/// and the rewrite happens inside the sub-selection instead, so the wrapper never gains a
/// reference to an alias it cannot see. Sub-selections mixed with other sources are not visited.
///
/// Tables whose marker column the filter already mentions are skipped. That keeps the rewrite
/// idempotent and lets callers ask for deleted rows explicitly.
pub fn transform_for_read(mut select: Select) -> Select {
    if let [FromItem::SubSelect { .. }] = select.from.as_slice() {
        if let Some(FromItem::SubSelect { select: inner, alias }) = select.from.pop() {
            select.from.push(FromItem::SubSelect {
                select: Box::new(transform_for_read(*inner)),
                alias,
            });
        }
        return select;
    }

    let existing = select.predicate.as_ref();
    let per_table = select.from.iter().filter_map(|item| match item {
        FromItem::Table(t) if t.table.has_marker() && !filters_marker(existing, t) => Some(not_deleted(t)),
        _ => None,
    });
    let Some(added) = Predicate::conjunction(per_table.collect::<Vec<_>>()) else {
        return select;
    };
    select.predicate = Some(match select.predicate.take() {
        Some(p) => Predicate::and(p, added),
        None => added,
    });
    select
}

fn not_deleted(t: &TableRef) -> Predicate {
    Predicate::eq(
        Expr::qualified(t.qualifier(), LOGICAL_DELETE_FIELD),
        Expr::Value(IsDelete::NoDelete.value()),
    )
}

fn filters_marker(existing: Option<&Predicate>, t: &TableRef) -> bool {
    let qualifier = t.qualifier();
    existing.is_some_and(|p| {
        p.references(&|q, name| name == LOGICAL_DELETE_FIELD && q.map_or(true, |q| q == qualifier))
    })
}
