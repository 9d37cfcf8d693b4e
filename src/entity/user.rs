use crate::sql::{ColumnInfo, ColumnType, TableDef};
use std::sync::{Arc, OnceLock};

static USER: OnceLock<Arc<TableDef>> = OnceLock::new();

/// The `user` table: base columns plus `username` and `password`.
pub fn user_table() -> Arc<TableDef> {
    USER.get_or_init(|| {
        TableDef::with_base_columns(
            "user",
            vec![
                ColumnInfo::new("username", ColumnType::Text { max_length: None }),
                ColumnInfo::new("password", ColumnType::Text { max_length: None }),
            ],
        )
    })
    .clone()
}
