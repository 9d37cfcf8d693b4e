//! CRUD backend template: axum routes over a session layer that hides logically deleted rows
//! and turns deletes into marker updates.

pub mod config;
pub mod dto;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod intercept;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod sql;
pub mod state;

pub use config::Settings;
pub use entity::{user_table, Record};
pub use error::{AppError, ConfigError};
pub use intercept::{classify, intercept, transform_for_delete, transform_for_read, ExecutionOptions, StatementKind};
pub use migration::create_tables;
pub use response::{success, ApiResponse};
pub use routes::{api_router, common_routes, user_routes};
pub use service::CrudService;
pub use session::{with_session, MemoryDatabase, PgSessionSource, Session, SessionSource};
pub use state::AppState;
