//! CrudService: generic CRUD over one table, executed through a session.

mod crud;
mod validation;
pub use crud::{CrudService, DEFAULT_BATCH_SIZE};
pub use validation::{QueryValidator, MAX_PAGE_SIZE};
