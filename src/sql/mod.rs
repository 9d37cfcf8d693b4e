//! Statement model and safe SQL rendering: identifiers from table definitions, values as parameters.

mod builder;
pub mod params;
mod predicate;
mod stmt;
mod table;

pub use builder::*;
pub use params::*;
pub use predicate::*;
pub use stmt::*;
pub use table::*;
