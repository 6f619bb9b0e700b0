pub mod backend;
pub mod executor;
pub mod schema;
pub mod site;

pub use backend::{DuckDbBackend, NewAction, NewConversion, NewVisit};
