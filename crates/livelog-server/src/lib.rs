pub mod app;
pub mod error;
pub mod routes;
pub mod state;
