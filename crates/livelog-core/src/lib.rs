pub mod backend;
pub mod config;
pub mod error;
pub mod live;
pub mod period;
pub mod segment;
pub mod site_scope;
pub mod time_range;
pub mod value;
pub mod visitor;

pub use error::LiveError;
pub use live::LiveModel;
