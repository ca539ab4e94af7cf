pub mod context;
pub mod health;
pub mod search;
pub mod suggest;
pub mod tools;

pub use context::context_handler;
pub use health::{health_handler, ready_handler};
pub use search::search_handler;
pub use suggest::{categories_handler, suggest_handler};
pub use tools::list_tools_handler;
