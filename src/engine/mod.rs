//! Engine module: persistence, runtime wiring and the CLI front end

pub mod arg_parser;
pub mod db_ops;
pub mod handlers;
pub mod runtime;

// Re-export commonly used items
pub use arg_parser::{Cli, Commands, EnqueueKind};
pub use db_ops::{ChurnRow, OwnershipRow, PooledConn, RepositoryCounts, Store};
pub use handlers::handle_run;
pub use runtime::Runtime;
