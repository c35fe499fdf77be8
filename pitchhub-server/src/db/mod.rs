//! Database layer - connection pool, migrations and repositories
//!
//! - Connection pool, no Arc<Mutex<Connection>>
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for every multi-row write (counters, notifications)

pub mod pool;
pub mod migrations;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options, lazy_pool, DEFAULT_MAX_CONNECTIONS};
pub use repos::*;
