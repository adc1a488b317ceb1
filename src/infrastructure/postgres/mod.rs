//! PostgreSQL connection pool for the transactional drafts backend.

pub mod pool;

pub use pool::{create_pool, ping, PostgresPoolError};
