//! `SQLite` persistence layer: connection pool, migrations, row types, and
//! per-table repositories.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
pub use migrations::{current_version, ensure_fts_table, latest_version, run_migrations};
