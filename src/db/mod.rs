//! Database layer
//!
//! Supports:
//! - SQLite (default, single-file deployment and tests)
//! - MySQL (production)
//!
//! The driver is selected from `database.driver` in the configuration. All
//! code above this layer talks to a `DynDatabasePool` and to repository
//! traits, never to a concrete sqlx pool.
//!
//! # Usage
//!
//! ```ignore
//! use kitchentech::config::DatabaseConfig;
//! use kitchentech::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
