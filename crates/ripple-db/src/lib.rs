//! Ripple Database: SurrealDB connection management, schema migrations
//! and repository implementations of the `ripple-core` traits.
//!
//! Multi-statement writes (invite and magic-link consumption, referred
//! signups) run inside a single SurrealQL transaction so a concurrent
//! duplicate never observes a half-applied state.

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1, schema_version};
