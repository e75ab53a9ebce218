//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Repository implementations only translate between Diesel rows and domain
//! types. Row structs (`models.rs`) and table definitions (`schema.rs`) stay
//! private to this module, and every database failure is mapped to the
//! domain's repository error type.
//!
//! # Example
//!
//! ```no_run
//! use profile_service::domain::ports::DeletionMode;
//! use profile_service::outbound::persistence::{DbPool, DieselProfileRepository, PoolConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/profiles")).await?;
//! let repo = DieselProfileRepository::new(pool, DeletionMode::Soft);
//! # let _ = repo;
//! # Ok(())
//! # }
//! ```

mod diesel_profile_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_profile_repository::{
    DieselProfileRepository, NICKNAME_CONSTRAINT, USER_ID_CONSTRAINT,
};
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
