//! In-process adapters for local runs and tests.
//!
//! These honour the same contracts as the PostgreSQL and Redis adapters so
//! the orchestrator behaves identically against either backend.

mod profile_cache;
mod profile_repository;

pub use profile_cache::InMemoryProfileCache;
pub use profile_repository::InMemoryProfileRepository;
