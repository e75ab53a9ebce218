//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL profile store using Diesel
//! - **cache**: Redis profile cache using `bb8-redis`
//! - **events**: in-process user event source and profile event sinks
//! - **memory**: in-process store and cache for local runs and tests
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod cache;
pub mod events;
pub mod memory;
pub mod persistence;
