//! Profile lifecycle service library.
//!
//! Hexagonal layout: [`domain`] holds the model, ports and orchestrator;
//! [`inbound`] and [`outbound`] adapt it to HTTP, storage, cache and events.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
