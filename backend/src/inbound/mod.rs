//! Inbound adapters that translate external requests into domain service
//! calls while keeping framework details at the edge.
//!
//! The RPC surface lives under [`http`]. Upstream user events enter through
//! the [`crate::domain::UserEventConsumer`] instead.

pub mod http;
