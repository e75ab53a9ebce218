//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on domain ports and remain testable without I/O.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;

use crate::domain::ports::{ProfileCommand, ProfileQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub command: Arc<dyn ProfileCommand>,
    pub query: Arc<dyn ProfileQuery>,
    pub clock: Arc<dyn Clock>,
    /// Applied when a request carries no `grpc-timeout` header.
    pub default_timeout: Duration,
}

impl HttpState {
    /// Construct state from explicit port implementations.
    pub fn new(
        command: Arc<dyn ProfileCommand>,
        query: Arc<dyn ProfileQuery>,
        clock: Arc<dyn Clock>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            command,
            query,
            clock,
            default_timeout,
        }
    }
}
