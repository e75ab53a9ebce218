//! HTTP server configuration object.

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::web;

use profile_service::inbound::http::state::HttpState;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) http_state: web::Data<HttpState>,
    pub(crate) shutdown_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Construct a server configuration around prepared handler state.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, http_state: HttpState) -> Self {
        Self {
            bind_addr,
            http_state: web::Data::new(http_state),
            shutdown_timeout: None,
        }
    }

    /// Bound the graceful shutdown window for in-flight requests.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
