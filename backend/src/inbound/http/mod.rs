//! HTTP inbound adapter exposing the profile RPC surface.

pub mod deadline;
pub mod error;
pub mod health;
pub mod rpc;
pub mod state;

pub use error::ApiResult;
