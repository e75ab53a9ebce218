//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the profile RPC methods, the health probes and the
//! shared error schema. Swagger UI serves it in debug builds.

use utoipa::OpenApi;

use crate::domain::{Error, ErrorCode};
use crate::inbound::http::rpc::{
    DeleteUserResponse, InitUserRequest, InitUserResponse, ProfileResponse, UpdateEmailRequest,
    UpdateEmailResponse, UserIdRequest,
};

/// OpenAPI document for the profile RPC surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Profile service API",
        description = "JSON RPC surface for user profile lifecycle and health probes."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::rpc::init_user,
        crate::inbound::http::rpc::update_email,
        crate::inbound::http::rpc::delete_user,
        crate::inbound::http::rpc::get_profile,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        InitUserRequest,
        InitUserResponse,
        UpdateEmailRequest,
        UpdateEmailResponse,
        UserIdRequest,
        DeleteUserResponse,
        ProfileResponse
    )),
    tags(
        (name = "profiles", description = "Profile lifecycle operations"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
