//! Profile RPC handlers.
//!
//! Every method is a JSON `POST` under `/profile.v1.ProfileService/`:
//!
//! ```text
//! POST /profile.v1.ProfileService/InitUser {"userId":"...","email":"ada@example.com"}
//! POST /profile.v1.ProfileService/UpdateEmail {"userId":"...","newEmail":"ada@example.org"}
//! POST /profile.v1.ProfileService/DeleteUser {"userId":"..."}
//! POST /profile.v1.ProfileService/GetProfile {"userId":"..."}
//! ```

use actix_web::{HttpRequest, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{
    Email, Error, Profile, ProfilePatch, ProfileValidationError, RequestContext, TraceId, UserId,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::deadline::request_timeout;
use crate::inbound::http::state::HttpState;

/// Path prefix shared by every RPC method.
pub const SERVICE_PATH: &str = "/profile.v1.ProfileService";

/// Request body for `InitUser`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitUserRequest {
    /// Upstream user id (UUID).
    pub user_id: String,
    /// Optional contact address. An empty string means no email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Response body for `InitUser`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitUserResponse {
    /// Echo of the requested user id.
    pub user_id: String,
    /// Generated nickname.
    pub nickname: String,
    /// Profile creation time.
    pub initialized_at: DateTime<Utc>,
}

/// Request body for `UpdateEmail`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailRequest {
    /// Target user id.
    pub user_id: String,
    /// Replacement address; must be a valid email.
    pub new_email: String,
}

/// Response body for `UpdateEmail`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailResponse {
    /// Echo of the requested user id.
    pub user_id: String,
    /// Stored address.
    pub updated_email: String,
    /// Modification time.
    pub updated_at: DateTime<Utc>,
}

/// Request body for `DeleteUser` and `GetProfile`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    /// Target user id.
    pub user_id: String,
}

/// Response body for `DeleteUser`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    /// Echo of the requested user id.
    pub user_id: String,
    /// Time the deletion was recorded.
    pub deleted_at: DateTime<Utc>,
}

/// Profile payload returned by `GetProfile`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    /// Upstream user id.
    pub user_id: String,
    /// Public nickname.
    pub nickname: String,
    /// Contact address, if any.
    pub email: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl From<&Profile> for ProfileResponse {
    fn from(profile: &Profile) -> Self {
        Self {
            user_id: profile.user_id().to_string(),
            nickname: profile.nickname().to_string(),
            email: profile.email().map(ToString::to_string),
            created_at: profile.created_at(),
            updated_at: profile.updated_at(),
        }
    }
}

/// Register the RPC routes, including a JSON extractor that reports
/// malformed bodies with the shared error schema.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default().error_handler(|err, _req| {
        Error::invalid_request("request body is not valid JSON for this method")
            .with_details(json!({ "reason": err.to_string() }))
            .into()
    });
    cfg.service(
        web::scope(SERVICE_PATH)
            .app_data(json)
            .service(init_user)
            .service(update_email)
            .service(delete_user)
            .service(get_profile),
    );
}

fn request_context(req: &HttpRequest, state: &HttpState) -> Result<RequestContext, Error> {
    let timeout = request_timeout(req, state.default_timeout)?;
    let trace_id = TraceId::current().unwrap_or_else(TraceId::generate);
    Ok(RequestContext::new(trace_id).with_timeout(state.clock.utc(), timeout))
}

fn validation_code(err: &ProfileValidationError) -> &'static str {
    match err {
        ProfileValidationError::EmptyUserId => "empty_user_id",
        ProfileValidationError::InvalidUserId => "invalid_user_id",
        ProfileValidationError::EmptyEmail => "empty_email",
        ProfileValidationError::EmailTooLong { .. } => "email_too_long",
        ProfileValidationError::InvalidEmail => "invalid_email",
        ProfileValidationError::EmptyNickname => "empty_nickname",
        ProfileValidationError::NicknameTooLong { .. } => "nickname_too_long",
        ProfileValidationError::NicknameInvalidCharacters => "invalid_nickname",
    }
}

fn field_error(field: &str, err: &ProfileValidationError) -> Error {
    Error::invalid_request(err.to_string())
        .with_details(json!({ "field": field, "code": validation_code(err) }))
}

fn parse_user_id(raw: &str) -> Result<UserId, Error> {
    UserId::new(raw).map_err(|err| field_error("userId", &err))
}

fn parse_email(field: &str, raw: String) -> Result<Email, Error> {
    Email::new(raw).map_err(|err| field_error(field, &err))
}

fn parse_optional_email(raw: Option<String>) -> Result<Option<Email>, Error> {
    match raw {
        Some(value) if !value.trim().is_empty() => parse_email("email", value).map(Some),
        _ => Ok(None),
    }
}

/// Create the profile for a freshly registered user.
#[utoipa::path(
    post,
    path = "/profile.v1.ProfileService/InitUser",
    request_body = InitUserRequest,
    params(("grpc-timeout" = Option<String>, Header, description = "Call deadline, e.g. `250m`")),
    responses(
        (status = 200, description = "Profile created", body = InitUserResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 409, description = "Profile already exists", body = Error),
        (status = 429, description = "Nickname attempts exhausted", body = Error),
        (status = 504, description = "Deadline exceeded", body = Error),
        (status = 503, description = "Storage unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["profiles"],
    operation_id = "initUser"
)]
#[post("/InitUser")]
pub async fn init_user(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<InitUserRequest>,
) -> ApiResult<web::Json<InitUserResponse>> {
    let ctx = request_context(&req, &state)?;
    let InitUserRequest { user_id, email } = payload.into_inner();
    let user_id = parse_user_id(&user_id)?;
    let email = parse_optional_email(email)?;

    let profile = state.command.create_profile(ctx, user_id, email).await?;
    Ok(web::Json(InitUserResponse {
        user_id: profile.user_id().to_string(),
        nickname: profile.nickname().to_string(),
        initialized_at: profile.created_at(),
    }))
}

/// Replace the email of an existing profile.
#[utoipa::path(
    post,
    path = "/profile.v1.ProfileService/UpdateEmail",
    request_body = UpdateEmailRequest,
    params(("grpc-timeout" = Option<String>, Header, description = "Call deadline, e.g. `250m`")),
    responses(
        (status = 200, description = "Email updated", body = UpdateEmailResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Profile not found", body = Error),
        (status = 504, description = "Deadline exceeded", body = Error),
        (status = 503, description = "Storage unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["profiles"],
    operation_id = "updateEmail"
)]
#[post("/UpdateEmail")]
pub async fn update_email(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<UpdateEmailRequest>,
) -> ApiResult<web::Json<UpdateEmailResponse>> {
    let ctx = request_context(&req, &state)?;
    let UpdateEmailRequest { user_id, new_email } = payload.into_inner();
    let user_id = parse_user_id(&user_id)?;
    let email = parse_email("newEmail", new_email)?;

    let profile = state
        .command
        .update_profile(ctx, user_id, ProfilePatch::set_email(email))
        .await?;
    let updated_email = profile.email().map(ToString::to_string).unwrap_or_default();
    Ok(web::Json(UpdateEmailResponse {
        user_id: profile.user_id().to_string(),
        updated_email,
        updated_at: profile.updated_at(),
    }))
}

/// Delete the profile of a removed user.
#[utoipa::path(
    post,
    path = "/profile.v1.ProfileService/DeleteUser",
    request_body = UserIdRequest,
    params(("grpc-timeout" = Option<String>, Header, description = "Call deadline, e.g. `250m`")),
    responses(
        (status = 200, description = "Profile deleted", body = DeleteUserResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Profile not found", body = Error),
        (status = 504, description = "Deadline exceeded", body = Error),
        (status = 503, description = "Storage unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["profiles"],
    operation_id = "deleteUser"
)]
#[post("/DeleteUser")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<UserIdRequest>,
) -> ApiResult<web::Json<DeleteUserResponse>> {
    let ctx = request_context(&req, &state)?;
    let user_id = parse_user_id(&payload.user_id)?;

    let deleted_at = state.command.delete_profile(ctx, user_id).await?;
    Ok(web::Json(DeleteUserResponse {
        user_id: user_id.to_string(),
        deleted_at,
    }))
}

/// Fetch a live profile.
#[utoipa::path(
    post,
    path = "/profile.v1.ProfileService/GetProfile",
    request_body = UserIdRequest,
    params(("grpc-timeout" = Option<String>, Header, description = "Call deadline, e.g. `250m`")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Profile not found", body = Error),
        (status = 504, description = "Deadline exceeded", body = Error),
        (status = 503, description = "Storage unavailable", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["profiles"],
    operation_id = "getProfile"
)]
#[post("/GetProfile")]
pub async fn get_profile(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<UserIdRequest>,
) -> ApiResult<web::Json<ProfileResponse>> {
    let ctx = request_context(&req, &state)?;
    let user_id = parse_user_id(&payload.user_id)?;

    let profile = state.query.get_profile(ctx, user_id).await?;
    Ok(web::Json(ProfileResponse::from(&profile)))
}

#[cfg(test)]
mod tests;
