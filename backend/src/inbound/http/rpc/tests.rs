//! Tests for the profile RPC handlers.

use super::*;
use crate::domain::ports::{MockProfileCommand, MockProfileQuery};
use crate::domain::{Budget, FieldUpdate, Nickname};
use crate::inbound::http::deadline::GRPC_TIMEOUT_HEADER;
use crate::inbound::http::error::GRPC_STATUS_HEADER;
use crate::test_support::MutableClock;
use actix_web::http::StatusCode;
use mockable::Clock;
use actix_web::{App, test as actix_test};
use rstest::rstest;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const USER: &str = "44444444-4444-4444-4444-444444444444";

fn stored(user_id: UserId, email: Option<Email>) -> Profile {
    let now = MutableClock::fixed().utc();
    Profile::new(
        user_id,
        Nickname::new("user_k3x9q2mz").expect("valid nickname"),
        email,
        now,
        now,
    )
}

fn state(command: MockProfileCommand, query: MockProfileQuery) -> HttpState {
    HttpState::new(
        Arc::new(command),
        Arc::new(query),
        Arc::new(MutableClock::fixed()),
        Duration::from_secs(5),
    )
}

async fn call(
    state: HttpState,
    method: &str,
    body: Value,
    timeout: Option<&str>,
) -> (StatusCode, Option<String>, Value) {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;
    let mut request = actix_test::TestRequest::post()
        .uri(&format!("{SERVICE_PATH}/{method}"))
        .set_json(&body);
    if let Some(value) = timeout {
        request = request.insert_header((GRPC_TIMEOUT_HEADER, value));
    }
    let response = actix_test::call_service(&app, request.to_request()).await;
    let status = response.status();
    let grpc = response
        .headers()
        .get(GRPC_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let bytes = actix_test::read_body(response).await;
    let value = serde_json::from_slice(&bytes).expect("JSON body");
    (status, grpc, value)
}

#[rstest]
#[actix_web::test]
async fn init_user_returns_nickname_and_timestamp() {
    let mut command = MockProfileCommand::new();
    command
        .expect_create_profile()
        .times(1)
        .returning(|_, user_id, email| {
            assert_eq!(email.as_ref().map(AsRef::as_ref), Some("ada@example.com"));
            Ok(stored(user_id, email))
        });

    let (status, _, body) = call(
        state(command, MockProfileQuery::new()),
        "InitUser",
        json!({"userId": USER, "email": "ada@example.com"}),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], USER);
    assert_eq!(body["nickname"], "user_k3x9q2mz");
    assert!(body["initializedAt"].is_string());
}

#[rstest]
#[case(json!({"userId": USER}))]
#[case(json!({"userId": USER, "email": ""}))]
#[case(json!({"userId": USER, "email": null}))]
#[actix_web::test]
async fn init_user_treats_missing_or_blank_email_as_none(#[case] body: Value) {
    let mut command = MockProfileCommand::new();
    command
        .expect_create_profile()
        .times(1)
        .returning(|_, user_id, email| {
            assert!(email.is_none());
            Ok(stored(user_id, email))
        });

    let (status, _, _) = call(state(command, MockProfileQuery::new()), "InitUser", body, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[case("InitUser", json!({"userId": "not-a-uuid"}), "userId", "invalid_user_id")]
#[case("InitUser", json!({"userId": ""}), "userId", "empty_user_id")]
#[case("InitUser", json!({"userId": USER, "email": "nope"}), "email", "invalid_email")]
#[case("UpdateEmail", json!({"userId": USER, "newEmail": ""}), "newEmail", "empty_email")]
#[case("DeleteUser", json!({"userId": "xyz"}), "userId", "invalid_user_id")]
#[case("GetProfile", json!({"userId": "xyz"}), "userId", "invalid_user_id")]
#[actix_web::test]
async fn invalid_fields_are_rejected_before_the_orchestrator(
    #[case] method: &str,
    #[case] body: Value,
    #[case] field: &str,
    #[case] code: &str,
) {
    let mut command = MockProfileCommand::new();
    command.expect_create_profile().never();
    command.expect_update_profile().never();
    command.expect_delete_profile().never();
    let mut query = MockProfileQuery::new();
    query.expect_get_profile().never();

    let (status, grpc, body) = call(state(command, query), method, body, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(grpc.as_deref(), Some("3"));
    assert_eq!(body["code"], "invalid_request");
    assert_eq!(body["details"]["field"], field);
    assert_eq!(body["details"]["code"], code);
}

#[rstest]
#[actix_web::test]
async fn malformed_json_uses_error_schema() {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state(
                MockProfileCommand::new(),
                MockProfileQuery::new(),
            )))
            .configure(configure),
    )
    .await;
    let request = actix_test::TestRequest::post()
        .uri(&format!("{SERVICE_PATH}/InitUser"))
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"userId\":")
        .to_request();
    let response = actix_test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], "invalid_request");
}

#[rstest]
#[actix_web::test]
async fn update_email_sets_only_the_email() {
    let mut command = MockProfileCommand::new();
    command
        .expect_update_profile()
        .times(1)
        .returning(|_, user_id, patch| {
            let FieldUpdate::Set(email) = patch.email else {
                panic!("expected email to be set");
            };
            Ok(stored(user_id, Some(email)))
        });

    let (status, _, body) = call(
        state(command, MockProfileQuery::new()),
        "UpdateEmail",
        json!({"userId": USER, "newEmail": "ada@example.org"}),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updatedEmail"], "ada@example.org");
    assert!(body["updatedAt"].is_string());
}

#[rstest]
#[case(Error::not_found("profile not found"), StatusCode::NOT_FOUND, "5")]
#[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE, "14")]
#[case(Error::cancelled("late"), StatusCode::GATEWAY_TIMEOUT, "4")]
#[actix_web::test]
async fn delete_user_propagates_domain_errors(
    #[case] error: Error,
    #[case] status: StatusCode,
    #[case] grpc: &str,
) {
    let mut command = MockProfileCommand::new();
    command
        .expect_delete_profile()
        .times(1)
        .return_once(move |_, _| Err(error));

    let (actual, grpc_header, _) = call(
        state(command, MockProfileQuery::new()),
        "DeleteUser",
        json!({"userId": USER}),
        None,
    )
    .await;

    assert_eq!(actual, status);
    assert_eq!(grpc_header.as_deref(), Some(grpc));
}

#[rstest]
#[actix_web::test]
async fn delete_user_echoes_deletion_time() {
    let mut command = MockProfileCommand::new();
    command
        .expect_delete_profile()
        .times(1)
        .returning(|_, _| Ok(MutableClock::fixed().utc()));

    let (status, _, body) = call(
        state(command, MockProfileQuery::new()),
        "DeleteUser",
        json!({"userId": USER}),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], USER);
    assert_eq!(body["deletedAt"], "2024-01-01T00:00:00Z");
}

#[rstest]
#[actix_web::test]
async fn exhausted_creation_maps_to_resource_exhausted() {
    let mut command = MockProfileCommand::new();
    command.expect_create_profile().times(1).returning(|_, _, _| {
        Err(Error::resource_exhausted("nickname attempts exhausted")
            .with_details(json!({"attempts": 5})))
    });

    let (status, grpc, body) = call(
        state(command, MockProfileQuery::new()),
        "InitUser",
        json!({"userId": USER}),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(grpc.as_deref(), Some("8"));
    assert_eq!(body["details"]["attempts"], 5);
}

#[rstest]
#[case(None, Duration::from_secs(5))]
#[case(Some("250m"), Duration::from_millis(250))]
#[case(Some("2S"), Duration::from_secs(2))]
#[actix_web::test]
async fn get_profile_applies_deadline(
    #[case] header: Option<&str>,
    #[case] expected: Duration,
) {
    let mut query = MockProfileQuery::new();
    query.expect_get_profile().times(1).returning(move |ctx, user_id| {
        let now = MutableClock::fixed().utc();
        assert_eq!(ctx.budget(now), Budget::Remaining(expected));
        Ok(stored(user_id, None))
    });

    let (status, _, body) = call(
        state(MockProfileCommand::new(), query),
        "GetProfile",
        json!({"userId": USER}),
        header,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nickname"], "user_k3x9q2mz");
    assert!(body["email"].is_null());
}

#[rstest]
#[actix_web::test]
async fn malformed_timeout_header_is_rejected() {
    let mut query = MockProfileQuery::new();
    query.expect_get_profile().never();

    let (status, grpc, body) = call(
        state(MockProfileCommand::new(), query),
        "GetProfile",
        json!({"userId": USER}),
        Some("fast"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(grpc.as_deref(), Some("3"));
    assert_eq!(body["details"]["header"], GRPC_TIMEOUT_HEADER);
}
