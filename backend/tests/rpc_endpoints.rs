//! RPC routes served over the real orchestrator and in-memory storage.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use profile_service::Trace;
use profile_service::domain::ports::DeletionMode;
use profile_service::inbound::http::error::GRPC_STATUS_HEADER;
use profile_service::inbound::http::rpc::{self, SERVICE_PATH};
use profile_service::inbound::http::state::HttpState;
use profile_service::middleware::TRACE_ID_HEADER;
use profile_service::outbound::memory::InMemoryProfileRepository;
use serde_json::{Value, json};

mod support;

use support::{Harness, ScriptedNicknames, harness, user};

const TRACE: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

fn fixture() -> Harness {
    harness(
        Arc::new(InMemoryProfileRepository::new(DeletionMode::Soft)),
        ScriptedNicknames::new(&["user_rpc00001", "user_rpc00002"]),
        5,
    )
}

fn state(h: &Harness) -> web::Data<HttpState> {
    web::Data::new(HttpState::new(
        h.service.clone(),
        h.service.clone(),
        h.clock.clone(),
        Duration::from_secs(5),
    ))
}

struct Reply {
    status: StatusCode,
    grpc: Option<String>,
    trace: Option<String>,
    body: Value,
}

async fn post<S>(app: &S, method: &str, body: Value) -> Reply
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let request = test::TestRequest::post()
        .uri(&format!("{SERVICE_PATH}/{method}"))
        .insert_header((TRACE_ID_HEADER, TRACE))
        .set_json(body)
        .to_request();
    let response = test::call_service(app, request).await;
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    let status = response.status();
    let grpc = header(GRPC_STATUS_HEADER);
    let trace = header(TRACE_ID_HEADER);
    let body = test::read_body_json(response).await;
    Reply {
        status,
        grpc,
        trace,
        body,
    }
}

#[actix_web::test]
async fn full_rpc_round_trip() {
    let h = fixture();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .wrap(Trace)
            .configure(rpc::configure),
    )
    .await;
    let id = user(1).to_string();

    let init = post(&app, "InitUser", json!({"userId": id, "email": "ada@example.com"})).await;
    assert_eq!(init.status, StatusCode::OK);
    assert_eq!(init.trace.as_deref(), Some(TRACE));
    assert_eq!(init.body["nickname"], "user_rpc00001");
    assert_eq!(init.body["initializedAt"], "2024-01-01T00:00:00Z");

    let duplicate = post(&app, "InitUser", json!({"userId": id})).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.grpc.as_deref(), Some("6"));
    assert_eq!(duplicate.body["code"], "already_exists");

    h.clock.advance(Duration::from_secs(30));
    let update = post(
        &app,
        "UpdateEmail",
        json!({"userId": id, "newEmail": "ada@example.org"}),
    )
    .await;
    assert_eq!(update.status, StatusCode::OK);
    assert_eq!(update.body["updatedEmail"], "ada@example.org");
    assert_eq!(update.body["updatedAt"], "2024-01-01T00:00:30Z");

    let profile = post(&app, "GetProfile", json!({"userId": id})).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["nickname"], "user_rpc00001");
    assert_eq!(profile.body["email"], "ada@example.org");
    assert_eq!(profile.body["createdAt"], "2024-01-01T00:00:00Z");

    let delete = post(&app, "DeleteUser", json!({"userId": id})).await;
    assert_eq!(delete.status, StatusCode::OK);
    assert_eq!(delete.body["deletedAt"], "2024-01-01T00:00:30Z");

    let missing = post(&app, "GetProfile", json!({"userId": id})).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.grpc.as_deref(), Some("5"));
    assert_eq!(missing.body["code"], "not_found");
    assert_eq!(missing.body["traceId"], TRACE);

    assert_eq!(
        h.events.kinds(),
        vec!["profile_created", "profile_updated", "profile_deleted"]
    );
}

#[actix_web::test]
async fn update_after_delete_is_not_found() {
    let h = fixture();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .wrap(Trace)
            .configure(rpc::configure),
    )
    .await;
    let id = user(2).to_string();

    post(&app, "InitUser", json!({"userId": id})).await;
    post(&app, "DeleteUser", json!({"userId": id})).await;
    let update = post(
        &app,
        "UpdateEmail",
        json!({"userId": id, "newEmail": "late@example.com"}),
    )
    .await;

    assert_eq!(update.status, StatusCode::NOT_FOUND);
    assert_eq!(update.body["details"]["userId"], id);
}
