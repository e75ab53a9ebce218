//! User lifecycle events flowing through the channel source into profiles.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use profile_service::domain::ports::{DeletionMode, NoOpProfileEventPublisher, ProfileQuery};
use profile_service::domain::{
    ErrorCode, MaxNicknameRetries, ProfileService, RequestContext, RetryBackoff, RetryRuntime,
    UserEventConsumer,
};
use profile_service::outbound::events::ChannelUserEventSource;
use profile_service::outbound::memory::InMemoryProfileRepository;
use profile_service::test_support::{MutableClock, NoJitter, RecordingSleeper};
use serde_json::json;

mod support;

use support::{
    ClockAdvancingSleeper, FlakyRepository, OutageRepository, ScriptedNicknames, harness, user,
};

fn instant_retries() -> RetryRuntime {
    RetryRuntime {
        sleeper: Arc::new(RecordingSleeper::default()),
        jitter: Arc::new(NoJitter),
    }
}

fn created(n: u8, email: Option<&str>) -> Vec<u8> {
    json!({"type": "user_created", "userId": user(n).to_string(), "email": email})
        .to_string()
        .into_bytes()
}

fn deleted(n: u8) -> Vec<u8> {
    json!({"type": "user_deleted", "userId": user(n).to_string()})
        .to_string()
        .into_bytes()
}

#[tokio::test]
async fn duplicated_and_malformed_events_are_absorbed() {
    let repository = Arc::new(InMemoryProfileRepository::new(DeletionMode::Soft));
    let h = harness(
        repository.clone(),
        ScriptedNicknames::new(&["user_one", "user_two", "user_three"]),
        5,
    );
    let (source, sender) = ChannelUserEventSource::new(16);
    let source = Arc::new(source);
    let consumer = UserEventConsumer::new(
        source.clone(),
        h.service.clone(),
        Arc::new(DefaultClock),
        Duration::from_secs(5),
    );

    for payload in [
        created(1, Some("ada@example.com")),
        created(1, Some("ada@example.com")),
        created(2, None),
        deleted(2),
        deleted(2),
        b"not json".to_vec(),
    ] {
        sender.send(payload).await.expect("source open");
    }
    drop(sender);

    assert_eq!(consumer.run().await, 6);
    assert_eq!(source.acknowledged(), 6);
    assert_eq!(source.in_flight(), 0);
    assert_eq!(repository.live_count(), 1);

    let profile = h
        .service
        .get_profile(RequestContext::background(), user(1))
        .await
        .expect("profile from event");
    assert_eq!(profile.email().map(AsRef::as_ref), Some("ada@example.com"));
    let gone = h
        .service
        .get_profile(RequestContext::background(), user(2))
        .await
        .expect_err("deleted by event");
    assert_eq!(gone.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn transient_storage_failures_are_redelivered() {
    let repository = Arc::new(FlakyRepository::new(2));
    let h = harness(repository.clone(), ScriptedNicknames::new(&["user_retry"]), 5);
    let (source, sender) = ChannelUserEventSource::new(4);
    let source = Arc::new(source);
    let consumer = UserEventConsumer::new(
        source.clone(),
        h.service.clone(),
        Arc::new(DefaultClock),
        Duration::from_secs(5),
    )
    .with_retry_runtime(instant_retries());

    sender.send(created(3, None)).await.expect("source open");
    drop(sender);

    assert_eq!(consumer.run().await, 3);
    assert_eq!(source.acknowledged(), 1);
    assert_eq!(repository.live_count(), 1);
}

#[tokio::test]
async fn persistent_failures_are_dropped_after_the_cap() {
    let repository = Arc::new(FlakyRepository::new(usize::MAX));
    let h = harness(repository.clone(), ScriptedNicknames::new(&["user_never"]), 5);
    let (source, sender) = ChannelUserEventSource::new(4);
    let source = Arc::new(source);
    let consumer = UserEventConsumer::new(
        source.clone(),
        h.service.clone(),
        Arc::new(DefaultClock),
        Duration::from_secs(5),
    )
    .with_max_deliveries(2)
    .with_retry_runtime(instant_retries());

    sender.send(created(4, None)).await.expect("source open");
    drop(sender);

    assert_eq!(consumer.run().await, 2);
    assert_eq!(source.acknowledged(), 1);
    assert_eq!(repository.live_count(), 0);
}

#[tokio::test]
async fn backoff_outlasts_a_short_storage_outage() {
    let clock = Arc::new(MutableClock::fixed());
    let repository = Arc::new(OutageRepository::new(
        clock.clone(),
        Duration::from_millis(1_000),
    ));
    let nicknames = Arc::new(ScriptedNicknames::new(&["user_patient"]));
    let service = Arc::new(ProfileService::new(
        repository.clone(),
        Arc::new(NoOpProfileEventPublisher),
        nicknames,
        clock.clone(),
        MaxNicknameRetries::new(5).expect("valid retry budget"),
    ));
    let (source, sender) = ChannelUserEventSource::new(4);
    let source = Arc::new(source);
    let consumer = UserEventConsumer::new(
        source.clone(),
        service,
        clock.clone(),
        Duration::from_secs(5),
    )
    .with_backoff(RetryBackoff {
        initial: Duration::from_millis(200),
        max: Duration::from_secs(5),
    })
    .with_retry_runtime(RetryRuntime {
        sleeper: Arc::new(ClockAdvancingSleeper(clock.clone())),
        jitter: Arc::new(NoJitter),
    });

    sender.send(created(5, None)).await.expect("source open");
    drop(sender);

    // 200 + 400 + 800 ms of backoff clears the outage before the fourth delivery.
    assert_eq!(consumer.run().await, 4);
    assert_eq!(source.acknowledged(), 1);
    assert_eq!(repository.live_count(), 1);
}
