//! Service entry point: loads configuration, wires adapters, starts the RPC
//! server and the user event consumer.

mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::web;
use color_eyre::eyre::{Context, Result};
use mockable::DefaultClock;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use profile_service::config::ServiceConfig;
use profile_service::domain::UserEventConsumer;
use profile_service::inbound::http::health::HealthState;
use profile_service::inbound::http::state::HttpState;

use server::{ServerConfig, build_event_intake, build_profile_stack, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = ServiceConfig::load().context("invalid configuration")?;
    info!(
        environment = %config.environment,
        http_port = config.http_port,
        deletion_mode = ?config.deletion_mode,
        cache = config.redis_url.is_some(),
        user_events = config.user_events.is_some(),
        "configuration loaded"
    );

    let stack = build_profile_stack(&config)
        .await
        .context("failed to assemble profile service")?;

    let intake = build_event_intake(&config).context("failed to open user event source")?;
    let consumer = UserEventConsumer::new(
        intake.source.clone(),
        stack.service.clone(),
        Arc::new(DefaultClock),
        config.request_timeout,
    );
    let consumer_task = tokio::spawn(async move { consumer.run().await });

    let http_state = HttpState::new(
        stack.service.clone(),
        stack.service.clone(),
        Arc::new(DefaultClock),
        config.request_timeout,
    );
    let server_config = ServerConfig::new(
        SocketAddr::from(([0, 0, 0, 0], config.http_port)),
        http_state,
    )
    .with_shutdown_timeout(config.request_timeout.max(std::time::Duration::from_secs(1)));
    let bind_addr = server_config.bind_addr();

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), server_config)
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "profile service listening");
    health_state.mark_ready();

    let served = server.await;
    health_state.mark_unhealthy();

    intake.close();
    match consumer_task.await {
        Ok(handled) => info!(handled, "user event consumer drained"),
        Err(err) => warn!(error = %err, "user event consumer task failed"),
    }
    drop(stack);

    served.context("HTTP server failed")
}
