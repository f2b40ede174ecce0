//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request extraction and response shapes
//! - `errors.rs`: consistent error and success envelopes

use std::io::Write;
use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use kidsbook_auth::{Hs256Jwt, InMemoryTokenBlacklist};
use kidsbook_content::NoopCensor;
use kidsbook_events::{EventBus, InMemoryEventBus, PushEnvelope};
use kidsbook_infra::{BootstrapOutcome, JwtCredentialService, PostgresBackend, ServiceResult, Services, Store};
use kidsbook_notifications::{EventBusPushSink, Notification};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

pub type PushBus = InMemoryEventBus<PushEnvelope<Notification>>;

/// The router plus the handles tests and the binary need.
pub struct App {
    pub router: Router,
    pub services: Arc<Services>,
    pub push_bus: Arc<PushBus>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Opens the Postgres store when `DATABASE_URL` is set, otherwise an
/// in-memory one, and creates the configured bootstrap teacher if it does
/// not exist yet.
pub async fn build_app(config: &ApiConfig) -> ServiceResult<App> {
    let store = Arc::new(open_store(config).await?);
    let credentials = Arc::new(JwtCredentialService::new(
        Hs256Jwt::new(&config.jwt_secret, config.token_ttl),
        Arc::new(InMemoryTokenBlacklist::new()),
        store.clone(),
    ));
    let push_bus: Arc<PushBus> = Arc::new(InMemoryEventBus::new());
    spawn_push_logger(&push_bus);

    let services = Arc::new(Services::new(
        store,
        credentials.clone(),
        Arc::new(EventBusPushSink::new(push_bus.clone())),
        Arc::new(NoopCensor),
    ));

    if let Some(bootstrap) = &config.bootstrap_teacher {
        let outcome = services.bootstrap_teacher(&bootstrap.username, &bootstrap.email_address)?;
        tracing::info!(
            user_id = %outcome.teacher.id,
            username = %outcome.teacher.username,
            created = outcome.created,
            "bootstrap teacher ready"
        );
        if let Err(e) = announce_bootstrap(&outcome, &mut std::io::stdout().lock()) {
            tracing::warn!(error = %e, "bootstrap token not printed");
        }
    }

    let auth_state = middleware::AuthState { credentials };

    // Every route sees a caller context; anonymous callers carry `None`.
    let api = routes::router()
        .layer(Extension(services.clone()))
        .layer(
            ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            )),
        );

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(api);

    Ok(App {
        router,
        services,
        push_bus,
    })
}

async fn open_store(config: &ApiConfig) -> ServiceResult<Store> {
    let Some(url) = &config.database_url else {
        return Ok(Store::in_memory());
    };
    let backend = PostgresBackend::connect(url, config.database_max_connections).await?;
    Ok(Store::open(Arc::new(backend))?)
}

/// Print the bootstrap token, once, when the account was just created.
/// Tokens never go to the log.
fn announce_bootstrap(outcome: &BootstrapOutcome, out: &mut impl Write) -> std::io::Result<()> {
    if !outcome.created {
        return Ok(());
    }
    writeln!(
        out,
        "bootstrap teacher '{}' created; token: {}",
        outcome.teacher.username, outcome.token
    )
}

/// Stand-in push consumer: logs each delivered envelope.
fn spawn_push_logger(bus: &Arc<PushBus>) {
    let subscription = bus.subscribe();
    let spawned = std::thread::Builder::new()
        .name("push-log".into())
        .spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                tracing::debug!(
                    recipient = %envelope.recipient(),
                    event_type = envelope.event_type(),
                    "push delivered"
                );
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "push consumer not started");
    }
}
