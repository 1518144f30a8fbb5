// Fieldline calendar sync API server
//
// Hosts the webhook ingestion endpoint, the calendar event CRUD routes
// that drive outbound push, and the cost rollup query. All provider access
// goes through the CalendarClient trait; all durable state goes through
// the storage crate.

mod common;
mod events;
mod rollup;
mod webhook;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use fieldline_core::traits::{ChannelRegistry, SyncCursorStore};
use fieldline_core::{CalendarClient, SyncConfig};
use fieldline_gcal::GoogleCalendarClient;
use fieldline_storage::{Database, DbChannelRegistry, DbEventMirror, DbSyncCursorStore};
use fieldline_worker::{SyncService, SyncTrigger};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        webhook::receive_notification,
        events::create_event,
        events::get_event,
        events::list_calendar_events,
        events::update_event,
        events::delete_event,
        events::resync_calendar,
        rollup::get_rollup,
    ),
    components(
        schemas(
            fieldline_core::CalendarEvent,
            fieldline_core::EntityType,
            fieldline_core::AssigneeType,
            fieldline_core::CalendarAssignment,
            fieldline_core::ScheduleEntity,
            fieldline_core::mapper::WorkOrder,
            fieldline_core::mapper::Project,
            fieldline_core::mapper::AdHocEvent,
            fieldline_core::mapper::ScheduleItem,
            fieldline_core::mapper::TimeEntry,
            fieldline_core::mapper::ProjectMilestone,
            fieldline_core::mapper::ContactInteraction,
            fieldline_core::RollupSummary,
            fieldline_core::AssigneeRollup,
            events::CreateEventRequest,
            events::UpdateEventRequest,
            common::StatusResponse,
            common::ListResponse<fieldline_core::CalendarEvent>,
        )
    ),
    tags(
        (name = "webhook", description = "Provider push notification ingestion"),
        (name = "events", description = "Calendar event management endpoints"),
        (name = "rollup", description = "Labor cost rollup endpoints")
    ),
    info(
        title = "Fieldline Calendar Sync API",
        version = "0.3.0",
        description = "Bidirectional calendar sync for Fieldline scheduling entities",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("fieldline-api starting...");

    // Initialize database
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Connected to database");

    // Sync engine configuration, loaded once and injected
    let config = SyncConfig::from_env().context("Failed to load sync configuration")?;
    tracing::info!(
        webhook_url = %config.webhook_url(),
        lookahead_hours = config.renewal_lookahead_hours,
        "Sync engine configured"
    );

    let client: Arc<dyn CalendarClient> = Arc::new(
        GoogleCalendarClient::from_env()
            .context("Failed to configure calendar client")?
            .with_timeout(config.request_timeout)
            .with_retry(config.retry.clone()),
    );

    // Durable stores
    let db = Arc::new(db);
    let registry: Arc<dyn ChannelRegistry> = Arc::new(DbChannelRegistry::new((*db).clone()));
    let cursors: Arc<dyn SyncCursorStore> = Arc::new(DbSyncCursorStore::new((*db).clone()));
    let mirror = Arc::new(DbEventMirror::new((*db).clone()));

    let sync = Arc::new(SyncService::new(client, cursors.clone(), mirror));
    let trigger: Arc<dyn SyncTrigger> = sync.clone();

    // Module states
    let webhook_state = webhook::AppState::new(registry, trigger.clone());
    let events_state = events::AppState {
        db: db.clone(),
        sync: sync.clone(),
        cursors,
        trigger,
    };
    let rollup_state = rollup::AppState::new(db.clone());

    // Load CORS allowed origins from environment (optional)
    // Example: CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    // Build main router
    let app = Router::new()
        .route("/health", get(health))
        .merge(webhook::routes(webhook_state))
        .merge(events::routes(events_state))
        .merge(rollup::routes(rollup_state));

    // Add Swagger UI
    let app =
        app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
                .allow_credentials(true),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = "0.0.0.0:9000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
