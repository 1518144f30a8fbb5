// Channel renewal job
//
// Invoked periodically (cron, daily target). One pass: create channels for
// newly managed calendars, renew everything expiring inside the lookahead
// window, report channels that have already gone dark. Exit code 0 on a
// clean pass, including the zero-channels case; non-zero only when
// configuration or database loading fails outright. Per-channel failures
// are logged and absorbed into the summary.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldline_core::SyncConfig;
use fieldline_gcal::GoogleCalendarClient;
use fieldline_storage::{Database, DbChannelRegistry};
use fieldline_worker::RenewalService;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldline_worker=debug,fieldline_gcal=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("fieldline-renewal starting...");

    let config = SyncConfig::from_env().context("Failed to load sync configuration")?;

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    let client = GoogleCalendarClient::from_env()
        .context("Failed to configure calendar client")?
        .with_timeout(config.request_timeout)
        .with_retry(config.retry.clone());

    let registry = Arc::new(DbChannelRegistry::new(db));
    let renewal = RenewalService::new(Arc::new(client), registry, config);

    // Newly managed calendars get their first channel here; failures are
    // per-calendar and do not fail the run
    for calendar_id in managed_calendars() {
        if let Err(err) = renewal.ensure_channel(&calendar_id).await {
            tracing::error!(calendar_id = %calendar_id, error = %err, "failed to ensure channel");
        }
    }

    let summary = renewal.run_once().await.context("Renewal pass failed")?;
    tracing::info!(
        examined = summary.examined,
        renewed = summary.renewed,
        failed = summary.failed,
        stale = summary.stale,
        "renewal pass complete"
    );

    Ok(())
}

/// Calendars to manage, from CALENDAR_IDS (comma-separated). Empty means
/// only already-registered channels are maintained.
fn managed_calendars() -> Vec<String> {
    std::env::var("CALENDAR_IDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
