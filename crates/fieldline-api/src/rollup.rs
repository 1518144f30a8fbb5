// Labor cost rollup HTTP route

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::IntoParams;

use fieldline_core::{CalendarAssignment, DateRange, EntityType, RollupEngine, RollupSummary};
use fieldline_storage::Database;

/// App state for rollup routes
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub engine: RollupEngine,
}

impl AppState {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            engine: RollupEngine::new(),
        }
    }
}

/// Create rollup routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/rollup/:entity_type/:entity_id", get(get_rollup))
        .with_state(state)
}

/// Inclusive date range for the rollup query
#[derive(Debug, Deserialize, IntoParams)]
pub struct RollupQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// GET /v1/rollup/{entity_type}/{entity_id} - Labor cost summary
#[utoipa::path(
    get,
    path = "/v1/rollup/{entity_type}/{entity_id}",
    params(
        ("entity_type" = String, Path, description = "Owning entity type, e.g. work_order"),
        ("entity_id" = String, Path, description = "Owning entity ID"),
        RollupQuery
    ),
    responses(
        (status = 200, description = "Aggregated hours and cost", body = RollupSummary),
        (status = 400, description = "Unknown entity type or inverted date range"),
        (status = 500, description = "Internal server error")
    ),
    tag = "rollup"
)]
pub async fn get_rollup(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
    Query(query): Query<RollupQuery>,
) -> Result<Json<RollupSummary>, StatusCode> {
    let entity_type = EntityType::from_str(&entity_type).map_err(|_| StatusCode::BAD_REQUEST)?;
    if query.to < query.from {
        return Err(StatusCode::BAD_REQUEST);
    }

    let rows = state
        .db
        .assignments_overlapping(entity_type.as_str(), &entity_id, query.from, query.to)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load assignments: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let assignments = rows
        .into_iter()
        .map(CalendarAssignment::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::error!("Corrupt assignment row: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let summary = state.engine.rollup(
        &assignments,
        &DateRange {
            from: query.from,
            to: query.to,
        },
    );

    Ok(Json(summary))
}
