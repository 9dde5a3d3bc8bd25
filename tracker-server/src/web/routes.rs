//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::cp::TrainSource;
use crate::enrich::EnrichedTrain;
use crate::snapshot::TrainMap;
use crate::stations::StationView;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<S: TrainSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/trains", get(list_trains::<S>))
        .route("/api/trains/:id", get(train_details::<S>))
        .route("/api/trains/:id/route", get(train_route::<S>))
        .route("/api/stations", get(all_stations::<S>))
        .route("/api/stations/major", get(major_stations::<S>))
        .route("/api/stations/lookup", get(lookup_station::<S>))
        .route("/api/status", get(status::<S>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn list_trains<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<TrainMap> {
    Json(state.service.get_all_trains())
}

async fn train_details<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<EnrichedTrain>, AppError> {
    state
        .service
        .get_train_details(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Train {id} not found"),
        })
}

/// Unknown trains get an empty route rather than 404.
async fn train_route<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Json<RouteResponse> {
    let route = state.service.get_train_route(&id);
    Json(RouteResponse {
        train_id: id,
        route,
    })
}

async fn all_stations<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<Vec<StationView>> {
    Json(state.service.get_all_stations())
}

async fn major_stations<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<Vec<StationView>> {
    Json(state.service.get_major_stations())
}

/// Coordinates of a station by name.
async fn lookup_station<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<LookupResponse>, AppError> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest {
            message: "Station name must not be empty".to_string(),
        });
    }

    let position = state
        .service
        .get_station_coordinates_by_name(name)
        .ok_or_else(|| AppError::NotFound {
            message: format!("No coordinates known for station {name}"),
        })?;

    Ok(Json(LookupResponse {
        name: name.to_string(),
        lat: position.lat,
        lng: position.lng,
    }))
}

async fn status<S: TrainSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<StatusResponse> {
    let service = &state.service;
    let snapshot = service.snapshot();

    Json(StatusResponse {
        running: service.is_running(),
        stations_ready: service.are_stations_ready(),
        station_count: service.station_index().len(),
        train_count: snapshot.len(),
        snapshot_version: snapshot.version,
        last_update: snapshot.published_at,
        cached_details: service.cached_details(),
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        };

        warn!(%status, %message, "Request rejected");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
