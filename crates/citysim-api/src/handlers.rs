//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and city count |
//! | `GET` | `/cities` | List cities |
//! | `POST` | `/cities` | Create a city |
//! | `GET` | `/cities/{id}` | Get one city |
//! | `DELETE` | `/cities/{id}` | Close and remove a city |
//! | `GET` | `/cities/{id}/cars` | List the cars of a city |
//! | `POST` | `/cities/{id}/cars` | Start cars, optionally following `vin` |
//! | `POST` | `/cities/{id}/cars/following/{vin}` | Start followers of `vin` |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use citysim_core::City;
use citysim_types::{CarId, CityId};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on cars started by a single request.
pub const MAX_CARS_PER_REQUEST: usize = 1000;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `POST /cities`.
#[derive(Debug, serde::Deserialize)]
pub struct CreateCityQuery {
    /// Cells per side; the configured default when absent.
    pub size: Option<u32>,
}

/// Query parameters for `POST /cities/{id}/cars`.
#[derive(Debug, serde::Deserialize)]
pub struct StartCarsQuery {
    /// VIN of the car the new cars follow. Absent means new leaders.
    pub vin: Option<String>,
    /// Number of cars to start (default 1).
    pub count: Option<usize>,
}

/// Query parameters for `POST /cities/{id}/cars/following/{vin}`.
#[derive(Debug, serde::Deserialize)]
pub struct CountQuery {
    /// Number of cars to start (default 1).
    pub count: Option<usize>,
}

fn car_count(requested: Option<usize>) -> Result<usize, ApiError> {
    let count = requested.unwrap_or(1);
    if count == 0 || count > MAX_CARS_PER_REQUEST {
        return Err(ApiError::InvalidQuery(format!(
            "count must be between 1 and {MAX_CARS_PER_REQUEST}, got {count}"
        )));
    }
    Ok(count)
}

async fn city_json(city: &City) -> serde_json::Value {
    serde_json::json!({
        "city": city.info(),
        "state": city.state().await,
        "cars": city.car_count().await,
        "leaders": city.leader_count().await,
    })
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "cities": state.directory.len().await,
    }))
}

// ---------------------------------------------------------------------------
// Cities
// ---------------------------------------------------------------------------

/// List every city.
pub async fn list_cities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cities = state.directory.list_cities().await;
    let mut body = Vec::with_capacity(cities.len());
    for city in &cities {
        body.push(city_json(city).await);
    }

    Json(serde_json::json!({
        "count": body.len(),
        "cities": body,
    }))
}

/// Create and provision a city.
pub async fn create_city(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateCityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let city = state.directory.create_city(query.size).await?;
    Ok((StatusCode::CREATED, Json(city_json(&city).await)))
}

/// Get a single city.
pub async fn get_city(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let city = state.directory.get_city(&CityId::new(id)).await?;
    Ok(Json(city_json(&city).await))
}

/// Close and remove a city.
pub async fn delete_city(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = CityId::new(id);
    let report = state.directory.delete_city(&id).await?;
    info!(city = %id, leaders = report.leaders, timed_out = report.timed_out, "city deleted");

    Ok(Json(serde_json::json!({
        "deleted": id,
        "shutdown": report,
    })))
}

// ---------------------------------------------------------------------------
// Cars
// ---------------------------------------------------------------------------

/// List the cars of a city.
pub async fn list_cars(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cars = state.directory.list_cars(&CityId::new(id)).await?;
    Ok(Json(serde_json::json!({
        "count": cars.len(),
        "cars": cars,
    })))
}

/// Start cars in a city, following `vin` when given.
pub async fn start_cars(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<StartCarsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = car_count(query.count)?;
    let leader = query.vin.map(CarId::new);
    start(&state, CityId::new(id), leader, count).await
}

/// Start followers of `vin`.
pub async fn start_followers(
    State(state): State<Arc<AppState>>,
    Path((id, vin)): Path<(String, String)>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = car_count(query.count)?;
    start(&state, CityId::new(id), Some(CarId::new(vin)), count).await
}

async fn start(
    state: &AppState,
    city: CityId,
    leader: Option<CarId>,
    count: usize,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let cars = state.directory.start_cars(&city, leader.as_ref(), count).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "count": cars.len(),
            "cars": cars,
        })),
    ))
}
