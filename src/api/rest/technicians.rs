use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::extract::ApiJson;
use crate::engine::nearby::{find_nearby, NearbyQuery};
use crate::engine::requests;
use crate::engine::technicians::{self, NewTechnician};
use crate::error::AppError;
use crate::models::request::ServiceRequest;
use crate::models::technician::{GeoPoint, NearbyTechnician, Technician};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/technicians", post(register_technician).get(list_technicians))
        .route("/technicians/nearby", post(nearby_technicians))
        .route("/technicians/:id", get(get_technician))
        .route("/technicians/:id/current-request", get(current_request))
        .route("/technicians/:id/location", patch(update_location))
        .route("/technicians/:id/availability", patch(update_availability))
}

#[derive(Deserialize)]
pub struct NearbyRequest {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<f64>,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    pub technicians: Vec<NearbyTechnician>,
}

#[derive(Deserialize)]
pub struct RegisterTechnicianRequest {
    pub name: String,
    pub phone: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub rating: Option<f64>,
}

#[derive(Serialize)]
pub struct CurrentRequestResponse {
    pub request: Option<ServiceRequest>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub is_available: bool,
}

async fn nearby_technicians(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NearbyRequest>,
) -> Result<Json<NearbyResponse>, AppError> {
    let query = NearbyQuery::parse(payload.lat, payload.lon, payload.radius)?;
    let technicians = find_nearby(&state, query).await?;
    Ok(Json(NearbyResponse { technicians }))
}

async fn register_technician(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterTechnicianRequest>,
) -> Result<Json<Technician>, AppError> {
    let technician = technicians::register_technician(
        &state,
        NewTechnician {
            name: payload.name,
            phone: payload.phone,
            location: GeoPoint::new(payload.lat, payload.lon),
            rating: payload.rating,
        },
    )
    .await?;

    Ok(Json(technician))
}

async fn list_technicians(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Technician>>, AppError> {
    Ok(Json(technicians::list_technicians(&state).await?))
}

async fn get_technician(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Technician>, AppError> {
    Ok(Json(technicians::get_technician(&state, id).await?))
}

async fn current_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CurrentRequestResponse>, AppError> {
    let request = requests::current_for_technician(&state, id).await?;
    Ok(Json(CurrentRequestResponse { request }))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateLocationRequest>,
) -> Result<Json<Technician>, AppError> {
    let location = GeoPoint::new(payload.lat, payload.lon);
    Ok(Json(technicians::update_location(&state, id, location).await?))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateAvailabilityRequest>,
) -> Result<Json<Technician>, AppError> {
    Ok(Json(
        technicians::set_availability(&state, id, payload.is_available).await?,
    ))
}
