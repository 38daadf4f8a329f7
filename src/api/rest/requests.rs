use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::extract::ApiJson;
use crate::engine::requests::{self, NewRequest};
use crate::error::AppError;
use crate::models::request::{CustomerRequest, RequestStatus, ServiceRequest};
use crate::models::service::{ServiceKind, ServiceOffering, VehicleType, CATALOG};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/services", get(list_services))
        .route("/requests", post(create_request).get(list_user_requests))
        .route("/requests/open", get(list_open_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/start", post(start_request))
        .route("/requests/:id/complete", post(complete_request))
        .route("/requests/:id/cancel", post(cancel_request))
}

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub user_id: Option<String>,
    pub service: ServiceKind,
    pub vehicle_type: VehicleType,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UserRequestsQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct OpenRequestsQuery {
    pub status: Option<RequestStatus>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct TechnicianAction {
    pub technician_id: Uuid,
}

#[derive(Serialize)]
pub struct RequestsResponse {
    pub requests: Vec<ServiceRequest>,
}

#[derive(Serialize)]
pub struct CustomerRequestsResponse {
    pub requests: Vec<CustomerRequest>,
}

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceOffering>,
}

async fn list_services() -> Json<ServicesResponse> {
    Json(ServicesResponse {
        services: CATALOG.iter().map(|kind| kind.offering()).collect(),
    })
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateRequestBody>,
) -> Result<Json<ServiceRequest>, AppError> {
    let request = requests::create_request(
        &state,
        NewRequest {
            user_id: payload.user_id,
            service: payload.service,
            vehicle_type: payload.vehicle_type,
            lat: payload.lat,
            lon: payload.lon,
            address: payload.address,
            description: payload.description,
        },
    )
    .await?;

    Ok(Json(request))
}

async fn list_user_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserRequestsQuery>,
) -> Result<Json<CustomerRequestsResponse>, AppError> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::BadRequest("user_id is required".to_string()))?;
    let requests = requests::list_for_user(&state, &user_id).await?;
    Ok(Json(CustomerRequestsResponse { requests }))
}

async fn list_open_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenRequestsQuery>,
) -> Result<Json<RequestsResponse>, AppError> {
    let requests = requests::list_open(&state, query.status, query.limit).await?;
    Ok(Json(RequestsResponse { requests }))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(requests::get_request(&state, id).await?))
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<TechnicianAction>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(
        requests::accept_request(&state, id, payload.technician_id).await?,
    ))
}

async fn start_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<TechnicianAction>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(
        requests::start_request(&state, id, payload.technician_id).await?,
    ))
}

async fn complete_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<TechnicianAction>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(
        requests::complete_request(&state, id, payload.technician_id).await?,
    ))
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceRequest>, AppError> {
    Ok(Json(requests::cancel_request(&state, id).await?))
}
