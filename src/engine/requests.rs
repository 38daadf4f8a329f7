use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::{CustomerRequest, RequestEventKind, RequestStatus, ServiceRequest};
use crate::models::service::{ServiceKind, VehicleType};
use crate::models::technician::{GeoPoint, Technician, TechnicianSummary};
use crate::state::AppState;
use crate::store::{RequestFilter, RequestOrder, StoreError};

pub const DEFAULT_OPEN_LIMIT: usize = 20;
pub const MAX_OPEN_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub user_id: Option<String>,
    pub service: ServiceKind,
    pub vehicle_type: VehicleType,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
    pub description: Option<String>,
}

pub async fn create_request(
    state: &AppState,
    new: NewRequest,
) -> Result<ServiceRequest, AppError> {
    let location = match (new.lat, new.lon) {
        (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => GeoPoint::new(lat, lon),
        _ => return Err(AppError::BadRequest("location is required".to_string())),
    };
    if !location.is_valid() {
        return Err(AppError::BadRequest(
            "latitude and longitude are out of range".to_string(),
        ));
    }

    let offering = new.service.offering();
    let now = Utc::now();
    let description = new
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("{} request", offering.title));

    let request = ServiceRequest {
        id: Uuid::new_v4(),
        user_id: new.user_id.filter(|u| !u.trim().is_empty()),
        service: new.service,
        vehicle_type: new.vehicle_type,
        location,
        address: new.address.unwrap_or_default(),
        description,
        status: RequestStatus::Pending,
        assigned_technician: None,
        estimated_price: Some(offering.base_price),
        final_price: None,
        payment_status: None,
        razorpay_order_id: None,
        razorpay_payment_id: None,
        created_at: now,
        updated_at: now,
    };

    let request = state.store.insert_request(request).await?;
    state.metrics.requests_created_total.inc();
    state.publish(RequestEventKind::Created, &request);

    info!(request_id = %request.id, service = ?request.service, "service request created");
    Ok(request)
}

pub async fn get_request(state: &AppState, id: Uuid) -> Result<ServiceRequest, AppError> {
    Ok(state.store.get_request(id).await?)
}

/// Newest first, each with its assigned technician's summary when one is set.
pub async fn list_for_user(
    state: &AppState,
    user_id: &str,
) -> Result<Vec<CustomerRequest>, AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }

    let requests = state
        .store
        .list_requests(RequestFilter {
            user_id: Some(user_id.to_string()),
            order: RequestOrder::NewestFirst,
            ..Default::default()
        })
        .await?;

    let mut summaries: HashMap<Uuid, Option<TechnicianSummary>> = HashMap::new();
    let mut listed = Vec::with_capacity(requests.len());
    for request in requests {
        let technician = match request.assigned_technician {
            Some(technician_id) => match summaries.get(&technician_id) {
                Some(summary) => summary.clone(),
                None => {
                    let summary = match state.store.get_technician(technician_id).await {
                        Ok(technician) => Some(TechnicianSummary::from(&technician)),
                        Err(StoreError::NotFound(_)) => {
                            warn!(
                                request_id = %request.id,
                                technician_id = %technician_id,
                                "assigned technician no longer registered"
                            );
                            None
                        }
                        Err(err) => return Err(err.into()),
                    };
                    summaries.insert(technician_id, summary.clone());
                    summary
                }
            },
            None => None,
        };
        listed.push(CustomerRequest {
            request,
            technician,
        });
    }

    Ok(listed)
}

/// The accepted or in-progress job a technician is working on, newest first.
pub async fn current_for_technician(
    state: &AppState,
    technician_id: Uuid,
) -> Result<Option<ServiceRequest>, AppError> {
    state.store.get_technician(technician_id).await?;

    let assigned = state
        .store
        .list_requests(RequestFilter {
            assigned_to: Some(technician_id),
            order: RequestOrder::NewestFirst,
            ..Default::default()
        })
        .await?;

    Ok(assigned
        .into_iter()
        .find(|request| request.status.is_active()))
}

/// Unassigned requests in `status` (pending by default), oldest first.
pub async fn list_open(
    state: &AppState,
    status: Option<RequestStatus>,
    limit: Option<usize>,
) -> Result<Vec<ServiceRequest>, AppError> {
    let limit = limit.unwrap_or(DEFAULT_OPEN_LIMIT).clamp(1, MAX_OPEN_LIMIT);

    let requests = state
        .store
        .list_requests(RequestFilter {
            status: Some(status.unwrap_or(RequestStatus::Pending)),
            unassigned_only: true,
            order: RequestOrder::OldestFirst,
            limit: Some(limit),
            ..Default::default()
        })
        .await?;

    Ok(requests)
}

/// First accept wins.
///
/// The technician is reserved first, then the request is claimed with a
/// conditional update on `pending` and no assignee. A losing claim releases
/// the reservation and reports a conflict.
pub async fn accept_request(
    state: &AppState,
    request_id: Uuid,
    technician_id: Uuid,
) -> Result<ServiceRequest, AppError> {
    state
        .store
        .update_technician(
            technician_id,
            Box::new(move |technician: &mut Technician| {
                if !technician.is_available || technician.active_request.is_some() {
                    return Err(StoreError::Conflict(format!(
                        "technician {} is not available",
                        technician.id
                    )));
                }
                technician.is_available = false;
                technician.active_request = Some(request_id);
                Ok(())
            }),
        )
        .await?;

    let claimed = state
        .store
        .update_request(
            request_id,
            Box::new(move |request: &mut ServiceRequest| {
                if request.status != RequestStatus::Pending
                    || request.assigned_technician.is_some()
                {
                    return Err(StoreError::Conflict(format!(
                        "request {} is no longer open",
                        request.id
                    )));
                }
                request.status = RequestStatus::Accepted;
                request.assigned_technician = Some(technician_id);
                request.updated_at = Utc::now();
                Ok(())
            }),
        )
        .await;

    match claimed {
        Ok(request) => {
            state.publish(RequestEventKind::Accepted, &request);
            info!(request_id = %request.id, technician_id = %technician_id, "request accepted");
            Ok(request)
        }
        Err(err) => {
            release_technician(state, technician_id, request_id).await;
            warn!(
                request_id = %request_id,
                technician_id = %technician_id,
                error = %err,
                "accept lost or failed"
            );
            Err(err.into())
        }
    }
}

pub async fn start_request(
    state: &AppState,
    request_id: Uuid,
    technician_id: Uuid,
) -> Result<ServiceRequest, AppError> {
    let request = transition(
        state,
        request_id,
        technician_id,
        RequestStatus::Accepted,
        RequestStatus::InProgress,
    )
    .await?;

    state.publish(RequestEventKind::Started, &request);
    info!(request_id = %request.id, "request in progress");
    Ok(request)
}

pub async fn complete_request(
    state: &AppState,
    request_id: Uuid,
    technician_id: Uuid,
) -> Result<ServiceRequest, AppError> {
    let request = transition(
        state,
        request_id,
        technician_id,
        RequestStatus::InProgress,
        RequestStatus::Completed,
    )
    .await?;

    release_technician(state, technician_id, request_id).await;
    state.publish(RequestEventKind::Completed, &request);
    info!(request_id = %request.id, "request completed");
    Ok(request)
}

/// Pending or accepted requests only. An assigned technician is detached
/// and made available again.
pub async fn cancel_request(
    state: &AppState,
    request_id: Uuid,
) -> Result<ServiceRequest, AppError> {
    let observed = state.store.get_request(request_id).await?;
    let observed_technician = observed.assigned_technician;

    let request = state
        .store
        .update_request(
            request_id,
            Box::new(move |request: &mut ServiceRequest| {
                if !matches!(
                    request.status,
                    RequestStatus::Pending | RequestStatus::Accepted
                ) {
                    return Err(StoreError::Conflict(format!(
                        "request {} cannot be cancelled once {}",
                        request.id,
                        status_label(request.status)
                    )));
                }
                if request.assigned_technician != observed_technician {
                    return Err(StoreError::Conflict(format!(
                        "request {} changed while cancelling",
                        request.id
                    )));
                }
                request.status = RequestStatus::Cancelled;
                request.assigned_technician = None;
                request.updated_at = Utc::now();
                Ok(())
            }),
        )
        .await?;

    if let Some(technician_id) = observed_technician {
        release_technician(state, technician_id, request_id).await;
    }

    state.publish(RequestEventKind::Cancelled, &request);
    info!(request_id = %request.id, "request cancelled");
    Ok(request)
}

async fn transition(
    state: &AppState,
    request_id: Uuid,
    technician_id: Uuid,
    from: RequestStatus,
    to: RequestStatus,
) -> Result<ServiceRequest, AppError> {
    let request = state
        .store
        .update_request(
            request_id,
            Box::new(move |request: &mut ServiceRequest| {
                if request.assigned_technician != Some(technician_id) {
                    return Err(StoreError::Conflict(format!(
                        "request {} is not assigned to technician {}",
                        request.id, technician_id
                    )));
                }
                if request.status != from {
                    return Err(StoreError::Conflict(format!(
                        "request {} is {}, expected {}",
                        request.id,
                        status_label(request.status),
                        status_label(from)
                    )));
                }
                request.status = to;
                request.updated_at = Utc::now();
                Ok(())
            }),
        )
        .await?;

    Ok(request)
}

/// Frees the technician only if it is still held by `request_id`.
async fn release_technician(state: &AppState, technician_id: Uuid, request_id: Uuid) {
    let released = state
        .store
        .update_technician(
            technician_id,
            Box::new(move |technician: &mut Technician| {
                if technician.active_request == Some(request_id) {
                    technician.active_request = None;
                    technician.is_available = true;
                }
                Ok(())
            }),
        )
        .await;

    if let Err(err) = released {
        warn!(technician_id = %technician_id, error = %err, "failed to release technician");
    }
}

fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Accepted => "accepted",
        RequestStatus::InProgress => "in_progress",
        RequestStatus::Completed => "completed",
        RequestStatus::Cancelled => "cancelled",
    }
}
