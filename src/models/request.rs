use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::service::{ServiceKind, VehicleType};
use crate::models::technician::{GeoPoint, TechnicianSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Statuses that keep the assigned technician busy.
    pub fn is_active(self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::InProgress)
    }
}

/// `None` on the request means no order has been created yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub service: ServiceKind,
    pub vehicle_type: VehicleType,
    pub location: GeoPoint,
    pub address: String,
    pub description: String,
    pub status: RequestStatus,
    pub assigned_technician: Option<Uuid>,
    pub estimated_price: Option<f64>,
    pub final_price: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer's view of a request, with the assigned technician's contact
/// details inlined.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerRequest {
    #[serde(flatten)]
    pub request: ServiceRequest,
    pub technician: Option<TechnicianSummary>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestEventKind {
    Created,
    Accepted,
    Started,
    Completed,
    Cancelled,
    PaymentPending,
    PaymentVerified,
}

/// Broadcast to realtime subscribers after every request mutation.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    pub kind: RequestEventKind,
    pub request: ServiceRequest,
}
