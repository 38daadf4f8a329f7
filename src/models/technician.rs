use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub location: GeoPoint,
    pub is_available: bool,
    /// Request this technician accepted and has not finished yet.
    #[serde(default)]
    pub active_request: Option<Uuid>,
    pub rating: f64,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A lookup result: the technician plus great-circle distance in km.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyTechnician {
    #[serde(flatten)]
    pub technician: Technician,
    pub distance: f64,
}

/// What a customer sees of the technician assigned to their request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TechnicianSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub rating: f64,
}

impl From<&Technician> for TechnicianSummary {
    fn from(technician: &Technician) -> Self {
        Self {
            id: technician.id,
            name: technician.name.clone(),
            phone: technician.phone.clone(),
            rating: technician.rating,
        }
    }
}
