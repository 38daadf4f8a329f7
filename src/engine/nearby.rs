use tracing::{debug, error};

use crate::error::AppError;
use crate::geo::{haversine_km, BoundingBox};
use crate::models::technician::{GeoPoint, NearbyTechnician, Technician};
use crate::state::AppState;

pub const DEFAULT_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct NearbyQuery {
    pub origin: GeoPoint,
    pub radius_km: f64,
}

impl NearbyQuery {
    /// Zero coordinates count as missing, as do absent ones.
    pub fn parse(
        lat: Option<f64>,
        lon: Option<f64>,
        radius_km: Option<f64>,
    ) -> Result<Self, AppError> {
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => (lat, lon),
            _ => {
                return Err(AppError::BadRequest(
                    "latitude and longitude are required".to_string(),
                ));
            }
        };

        let origin = GeoPoint::new(lat, lon);
        if !origin.is_valid() {
            return Err(AppError::BadRequest(
                "latitude and longitude are out of range".to_string(),
            ));
        }

        let radius_km = radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AppError::BadRequest("radius must be > 0".to_string()));
        }

        Ok(Self { origin, radius_km })
    }
}

/// Closest available technicians, nearest first.
///
/// The store pre-filters with a bounding box and returns at most
/// `candidate_limit` technicians by rating; anything beyond the true radius
/// is then dropped.
pub async fn find_nearby(
    state: &AppState,
    query: NearbyQuery,
) -> Result<Vec<NearbyTechnician>, AppError> {
    let bbox = BoundingBox::around(&query.origin, query.radius_km);

    let candidates = match state
        .store
        .available_in_box(&bbox, state.nearby_candidate_limit)
        .await
    {
        Ok(candidates) => candidates,
        Err(err) => {
            state
                .metrics
                .nearby_lookups_total
                .with_label_values(&["error"])
                .inc();
            error!(error = %err, "nearby technician query failed");
            return Err(err.into());
        }
    };

    let candidate_count = candidates.len();
    let nearby = rank_by_distance(&query, candidates);

    debug!(
        candidates = candidate_count,
        within_radius = nearby.len(),
        radius_km = query.radius_km,
        "nearby lookup"
    );

    state
        .metrics
        .nearby_lookups_total
        .with_label_values(&[if nearby.is_empty() { "empty" } else { "found" }])
        .inc();

    Ok(nearby)
}

fn rank_by_distance(
    query: &NearbyQuery,
    candidates: Vec<Technician>,
) -> Vec<NearbyTechnician> {
    let mut nearby: Vec<NearbyTechnician> = candidates
        .into_iter()
        .map(|technician| {
            let distance = haversine_km(&query.origin, &technician.location);
            NearbyTechnician {
                technician,
                distance,
            }
        })
        .filter(|candidate| candidate.distance <= query.radius_km)
        .collect();

    nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    nearby
}
