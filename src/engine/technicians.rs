use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::technician::{GeoPoint, Technician};
use crate::state::AppState;
use crate::store::StoreError;

const DEFAULT_RATING: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct NewTechnician {
    pub name: String,
    pub phone: Option<String>,
    pub location: GeoPoint,
    pub rating: Option<f64>,
}

pub async fn register_technician(
    state: &AppState,
    new: NewTechnician,
) -> Result<Technician, AppError> {
    if new.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if !new.location.is_valid() {
        return Err(AppError::BadRequest(
            "latitude and longitude are out of range".to_string(),
        ));
    }

    let rating = new.rating.unwrap_or(DEFAULT_RATING);
    if !rating.is_finite() {
        return Err(AppError::BadRequest("rating must be a number".to_string()));
    }

    let now = Utc::now();
    let technician = Technician {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        phone: new.phone.filter(|p| !p.trim().is_empty()),
        location: new.location,
        is_available: true,
        active_request: None,
        rating: rating.clamp(0.0, 5.0),
        last_seen_at: now,
        created_at: now,
    };

    let technician = state.store.insert_technician(technician).await?;
    info!(technician_id = %technician.id, "technician registered");
    Ok(technician)
}

pub async fn get_technician(state: &AppState, id: Uuid) -> Result<Technician, AppError> {
    Ok(state.store.get_technician(id).await?)
}

pub async fn list_technicians(state: &AppState) -> Result<Vec<Technician>, AppError> {
    Ok(state.store.list_technicians().await?)
}

/// Periodic self-reported position; also refreshes presence.
pub async fn update_location(
    state: &AppState,
    id: Uuid,
    location: GeoPoint,
) -> Result<Technician, AppError> {
    if !location.is_valid() {
        return Err(AppError::BadRequest(
            "latitude and longitude are out of range".to_string(),
        ));
    }

    let technician = state
        .store
        .update_technician(
            id,
            Box::new(move |technician: &mut Technician| {
                technician.location = location;
                technician.last_seen_at = Utc::now();
                Ok(())
            }),
        )
        .await?;

    Ok(technician)
}

/// Going available is refused while the technician holds an active request.
/// The check runs inside the row update, so it cannot interleave with an
/// accept reserving the same technician.
pub async fn set_availability(
    state: &AppState,
    id: Uuid,
    is_available: bool,
) -> Result<Technician, AppError> {
    let technician = state
        .store
        .update_technician(
            id,
            Box::new(move |technician: &mut Technician| {
                if let (true, Some(request_id)) = (is_available, technician.active_request) {
                    return Err(StoreError::Conflict(format!(
                        "technician {} is still working on request {request_id}",
                        technician.id
                    )));
                }
                technician.is_available = is_available;
                technician.last_seen_at = Utc::now();
                Ok(())
            }),
        )
        .await?;

    info!(technician_id = %id, is_available, "technician availability changed");
    Ok(technician)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use std::sync::Arc;

    use super::{register_technician, set_availability, update_location, NewTechnician};
    use crate::engine::requests::{accept_request, complete_request, start_request};
    use crate::error::AppError;
    use crate::models::request::RequestStatus;
    use crate::models::technician::GeoPoint;
    use crate::store::Store;
    use crate::test_support::{fixture, pending_request, technician};

    fn new_technician(name: &str, rating: Option<f64>) -> NewTechnician {
        NewTechnician {
            name: name.to_string(),
            phone: Some("+91 98765 43210".to_string()),
            location: GeoPoint::new(12.97, 77.59),
            rating,
        }
    }

    #[tokio::test]
    async fn register_clamps_rating_and_starts_available() {
        let fixture = fixture();
        let technician = register_technician(&fixture.state, new_technician("Ravi", Some(9.0)))
            .await
            .unwrap();

        assert_eq!(technician.rating, 5.0);
        assert!(technician.is_available);
    }

    #[tokio::test]
    async fn register_rejects_blank_name() {
        let fixture = fixture();
        let result = register_technician(&fixture.state, new_technician("  ", None)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn location_push_moves_technician_and_refreshes_presence() {
        let fixture = fixture();
        let technician = register_technician(&fixture.state, new_technician("Ravi", None))
            .await
            .unwrap();

        let moved = update_location(&fixture.state, technician.id, GeoPoint::new(13.0, 77.6))
            .await
            .unwrap();

        assert_eq!(moved.location, GeoPoint::new(13.0, 77.6));
        assert!(moved.last_seen_at >= technician.last_seen_at);
    }

    #[tokio::test]
    async fn location_push_for_unknown_technician_is_not_found() {
        let fixture = fixture();
        let result =
            update_location(&fixture.state, Uuid::from_u128(7), GeoPoint::new(13.0, 77.6)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn cannot_go_available_with_active_request() {
        let fixture = fixture();
        let technician = register_technician(&fixture.state, new_technician("Ravi", None))
            .await
            .unwrap();
        let request = fixture.seed_request(pending_request(1)).await;
        accept_request(&fixture.state, request.id, technician.id)
            .await
            .unwrap();

        let result = set_availability(&fixture.state, technician.id, true).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let off = set_availability(&fixture.state, technician.id, false)
            .await
            .unwrap();
        assert!(!off.is_available);
    }

    #[tokio::test]
    async fn going_available_again_is_allowed_after_completion() {
        let fixture = fixture();
        let technician = register_technician(&fixture.state, new_technician("Ravi", None))
            .await
            .unwrap();
        let request = fixture.seed_request(pending_request(1)).await;
        accept_request(&fixture.state, request.id, technician.id)
            .await
            .unwrap();
        start_request(&fixture.state, request.id, technician.id)
            .await
            .unwrap();
        complete_request(&fixture.state, request.id, technician.id)
            .await
            .unwrap();

        let back = set_availability(&fixture.state, technician.id, true)
            .await
            .unwrap();
        assert!(back.is_available);
        assert!(back.active_request.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn availability_toggle_never_frees_a_technician_mid_accept() {
        for round in 0..50u128 {
            let fixture = fixture();
            fixture
                .seed_technicians(vec![technician(100, GeoPoint::new(12.9, 77.6), 4.5)])
                .await;
            let request = fixture.seed_request(pending_request(round + 1)).await;
            let tech_id = Uuid::from_u128(100);

            let state = Arc::new(fixture.state);
            let accept = {
                let state = state.clone();
                tokio::spawn(async move { accept_request(&state, request.id, tech_id).await })
            };
            let toggle = {
                let state = state.clone();
                tokio::spawn(async move { set_availability(&state, tech_id, true).await })
            };
            let _ = accept.await.unwrap();
            let _ = toggle.await.unwrap();

            let stored = fixture.store.get_request(request.id).await.unwrap();
            let tech = fixture.store.get_technician(tech_id).await.unwrap();
            if stored.status == RequestStatus::Accepted {
                assert!(!tech.is_available, "round {round}: busy technician marked available");
                assert_eq!(tech.active_request, Some(request.id));
            }
        }
    }
}
