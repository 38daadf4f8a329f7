use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::BoundingBox;
use crate::models::request::ServiceRequest;
use crate::models::technician::Technician;
use crate::store::{
    RequestFilter, RequestMutation, RequestOrder, Store, StoreError, StoreResult,
    TechnicianMutation,
};

/// In-process store backed by sharded concurrent maps.
///
/// Each update holds the row's shard lock for the whole read-modify-write,
/// so two concurrent conditional updates on the same row serialize and the
/// second one sees the first one's result.
#[derive(Default)]
pub struct MemoryStore {
    requests: DashMap<Uuid, ServiceRequest>,
    technicians: DashMap<Uuid, Technician>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_request(&self, request: ServiceRequest) -> StoreResult<ServiceRequest> {
        if self.requests.contains_key(&request.id) {
            return Err(StoreError::Conflict(format!(
                "request {} already exists",
                request.id
            )));
        }

        self.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<ServiceRequest> {
        self.requests
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(format!("request {id} not found")))
    }

    async fn list_requests(&self, filter: RequestFilter) -> StoreResult<Vec<ServiceRequest>> {
        let mut requests: Vec<ServiceRequest> = self
            .requests
            .iter()
            .filter(|entry| {
                let request = entry.value();
                filter
                    .user_id
                    .as_ref()
                    .is_none_or(|user| request.user_id.as_ref() == Some(user))
                    && filter.status.is_none_or(|status| request.status == status)
                    && filter
                        .assigned_to
                        .is_none_or(|tech| request.assigned_technician == Some(tech))
                    && (!filter.unassigned_only || request.assigned_technician.is_none())
            })
            .map(|entry| entry.value().clone())
            .collect();

        match filter.order {
            RequestOrder::NewestFirst => requests.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            RequestOrder::OldestFirst => requests.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }

        if let Some(limit) = filter.limit {
            requests.truncate(limit);
        }

        Ok(requests)
    }

    async fn update_request(
        &self,
        id: Uuid,
        mutation: RequestMutation,
    ) -> StoreResult<ServiceRequest> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("request {id} not found")))?;

        let mut updated = entry.value().clone();
        mutation(&mut updated)?;
        *entry = updated.clone();

        Ok(updated)
    }

    async fn insert_technician(&self, technician: Technician) -> StoreResult<Technician> {
        if self.technicians.contains_key(&technician.id) {
            return Err(StoreError::Conflict(format!(
                "technician {} already exists",
                technician.id
            )));
        }

        self.technicians.insert(technician.id, technician.clone());
        Ok(technician)
    }

    async fn get_technician(&self, id: Uuid) -> StoreResult<Technician> {
        self.technicians
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(format!("technician {id} not found")))
    }

    async fn list_technicians(&self) -> StoreResult<Vec<Technician>> {
        let mut technicians: Vec<Technician> = self
            .technicians
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        technicians.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(technicians)
    }

    async fn update_technician(
        &self,
        id: Uuid,
        mutation: TechnicianMutation,
    ) -> StoreResult<Technician> {
        let mut entry = self
            .technicians
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("technician {id} not found")))?;

        let mut updated = entry.value().clone();
        mutation(&mut updated)?;
        *entry = updated.clone();

        Ok(updated)
    }

    async fn available_in_box(
        &self,
        bbox: &BoundingBox,
        limit: usize,
    ) -> StoreResult<Vec<Technician>> {
        let mut candidates: Vec<Technician> = self
            .technicians
            .iter()
            .filter_map(|entry| {
                let technician = entry.value();
                if technician.is_available && bbox.contains(&technician.location) {
                    Some(technician.clone())
                } else {
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        candidates.truncate(limit);

        Ok(candidates)
    }
}
