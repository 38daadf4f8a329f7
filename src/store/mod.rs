//! Persistence boundary.
//!
//! Handlers only see the [`Store`] trait. Row mutations are closures run by the
//! store as a single atomic read-modify-write: if the closure returns an error
//! the row is left untouched, which is how conditional updates (accept,
//! start, complete) are expressed.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::geo::BoundingBox;
use crate::models::request::{RequestStatus, ServiceRequest};
use crate::models::technician::Technician;

pub use memory::MemoryStore;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type RequestMutation = Box<dyn FnOnce(&mut ServiceRequest) -> StoreResult<()> + Send>;
pub type TechnicianMutation = Box<dyn FnOnce(&mut Technician) -> StoreResult<()> + Send>;

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub user_id: Option<String>,
    pub status: Option<RequestStatus>,
    pub assigned_to: Option<Uuid>,
    pub unassigned_only: bool,
    pub order: RequestOrder,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_request(&self, request: ServiceRequest) -> StoreResult<ServiceRequest>;

    async fn get_request(&self, id: Uuid) -> StoreResult<ServiceRequest>;

    async fn list_requests(&self, filter: RequestFilter) -> StoreResult<Vec<ServiceRequest>>;

    async fn update_request(
        &self,
        id: Uuid,
        mutation: RequestMutation,
    ) -> StoreResult<ServiceRequest>;

    async fn insert_technician(&self, technician: Technician) -> StoreResult<Technician>;

    async fn get_technician(&self, id: Uuid) -> StoreResult<Technician>;

    async fn list_technicians(&self) -> StoreResult<Vec<Technician>>;

    async fn update_technician(
        &self,
        id: Uuid,
        mutation: TechnicianMutation,
    ) -> StoreResult<Technician>;

    /// Available technicians inside `bbox`, best rated first, at most `limit`.
    async fn available_in_box(
        &self,
        bbox: &BoundingBox,
        limit: usize,
    ) -> StoreResult<Vec<Technician>>;
}
