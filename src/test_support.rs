use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::request::{RequestStatus, ServiceRequest};
use crate::models::service::{ServiceKind, VehicleType};
use crate::models::technician::{GeoPoint, Technician};
use crate::payment::gateway::{GatewayError, GatewayOrder, OrderDraft, PaymentGateway};
use crate::state::AppState;
use crate::store::{MemoryStore, Store};

pub const SECRET: &str = "s3cret";

/// Records every draft and answers with `order_{n}`, or fails when
/// `fail` is set.
#[derive(Default)]
pub struct StubGateway {
    pub drafts: Mutex<Vec<OrderDraft>>,
    pub fail: bool,
}

impl StubGateway {
    pub fn failing() -> Self {
        Self {
            drafts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn drafts(&self) -> Vec<OrderDraft> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn key_id(&self) -> Option<&str> {
        Some("rzp_test_key")
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<GatewayOrder, GatewayError> {
        if self.fail {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }

        let mut drafts = self.drafts.lock().unwrap();
        drafts.push(draft.clone());
        Ok(GatewayOrder {
            id: format!("order_{}", drafts.len()),
            amount: draft.amount,
            currency: draft.currency.clone(),
            receipt: Some(draft.receipt.clone()),
            status: Some("created".to_string()),
        })
    }
}

pub fn technician(seed: u128, location: GeoPoint, rating: f64) -> Technician {
    Technician {
        id: Uuid::from_u128(seed),
        name: format!("tech-{seed}"),
        phone: None,
        location,
        is_available: true,
        active_request: None,
        rating,
        last_seen_at: Utc::now(),
        created_at: Utc::now(),
    }
}

pub fn pending_request(seed: u128) -> ServiceRequest {
    let now = Utc::now();
    ServiceRequest {
        id: Uuid::from_u128(seed),
        user_id: Some("user-1".to_string()),
        service: ServiceKind::PunctureRepair,
        vehicle_type: VehicleType::Car,
        location: GeoPoint::new(12.9716, 77.5946),
        address: "MG Road".to_string(),
        description: "Puncture Repair request".to_string(),
        status: RequestStatus::Pending,
        assigned_technician: None,
        estimated_price: Some(199.0),
        final_price: None,
        payment_status: None,
        razorpay_order_id: None,
        razorpay_payment_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub struct Fixture {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<StubGateway>,
}

pub fn fixture_with(gateway: StubGateway) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(gateway);
    let state = AppState::new(
        store.clone(),
        gateway.clone(),
        Some(SECRET.to_string()),
        16,
    );

    Fixture {
        state,
        store,
        gateway,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(StubGateway::default())
}

impl Fixture {
    pub async fn seed_technicians(&self, technicians: Vec<Technician>) {
        for technician in technicians {
            self.store.insert_technician(technician).await.unwrap();
        }
    }

    pub async fn seed_request(&self, request: ServiceRequest) -> ServiceRequest {
        self.store.insert_request(request).await.unwrap()
    }
}
