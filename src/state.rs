use std::sync::Arc;

use tokio::sync::broadcast;

use crate::models::request::{RequestEvent, RequestEventKind, ServiceRequest};
use crate::observability::metrics::Metrics;
use crate::payment::gateway::PaymentGateway;
use crate::store::Store;

pub const DEFAULT_NEARBY_CANDIDATE_LIMIT: usize = 10;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub signing_secret: Option<String>,
    pub nearby_candidate_limit: usize,
    pub request_events_tx: broadcast::Sender<RequestEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        signing_secret: Option<String>,
        event_buffer_size: usize,
    ) -> Self {
        let (request_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            store,
            gateway,
            signing_secret,
            nearby_candidate_limit: DEFAULT_NEARBY_CANDIDATE_LIMIT,
            request_events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn with_nearby_candidate_limit(mut self, limit: usize) -> Self {
        self.nearby_candidate_limit = limit;
        self
    }

    /// Fan a request change out to realtime subscribers. Having none is fine.
    pub fn publish(&self, kind: RequestEventKind, request: &ServiceRequest) {
        let _ = self.request_events_tx.send(RequestEvent {
            kind,
            request: request.clone(),
        });
    }
}
