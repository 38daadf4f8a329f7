use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub const CURRENCY: &str = "INR";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway keys not configured")]
    NotConfigured,

    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected the order ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected payment gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderNotes {
    pub request_id: String,
}

/// Body of an order-create call. `amount` is in minor units (paise).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderDraft {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the checkout client.
    fn key_id(&self) -> Option<&str>;

    async fn create_order(&self, draft: &OrderDraft) -> Result<GatewayOrder, GatewayError>;
}

/// Converts a major-unit amount to the gateway's integer minor units.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// `rcpt_{last 10 digits of unix millis}_{first 8 chars of request id}`.
///
/// Only for gateway-side traceability; not unique under concurrent calls.
pub fn receipt_for(request_id: &str, unix_millis: i64) -> String {
    let millis = unix_millis.to_string();
    let tail = &millis[millis.len().saturating_sub(10)..];
    let prefix: String = request_id.chars().take(8).collect();
    format!("rcpt_{tail}_{prefix}")
}

#[derive(Debug, Clone)]
pub struct RazorpayCredentials {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Deserialize)]
struct RazorpayErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Razorpay-compatible orders API over HTTPS with basic auth.
pub struct RazorpayGateway {
    credentials: Option<RazorpayCredentials>,
    api_base: String,
    client: Client,
}

impl RazorpayGateway {
    pub fn new(
        credentials: Option<RazorpayCredentials>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Transport(format!("failed to build client: {err}")))?;

        Ok(Self {
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub(crate) fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.api_base)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.key_id.as_str())
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<GatewayOrder, GatewayError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(GatewayError::NotConfigured)?;

        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&credentials.key_id, Some(&credentials.key_secret))
            .header(ACCEPT, "application/json")
            .json(draft)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, url = %self.orders_url(), "order request failed to send");
                GatewayError::Transport(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<RazorpayErrorBody>().await {
                Ok(body) => {
                    error!(
                        status = %status,
                        code = body.error.code.as_deref().unwrap_or("unknown"),
                        "gateway rejected order"
                    );
                    body.error
                        .description
                        .unwrap_or_else(|| "order creation failed".to_string())
                }
                Err(_) => {
                    error!(status = %status, "gateway rejected order with unparsable body");
                    "order creation failed".to_string()
                }
            };

            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}
