use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::extract::ApiJson;
use crate::error::AppError;
use crate::payment::{self, AmountInput, VerifyPayment};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payment/create-order", post(create_order))
        .route("/payment/verify", post(verify_payment))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub request_id: Option<String>,
    pub amount: Option<AmountInput>,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: f64,
    pub currency: &'static str,
    pub key: String,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: &'static str,
    pub already_verified: bool,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let created = payment::create_order(
        &state,
        payload.request_id.as_deref(),
        payload.amount.as_ref(),
    )
    .await?;

    Ok(Json(CreateOrderResponse {
        order_id: created.order_id,
        amount: created.amount,
        currency: created.currency,
        key: created.key,
    }))
}

async fn verify_payment(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let verification = payment::verify_payment(
        &state,
        VerifyPayment {
            order_id: payload.razorpay_order_id,
            payment_id: payload.razorpay_payment_id,
            signature: payload.razorpay_signature,
            request_id: payload.request_id,
        },
    )
    .await?;

    let message = if verification.already_verified {
        "Payment already verified"
    } else {
        "Payment verified successfully"
    };

    Ok(Json(VerifyPaymentResponse {
        success: true,
        status: "success",
        message,
        already_verified: verification.already_verified,
    }))
}
