//! Payment order reconciliation.
//!
//! `payment_status` only moves forward: unset, then pending once a gateway
//! order exists, then paid once a signed callback has been verified. The
//! request id is the key for every write.

pub mod gateway;
pub mod signature;

use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::{PaymentStatus, RequestEventKind, ServiceRequest};
use crate::state::AppState;
use crate::store::StoreError;

use gateway::{receipt_for, to_minor_units, OrderDraft, OrderNotes, CURRENCY};

/// Amounts arrive either as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn to_major_units(&self) -> Result<f64, AppError> {
        let amount = match self {
            AmountInput::Number(value) => *value,
            AmountInput::Text(raw) => raw.trim().parse::<f64>().unwrap_or(f64::NAN),
        };

        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::BadRequest("invalid amount".to_string()));
        }
        // minor units must fit the gateway's integer amount
        if amount * 100.0 >= i64::MAX as f64 {
            return Err(AppError::BadRequest("amount is too large".to_string()));
        }

        Ok(amount)
    }
}

#[derive(Debug, Clone)]
pub struct OrderCreated {
    pub order_id: String,
    pub amount: f64,
    pub currency: &'static str,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct VerifyPayment {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub already_verified: bool,
    pub request: ServiceRequest,
}

pub async fn create_order(
    state: &AppState,
    request_id: Option<&str>,
    amount: Option<&AmountInput>,
) -> Result<OrderCreated, AppError> {
    let (request_id, amount) = match (request_id.map(str::trim), amount) {
        (Some(id), Some(amount)) if !id.is_empty() => (id, amount),
        _ => {
            return Err(AppError::BadRequest(
                "request_id and amount are required".to_string(),
            ));
        }
    };

    let amount = amount.to_major_units()?;
    let id = parse_request_id(request_id)?;

    let request = state.store.get_request(id).await?;
    if request.payment_status == Some(PaymentStatus::Paid) {
        return Err(AppError::Conflict(format!("request {id} is already paid")));
    }

    let key = state
        .gateway
        .key_id()
        .map(str::to_string)
        .ok_or(gateway::GatewayError::NotConfigured)?;

    let draft = OrderDraft {
        amount: to_minor_units(amount),
        currency: CURRENCY.to_string(),
        receipt: receipt_for(request_id, Utc::now().timestamp_millis()),
        notes: OrderNotes {
            request_id: request_id.to_string(),
        },
    };

    let start = Instant::now();
    let order = match state.gateway.create_order(&draft).await {
        Ok(order) => {
            observe_gateway(state, "success", start);
            order
        }
        Err(err) => {
            observe_gateway(state, "error", start);
            state
                .metrics
                .payment_orders_total
                .with_label_values(&["gateway_error"])
                .inc();
            error!(request_id = %id, error = %err, "gateway order creation failed");
            return Err(err.into());
        }
    };

    // A failed write is logged only; verification refuses an unrecorded order.
    let order_id = order.id.clone();
    let recorded = state
        .store
        .update_request(
            id,
            Box::new(move |request: &mut ServiceRequest| {
                if request.payment_status == Some(PaymentStatus::Paid) {
                    return Err(StoreError::Conflict(format!(
                        "request {} was paid concurrently",
                        request.id
                    )));
                }
                request.razorpay_order_id = Some(order_id);
                request.payment_status = Some(PaymentStatus::Pending);
                request.final_price = Some(amount);
                request.updated_at = Utc::now();
                Ok(())
            }),
        )
        .await;

    match recorded {
        Ok(request) => state.publish(RequestEventKind::PaymentPending, &request),
        Err(err) => {
            state
                .metrics
                .payment_orders_total
                .with_label_values(&["record_failed"])
                .inc();
            error!(
                request_id = %id,
                order_id = %order.id,
                error = %err,
                "failed to record payment order on request"
            );
        }
    }

    state
        .metrics
        .payment_orders_total
        .with_label_values(&["created"])
        .inc();
    info!(
        request_id = %id,
        order_id = %order.id,
        amount_minor = draft.amount,
        "payment order created"
    );

    Ok(OrderCreated {
        order_id: order.id,
        amount,
        currency: CURRENCY,
        key,
    })
}

pub async fn verify_payment(
    state: &AppState,
    input: VerifyPayment,
) -> Result<Verification, AppError> {
    let (order_id, payment_id, supplied_signature, request_id) = match (
        non_blank(input.order_id),
        non_blank(input.payment_id),
        non_blank(input.signature),
        non_blank(input.request_id),
    ) {
        (Some(order_id), Some(payment_id), Some(supplied), Some(request_id)) => {
            (order_id, payment_id, supplied, request_id)
        }
        _ => {
            return Err(AppError::BadRequest(
                "missing required payment fields".to_string(),
            ));
        }
    };

    let secret = state
        .signing_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal("payment key secret not configured".to_string()))?;

    let id = parse_request_id(&request_id)?;

    if !signature::verify(secret, &order_id, &payment_id, &supplied_signature)? {
        count_verification(state, "rejected");
        warn!(request_id = %id, order_id = %order_id, "invalid payment signature");
        return Err(AppError::VerificationFailed(
            "invalid payment signature".to_string(),
        ));
    }

    // The callback must carry the order created for this very request.
    let current = state.store.get_request(id).await?;
    if let Some(mismatch) = order_mismatch(&current, &order_id) {
        count_verification(state, "rejected");
        warn!(request_id = %id, order_id = %order_id, "payment order does not match request");
        return Err(mismatch);
    }
    if current.payment_status == Some(PaymentStatus::Paid) {
        count_verification(state, "already_verified");
        info!(request_id = %id, "payment already verified");
        return Ok(Verification {
            already_verified: true,
            request: current,
        });
    }

    let expected_order = order_id.clone();
    let paid = state
        .store
        .update_request(
            id,
            Box::new(move |request: &mut ServiceRequest| {
                if request.payment_status != Some(PaymentStatus::Pending) {
                    return Err(StoreError::Conflict("payment is not pending".to_string()));
                }
                if request.razorpay_order_id.as_deref() != Some(expected_order.as_str()) {
                    return Err(StoreError::Conflict("order replaced".to_string()));
                }
                request.razorpay_payment_id = Some(payment_id);
                request.payment_status = Some(PaymentStatus::Paid);
                request.updated_at = Utc::now();
                Ok(())
            }),
        )
        .await;

    match paid {
        Ok(request) => {
            count_verification(state, "verified");
            state.publish(RequestEventKind::PaymentVerified, &request);
            info!(request_id = %id, order_id = %order_id, "payment verified");
            Ok(Verification {
                already_verified: false,
                request,
            })
        }
        Err(StoreError::Conflict(_)) => {
            // lost a race with another write; report what is stored now
            let current = state.store.get_request(id).await?;
            if let Some(mismatch) = order_mismatch(&current, &order_id) {
                count_verification(state, "rejected");
                return Err(mismatch);
            }
            if current.payment_status == Some(PaymentStatus::Paid) {
                count_verification(state, "already_verified");
                return Ok(Verification {
                    already_verified: true,
                    request: current,
                });
            }
            count_verification(state, "rejected");
            Err(AppError::Conflict(format!(
                "request {id} changed during verification"
            )))
        }
        Err(err) => {
            count_verification(state, "error");
            error!(request_id = %id, error = %err, "failed to mark request paid");
            Err(err.into())
        }
    }
}

/// A request without a recorded order, or with a different one, cannot be
/// settled by this callback.
fn order_mismatch(request: &ServiceRequest, order_id: &str) -> Option<AppError> {
    match request.razorpay_order_id.as_deref() {
        Some(stored) if stored == order_id => None,
        Some(_) => Some(AppError::VerificationFailed(
            "payment order does not match request".to_string(),
        )),
        None => Some(AppError::VerificationFailed(
            "no payment order recorded for request".to_string(),
        )),
    }
}

fn parse_request_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("invalid request_id: {raw}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn observe_gateway(state: &AppState, outcome: &str, start: Instant) {
    state
        .metrics
        .gateway_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
}

fn count_verification(state: &AppState, outcome: &str) {
    state
        .metrics
        .payment_verifications_total
        .with_label_values(&[outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{create_order, verify_payment, AmountInput, VerifyPayment};
    use crate::error::AppError;
    use crate::models::request::PaymentStatus;
    use crate::payment::signature::sign;
    use crate::store::Store;
    use crate::test_support::{fixture, fixture_with, pending_request, StubGateway, SECRET};

    fn request_key(seed: u128) -> String {
        Uuid::from_u128(seed).to_string()
    }

    fn verify_input(
        order_id: &str,
        payment_id: &str,
        signature: &str,
        seed: u128,
    ) -> VerifyPayment {
        VerifyPayment {
            order_id: Some(order_id.to_string()),
            payment_id: Some(payment_id.to_string()),
            signature: Some(signature.to_string()),
            request_id: Some(request_key(seed)),
        }
    }

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(AmountInput::Number(500.0).to_major_units().unwrap(), 500.0);
        assert_eq!(
            AmountInput::Text(" 249.50 ".to_string()).to_major_units().unwrap(),
            249.5
        );
    }

    #[test]
    fn amount_rejects_non_positive_and_garbage() {
        for input in [
            AmountInput::Number(0.0),
            AmountInput::Number(-10.0),
            AmountInput::Number(f64::INFINITY),
            AmountInput::Text("abc".to_string()),
            AmountInput::Text("".to_string()),
            AmountInput::Number(1e20),
            AmountInput::Text("100000000000000000000".to_string()),
        ] {
            assert!(matches!(input.to_major_units(), Err(AppError::BadRequest(_))));
        }
    }

    #[tokio::test]
    async fn create_order_sends_minor_units_and_records_order() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;

        let created = create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(500.0)),
        )
        .await
        .unwrap();

        assert_eq!(created.order_id, "order_1");
        assert_eq!(created.amount, 500.0);
        assert_eq!(created.currency, "INR");
        assert_eq!(created.key, "rzp_test_key");

        let drafts = fixture.gateway.drafts();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, 50_000);
        assert_eq!(drafts[0].currency, "INR");
        assert!(drafts[0].receipt.starts_with("rcpt_"));
        assert!(drafts[0].receipt.ends_with("_00000000"));
        assert_eq!(drafts[0].notes.request_id, request_key(1));

        let stored = fixture.store.get_request(Uuid::from_u128(1)).await.unwrap();
        assert_eq!(stored.razorpay_order_id.as_deref(), Some("order_1"));
        assert_eq!(stored.payment_status, Some(PaymentStatus::Pending));
        assert_eq!(stored.final_price, Some(500.0));
    }

    #[tokio::test]
    async fn create_order_requires_both_fields() {
        let fixture = fixture();
        let missing_amount = create_order(&fixture.state, Some(&request_key(1)), None).await;
        let missing_id =
            create_order(&fixture.state, Some(" "), Some(&AmountInput::Number(1.0))).await;

        assert!(matches!(missing_amount, Err(AppError::BadRequest(_))));
        assert!(matches!(missing_id, Err(AppError::BadRequest(_))));
        assert!(fixture.gateway.drafts().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_leaves_request_unchanged() {
        let fixture = fixture_with(StubGateway::failing());
        fixture.seed_request(pending_request(1)).await;

        let result = create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(500.0)),
        )
        .await;

        assert!(matches!(result, Err(AppError::Gateway(_))));
        let stored = fixture.store.get_request(Uuid::from_u128(1)).await.unwrap();
        assert!(stored.payment_status.is_none());
        assert!(stored.razorpay_order_id.is_none());
    }

    #[tokio::test]
    async fn verify_marks_request_paid() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;
        create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(500.0)),
        )
        .await
        .unwrap();

        let signature = sign(SECRET, "order_1", "pay_1").unwrap();
        let input = verify_input("order_1", "pay_1", &signature, 1);
        let verification = verify_payment(&fixture.state, input).await.unwrap();

        assert!(!verification.already_verified);
        assert_eq!(verification.request.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(verification.request.razorpay_payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn bad_signature_changes_nothing() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;

        let mut signature = sign(SECRET, "order_1", "pay_1").unwrap();
        let last = if signature.ends_with('0') { "1" } else { "0" };
        signature.replace_range(63..64, last);

        let result =
            verify_payment(&fixture.state, verify_input("order_1", "pay_1", &signature, 1)).await;

        assert!(matches!(result, Err(AppError::VerificationFailed(_))));
        let stored = fixture.store.get_request(Uuid::from_u128(1)).await.unwrap();
        assert!(stored.payment_status.is_none());
        assert!(stored.razorpay_payment_id.is_none());
    }

    #[tokio::test]
    async fn verify_rejects_order_from_another_request() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;
        create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(100.0)),
        )
        .await
        .unwrap();

        let signature = sign(SECRET, "order_999", "pay_1").unwrap();
        let result =
            verify_payment(&fixture.state, verify_input("order_999", "pay_1", &signature, 1)).await;

        assert!(matches!(result, Err(AppError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn repeat_verification_is_a_safe_no_op() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;
        create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(500.0)),
        )
        .await
        .unwrap();

        let signature = sign(SECRET, "order_1", "pay_1").unwrap();
        let input = verify_input("order_1", "pay_1", &signature, 1);
        let first = verify_payment(&fixture.state, input.clone()).await.unwrap();
        let second = verify_payment(&fixture.state, input).await.unwrap();

        assert!(!first.already_verified);
        assert!(second.already_verified);
        assert_eq!(second.request.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(second.request.razorpay_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(second.request.updated_at, first.request.updated_at);
    }

    #[tokio::test]
    async fn paid_request_refuses_new_order() {
        let fixture = fixture();
        let mut request = pending_request(1);
        request.payment_status = Some(PaymentStatus::Paid);
        fixture.seed_request(request).await;

        let result = create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(500.0)),
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(fixture.gateway.drafts().is_empty());
    }

    #[tokio::test]
    async fn verify_requires_every_field() {
        let fixture = fixture();
        let mut input = verify_input("order_1", "pay_1", "sig", 1);
        input.signature = None;

        let result = verify_payment(&fixture.state, input).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn callback_for_another_requests_order_is_rejected() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;
        fixture.seed_request(pending_request(2)).await;
        create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(49.0)),
        )
        .await
        .unwrap();

        let signature = sign(SECRET, "order_1", "pay_1").unwrap();
        let result =
            verify_payment(&fixture.state, verify_input("order_1", "pay_1", &signature, 2)).await;

        assert!(matches!(result, Err(AppError::VerificationFailed(_))));
        let other = fixture.store.get_request(Uuid::from_u128(2)).await.unwrap();
        assert!(other.payment_status.is_none());
        assert!(other.razorpay_order_id.is_none());
        assert!(other.razorpay_payment_id.is_none());

        let own = fixture.store.get_request(Uuid::from_u128(1)).await.unwrap();
        assert_eq!(own.payment_status, Some(PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn paid_request_rejects_callback_for_a_different_order() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;
        create_order(
            &fixture.state,
            Some(&request_key(1)),
            Some(&AmountInput::Number(500.0)),
        )
        .await
        .unwrap();
        let signature = sign(SECRET, "order_1", "pay_1").unwrap();
        verify_payment(&fixture.state, verify_input("order_1", "pay_1", &signature, 1))
            .await
            .unwrap();

        let foreign = sign(SECRET, "order_7", "pay_7").unwrap();
        let result =
            verify_payment(&fixture.state, verify_input("order_7", "pay_7", &foreign, 1)).await;

        assert!(matches!(result, Err(AppError::VerificationFailed(_))));
        let stored = fixture.store.get_request(Uuid::from_u128(1)).await.unwrap();
        assert_eq!(stored.razorpay_payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn verify_without_recorded_order_fails() {
        let fixture = fixture();
        fixture.seed_request(pending_request(1)).await;

        let signature = sign(SECRET, "order_1", "pay_1").unwrap();
        let result =
            verify_payment(&fixture.state, verify_input("order_1", "pay_1", &signature, 1)).await;

        assert!(matches!(result, Err(AppError::VerificationFailed(_))));
        let stored = fixture.store.get_request(Uuid::from_u128(1)).await.unwrap();
        assert!(stored.payment_status.is_none());
    }
}
