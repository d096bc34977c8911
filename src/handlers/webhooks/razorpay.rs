//! Razorpay webhook endpoint.
//!
//! Deliveries are authenticated with an HMAC-SHA256 over the raw body
//! carried in `x-razorpay-signature`; a mismatch is a hard 401.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;

use crate::db::AppState;
use crate::models::Gateway;

use super::common::{handle_webhook, ParsedWebhook, WebhookEvent, WebhookGateway, WebhookResult};

#[derive(Debug, Deserialize)]
struct RazorpayWebhookBody {
    event: String,
    #[serde(default)]
    payload: RazorpayPayload,
}

#[derive(Debug, Default, Deserialize)]
struct RazorpayPayload {
    payment: Option<Entity<PaymentEntity>>,
    subscription: Option<Entity<SubscriptionEntity>>,
}

#[derive(Debug, Deserialize)]
struct Entity<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionEntity {
    id: String,
    current_start: Option<i64>,
    current_end: Option<i64>,
}

pub struct RazorpayWebhook;

impl WebhookGateway for RazorpayWebhook {
    fn gateway(&self) -> Gateway {
        Gateway::Razorpay
    }

    async fn verify(
        &self,
        state: &AppState,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<bool, WebhookResult> {
        let signature = headers
            .get("x-razorpay-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing signature header"))?;

        state
            .razorpay
            .verify_webhook_signature(body, signature)
            .map_err(|e| {
                tracing::error!("Webhook signature check failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Verification error")
            })
    }

    fn parse_event(&self, body: &Bytes) -> Result<ParsedWebhook, WebhookResult> {
        let parsed: RazorpayWebhookBody = serde_json::from_slice(body)
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid payload"))?;

        let payment = parsed.payload.payment.map(|p| p.entity);
        let subscription = parsed.payload.subscription.map(|s| s.entity);

        // Razorpay has no top-level event id; the payment id (or the
        // event+subscription pair) serves as the dedupe key.
        let event = match parsed.event.as_str() {
            "payment.captured" => {
                let payment =
                    payment.ok_or((StatusCode::BAD_REQUEST, "Missing payment entity"))?;
                WebhookEvent::PaymentCaptured {
                    order_id: payment.order_id,
                    payment_id: payment.id,
                }
            }
            "subscription.charged" => {
                let payment =
                    payment.ok_or((StatusCode::BAD_REQUEST, "Missing payment entity"))?;
                let subscription =
                    subscription.ok_or((StatusCode::BAD_REQUEST, "Missing subscription entity"))?;
                WebhookEvent::RecurringCharged {
                    subscription_id: subscription.id,
                    payment_id: payment.id,
                    amount_minor: payment.amount.unwrap_or(0),
                    period_start: subscription.current_start,
                    period_end: subscription.current_end,
                }
            }
            "subscription.paused" => {
                let subscription =
                    subscription.ok_or((StatusCode::BAD_REQUEST, "Missing subscription entity"))?;
                WebhookEvent::AutopayRevoked {
                    subscription_id: subscription.id,
                }
            }
            "subscription.cancelled" => {
                let subscription =
                    subscription.ok_or((StatusCode::BAD_REQUEST, "Missing subscription entity"))?;
                WebhookEvent::SubscriptionCancelled {
                    subscription_id: subscription.id,
                }
            }
            // pending and halted both mean the recurring charge is failing.
            "subscription.pending" | "subscription.halted" => {
                let subscription =
                    subscription.ok_or((StatusCode::BAD_REQUEST, "Missing subscription entity"))?;
                WebhookEvent::ChargeFailed {
                    subscription_id: subscription.id,
                }
            }
            _ => WebhookEvent::Ignored,
        };

        // Status transitions (paused/cancelled/failed) are idempotent to
        // re-apply, so only payment-bearing events need a dedupe id.
        let event_id = match &event {
            WebhookEvent::PaymentCaptured { payment_id, .. }
            | WebhookEvent::RecurringCharged { payment_id, .. } => {
                Some(format!("{}:{}", parsed.event, payment_id))
            }
            _ => None,
        };

        Ok(ParsedWebhook { event_id, event })
    }
}

pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    handle_webhook(&RazorpayWebhook, &state, headers, body).await
}
