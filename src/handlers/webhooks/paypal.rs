//! PayPal webhook endpoint.
//!
//! Deliveries are authenticated through PayPal's verify-webhook-signature
//! API using the transmission headers, which requires a server-to-server
//! call per delivery.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;

use crate::db::AppState;
use crate::gateways::WebhookHeaders;
use crate::models::Gateway;

use super::common::{handle_webhook, ParsedWebhook, WebhookEvent, WebhookGateway, WebhookResult};

#[derive(Debug, Deserialize)]
struct PayPalWebhookBody {
    id: String,
    event_type: String,
    #[serde(default)]
    resource: serde_json::Value,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, WebhookResult> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Missing transmission headers"))
}

/// PayPal amounts are decimal strings in major units ("299.00").
fn amount_minor(resource: &serde_json::Value, pointer: &str) -> i64 {
    resource
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|major| (major * 100.0).round() as i64)
        .unwrap_or(0)
}

fn str_at(resource: &serde_json::Value, pointer: &str) -> Option<String> {
    resource
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(String::from)
}

pub struct PayPalWebhook;

impl WebhookGateway for PayPalWebhook {
    fn gateway(&self) -> Gateway {
        Gateway::Paypal
    }

    async fn verify(
        &self,
        state: &AppState,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<bool, WebhookResult> {
        let transmission = WebhookHeaders {
            transmission_id: header(headers, "paypal-transmission-id")?.to_string(),
            transmission_time: header(headers, "paypal-transmission-time")?.to_string(),
            transmission_sig: header(headers, "paypal-transmission-sig")?.to_string(),
            cert_url: header(headers, "paypal-cert-url")?.to_string(),
            auth_algo: header(headers, "paypal-auth-algo")?.to_string(),
        };

        state
            .paypal
            .verify_webhook_signature(&transmission, body)
            .await
            .map_err(|e| {
                tracing::error!("PayPal webhook verification failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Verification error")
            })
    }

    fn parse_event(&self, body: &Bytes) -> Result<ParsedWebhook, WebhookResult> {
        let parsed: PayPalWebhookBody = serde_json::from_slice(body)
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid payload"))?;

        let resource = &parsed.resource;
        let resource_id = str_at(resource, "/id").unwrap_or_default();

        let event = match parsed.event_type.as_str() {
            "PAYMENT.CAPTURE.COMPLETED" => WebhookEvent::PaymentCaptured {
                order_id: str_at(resource, "/supplementary_data/related_ids/order_id"),
                payment_id: resource_id,
            },
            // Recurring charge on a billing subscription.
            "PAYMENT.SALE.COMPLETED" => {
                let subscription_id = str_at(resource, "/billing_agreement_id")
                    .ok_or((StatusCode::BAD_REQUEST, "Missing billing_agreement_id"))?;
                WebhookEvent::RecurringCharged {
                    subscription_id,
                    payment_id: resource_id,
                    amount_minor: amount_minor(resource, "/amount/total"),
                    period_start: None,
                    period_end: None,
                }
            }
            "BILLING.SUBSCRIPTION.SUSPENDED" => WebhookEvent::AutopayRevoked {
                subscription_id: resource_id,
            },
            "BILLING.SUBSCRIPTION.CANCELLED" => WebhookEvent::SubscriptionCancelled {
                subscription_id: resource_id,
            },
            "BILLING.SUBSCRIPTION.PAYMENT.FAILED" => WebhookEvent::ChargeFailed {
                subscription_id: resource_id,
            },
            _ => WebhookEvent::Ignored,
        };

        let event_id = match event {
            WebhookEvent::Ignored => None,
            // The WH- event id is stable across redeliveries.
            _ => Some(parsed.id),
        };

        Ok(ParsedWebhook { event_id, event })
    }
}

pub async fn paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    handle_webhook(&PayPalWebhook, &state, headers, body).await
}
