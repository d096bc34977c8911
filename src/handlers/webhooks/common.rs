//! Gateway-agnostic webhook dispatch.
//!
//! Each gateway implements `WebhookGateway` for signature checking and
//! payload parsing; the transitions themselves are shared. Every path is
//! safe under redelivery: event ids are claimed in `webhook_events` inside
//! the same transaction as the mutation (a failure rolls the claim back, so
//! the gateway's redelivery gets a clean retry), and recurring charges
//! additionally dedupe on the gateway payment id.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
};
use tracing::{error, info, warn};

use crate::billing;
use crate::db::{queries, AppState};
use crate::models::{Gateway, PaymentStatus, Subscription};

/// Response tuple for webhook endpoints. Gateways only care about the status
/// code; the message is for their delivery logs.
pub type WebhookResult = (StatusCode, &'static str);

/// Provider-agnostic webhook event.
#[derive(Debug)]
pub enum WebhookEvent {
    /// One-time payment captured. Mentor payments are matched first (by
    /// order id, falling back to payment id); otherwise the matching
    /// payment transaction is marked success.
    PaymentCaptured {
        order_id: Option<String>,
        payment_id: String,
    },
    /// Successful recurring charge on a subscription mandate.
    RecurringCharged {
        subscription_id: String,
        payment_id: String,
        amount_minor: i64,
        /// Authoritative period bounds when the payload carries them;
        /// otherwise the dispatcher fetches them from the gateway.
        period_start: Option<i64>,
        period_end: Option<i64>,
    },
    /// Bank or payer-initiated mandate revocation (subscription paused).
    AutopayRevoked { subscription_id: String },
    /// Gateway-side subscription cancellation.
    SubscriptionCancelled { subscription_id: String },
    /// Recurring charge attempt failed.
    ChargeFailed { subscription_id: String },
    /// Event type not relevant to subscription records.
    Ignored,
}

/// Parsed webhook delivery: the gateway's event id (for replay dedupe) plus
/// the normalized event.
#[derive(Debug)]
pub struct ParsedWebhook {
    pub event_id: Option<String>,
    pub event: WebhookEvent,
}

/// Trait for gateway-specific webhook handling. Verification is async
/// because PayPal's scheme requires a server-to-server call.
pub trait WebhookGateway: Send + Sync {
    fn gateway(&self) -> Gateway;

    /// Verify the delivery's authenticity from the raw body and headers.
    fn verify(
        &self,
        state: &AppState,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> impl std::future::Future<Output = Result<bool, WebhookResult>> + Send;

    /// Parse the payload into a provider-agnostic event.
    fn parse_event(&self, body: &Bytes) -> Result<ParsedWebhook, WebhookResult>;
}

/// Generic webhook handler delegating to a gateway implementation.
pub async fn handle_webhook<G: WebhookGateway>(
    gateway: &G,
    state: &AppState,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    match gateway.verify(state, &headers, &body).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(gateway = %gateway.gateway(), "Webhook rejected: invalid signature");
            return (StatusCode::UNAUTHORIZED, "Invalid signature");
        }
        Err(e) => return e,
    }

    let parsed = match gateway.parse_event(&body) {
        Ok(p) => p,
        Err(e) => return e,
    };

    // The event-id claim happens inside the mutation's transaction, never
    // before it: a committed claim with no committed mutation would turn
    // the gateway's redelivery into a silent "Already processed".
    let event_id = parsed.event_id.as_deref();

    match parsed.event {
        WebhookEvent::PaymentCaptured {
            order_id,
            payment_id,
        } => handle_payment_captured(
            gateway.gateway(),
            state,
            event_id,
            order_id.as_deref(),
            &payment_id,
        ),
        WebhookEvent::RecurringCharged {
            subscription_id,
            payment_id,
            amount_minor,
            period_start,
            period_end,
        } => {
            handle_recurring_charged(
                gateway.gateway(),
                state,
                event_id,
                &subscription_id,
                &payment_id,
                amount_minor,
                period_start,
                period_end,
            )
            .await
        }
        WebhookEvent::AutopayRevoked { subscription_id } => {
            with_subscription(gateway.gateway(), state, &subscription_id, |conn, sub| {
                billing::apply_autopay_revocation(conn, &sub.id)
            })
        }
        WebhookEvent::SubscriptionCancelled { subscription_id } => {
            with_subscription(gateway.gateway(), state, &subscription_id, |conn, sub| {
                billing::apply_gateway_cancellation(conn, sub)
            })
        }
        WebhookEvent::ChargeFailed { subscription_id } => {
            with_subscription(gateway.gateway(), state, &subscription_id, |conn, sub| {
                billing::mark_past_due(conn, &sub.id)
            })
        }
        WebhookEvent::Ignored => (StatusCode::OK, "Event ignored"),
    }
}

fn handle_payment_captured(
    gateway: Gateway,
    state: &AppState,
    event_id: Option<&str>,
    order_id: Option<&str>,
    payment_id: &str,
) -> WebhookResult {
    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };
    let tx = match conn.transaction() {
        Ok(tx) => tx,
        Err(e) => {
            error!("DB error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    // Claim the event id inside the transaction; an error below rolls it
    // back along with the mutation.
    if let Some(event_id) = event_id {
        match queries::try_record_webhook_event(&tx, gateway, event_id) {
            Ok(true) => {}
            Ok(false) => {
                info!(%gateway, event_id, "Webhook already processed");
                return (StatusCode::OK, "Already processed");
            }
            Err(e) => {
                error!("Failed to record webhook event: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
        }
    }

    // Mentor payments first; they must never leak into payment_transactions.
    let mentor = match find_mentor_payment(&tx, gateway, order_id, payment_id) {
        Ok(m) => m,
        Err(e) => {
            error!("DB error looking up mentor payment: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    if let Some(payment) = mentor {
        if let Err(e) = queries::apply_mentor_payment_completion(&tx, &payment.id, payment_id) {
            error!("Failed to complete mentor payment {}: {}", payment.id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
        if let Err(e) = tx.commit() {
            error!("DB error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
        info!(
            mentor_payment_id = %payment.id,
            payment_id,
            "Mentor payment completed via webhook"
        );
        return (StatusCode::OK, "OK");
    }

    match queries::set_transaction_status(&tx, gateway, payment_id, PaymentStatus::Success) {
        Ok(true) => match tx.commit() {
            Ok(()) => (StatusCode::OK, "OK"),
            Err(e) => {
                error!("DB error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
        },
        Ok(false) => {
            // The synchronous verify call may not have landed yet. The
            // transaction (and the event claim with it) is dropped
            // uncommitted so the capture fact can land on redelivery.
            warn!(
                %gateway,
                payment_id,
                "payment.captured for unknown transaction"
            );
            (StatusCode::OK, "Transaction not found")
        }
        Err(e) => {
            error!("DB error updating transaction: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

fn find_mentor_payment(
    conn: &rusqlite::Connection,
    gateway: Gateway,
    order_id: Option<&str>,
    payment_id: &str,
) -> crate::error::Result<Option<crate::models::MentorPayment>> {
    if let Some(oid) = order_id {
        if let Some(p) = queries::find_mentor_payment_by_order(conn, gateway, oid)? {
            return Ok(Some(p));
        }
    }
    queries::find_mentor_payment_by_payment_id(conn, gateway, payment_id)
}

#[allow(clippy::too_many_arguments)]
async fn handle_recurring_charged(
    gateway: Gateway,
    state: &AppState,
    event_id: Option<&str>,
    gateway_subscription_id: &str,
    payment_id: &str,
    amount_minor: i64,
    period_start: Option<i64>,
    period_end: Option<i64>,
) -> WebhookResult {
    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let subscription =
        match queries::get_subscription_by_gateway_id(&conn, gateway, gateway_subscription_id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(
                    %gateway,
                    gateway_subscription_id,
                    "Recurring charge for unknown subscription"
                );
                return (StatusCode::OK, "Subscription not found");
            }
            Err(e) => {
                error!("DB error: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
        };

    // Prefer period bounds from the payload; fetch from the gateway when the
    // event does not carry them. Fall back to computed bounds if the fetch
    // fails: a slightly off window beats losing the charge record.
    let (start, end) = match (period_start, period_end) {
        (Some(s), Some(e)) => (s, e),
        _ => match fetch_period_bounds(gateway, state, gateway_subscription_id).await {
            Some(bounds) => bounds,
            None => {
                let now = queries::now();
                (now, now + subscription.interval.period_secs())
            }
        },
    };

    match billing::record_recurring_charge(
        &mut conn,
        &subscription,
        event_id,
        payment_id,
        amount_minor,
        start,
        end,
    ) {
        Ok(true) => (StatusCode::OK, "OK"),
        Ok(false) => (StatusCode::OK, "Already processed"),
        Err(e) => {
            error!("Failed to record recurring charge: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

async fn fetch_period_bounds(
    gateway: Gateway,
    state: &AppState,
    gateway_subscription_id: &str,
) -> Option<(i64, i64)> {
    match gateway {
        Gateway::Razorpay => match state.razorpay.fetch_subscription(gateway_subscription_id).await
        {
            Ok(sub) => sub.current_start.zip(sub.current_end),
            Err(e) => {
                warn!("Failed to fetch Razorpay subscription for period bounds: {}", e);
                None
            }
        },
        // PayPal sale events carry their own period; a fetch would only
        // yield the next billing time, not the current window.
        Gateway::Paypal => None,
    }
}

fn with_subscription<F>(
    gateway: Gateway,
    state: &AppState,
    gateway_subscription_id: &str,
    apply: F,
) -> WebhookResult
where
    F: FnOnce(&rusqlite::Connection, &Subscription) -> crate::error::Result<()>,
{
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let subscription =
        match queries::get_subscription_by_gateway_id(&conn, gateway, gateway_subscription_id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(
                    %gateway,
                    gateway_subscription_id,
                    "Webhook for unknown subscription"
                );
                return (StatusCode::OK, "Subscription not found");
            }
            Err(e) => {
                error!("DB error: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
        };

    match apply(&conn, &subscription) {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!("Failed to apply webhook transition: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}
