//! PayPal verification endpoints.
//!
//! PayPal has no client-side signature to check; authenticity comes from
//! fetching the order or subscription state directly from the gateway.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::warn;

use crate::billing::{self, ActivateSubscription};
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::*;

use super::razorpay::VerifyResponse;

fn to_minor(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[derive(Debug, Deserialize)]
pub struct PayPalVerifyRequest {
    pub paypal_order_id: Option<String>,
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
    pub assignment_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub interval: Option<BillingInterval>,
    pub country: Option<String>,
}

/// Verify a one-time PayPal order, capturing it if still approved.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<PayPalVerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let order_id = req
        .paypal_order_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("paypal_order_id".into()))?;

    let order = state.paypal.fetch_order(order_id).await?;
    let payment_id = match order.status.as_str() {
        "COMPLETED" => order_id.to_string(),
        "APPROVED" => {
            // Capture is not idempotent; a timeout here must be resolved by
            // re-fetching the order, never by calling capture again.
            let capture = state.paypal.capture_order(order_id).await?;
            if capture.status != "COMPLETED" {
                return Err(AppError::BadRequest(format!(
                    "PayPal capture not completed (status {})",
                    capture.status
                )));
            }
            capture.id
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "PayPal order not completed (status {})",
                other
            )));
        }
    };

    let mut conn = state.db.get()?;

    let mentor_payment =
        match queries::find_mentor_payment_by_order(&conn, Gateway::Paypal, order_id)? {
            Some(p) => Some(p),
            None => match &req.assignment_id {
                Some(aid) => queries::find_pending_mentor_payment_by_assignment(&conn, aid)?,
                None => None,
            },
        };

    if let Some(payment) = mentor_payment {
        if let Err(e) = queries::complete_mentor_payment(&mut conn, &payment.id, &payment_id) {
            warn!(
                mentor_payment_id = %payment.id,
                "Verified mentor payment but completion failed, needs reconciliation: {}", e
            );
        }
        return Ok(Json(VerifyResponse {
            success: true,
            message: "Mentor payment verified".into(),
            subscription: None,
        }));
    }

    let user_id = req
        .user_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("user_id".into()))?;
    let plan_id = req
        .plan_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("plan_id".into()))?;

    let plan = queries::get_plan_by_id(&conn, plan_id)?
        .ok_or_else(|| AppError::NotFound(format!("Plan {}", plan_id)))?;
    let profile = queries::resolve_profile(&conn, user_id, &plan.user_type)?
        .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))?;

    let (plan_amount, plan_currency) =
        queries::price_for_country(&conn, &plan, req.country.as_deref())?;
    let amount_minor = req.amount.map(to_minor).unwrap_or(plan_amount);
    let currency = req.currency.unwrap_or(plan_currency);

    let input = ActivateSubscription {
        profile_id: profile.id.clone(),
        plan_id: plan.id.clone(),
        plan_tier: plan.tier,
        gateway: Gateway::Paypal,
        gateway_order_id: Some(order_id.to_string()),
        gateway_subscription_id: None,
        gateway_payment_id: payment_id,
        gateway_signature: None,
        amount_minor,
        currency,
        interval: req.interval.unwrap_or(plan.interval),
        autopay_enabled: false,
        mandate_status: MandateStatus::Cancelled,
        country: req.country.clone().or(profile.country.clone()),
        now: queries::now(),
    };

    match billing::activate_subscription(&mut conn, &input) {
        Ok(subscription) => Ok(Json(VerifyResponse {
            success: true,
            message: "Payment verified".into(),
            subscription: Some(subscription),
        })),
        Err(e) => {
            warn!(
                order_id,
                profile_id = %profile.id,
                "Verified payment but bookkeeping failed, needs reconciliation: {}", e
            );
            Ok(Json(VerifyResponse {
                success: true,
                message: "Payment verified; records pending reconciliation".into(),
                subscription: None,
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PayPalVerifySubscriptionRequest {
    pub paypal_subscription_id: Option<String>,
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub interval: Option<BillingInterval>,
    pub country: Option<String>,
}

/// Verify a PayPal billing subscription the client just approved.
pub async fn verify_subscription(
    State(state): State<AppState>,
    Json(req): Json<PayPalVerifySubscriptionRequest>,
) -> Result<Json<VerifyResponse>> {
    let subscription_id = req
        .paypal_subscription_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("paypal_subscription_id".into()))?;
    let user_id = req
        .user_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("user_id".into()))?;
    let plan_id = req
        .plan_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("plan_id".into()))?;

    let remote = state.paypal.fetch_subscription(subscription_id).await?;
    if remote.status != "ACTIVE" {
        return Err(AppError::BadRequest(format!(
            "PayPal subscription not active (status {})",
            remote.status
        )));
    }

    let mut conn = state.db.get()?;
    let plan = queries::get_plan_by_id(&conn, plan_id)?
        .ok_or_else(|| AppError::NotFound(format!("Plan {}", plan_id)))?;
    let profile = queries::resolve_profile(&conn, user_id, &plan.user_type)?
        .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user_id)))?;

    let (plan_amount, plan_currency) =
        queries::price_for_country(&conn, &plan, req.country.as_deref())?;
    let amount_minor = req.amount.map(to_minor).unwrap_or(plan_amount);
    let currency = req.currency.unwrap_or(plan_currency);

    let input = ActivateSubscription {
        profile_id: profile.id.clone(),
        plan_id: plan.id.clone(),
        plan_tier: plan.tier,
        gateway: Gateway::Paypal,
        gateway_order_id: None,
        gateway_subscription_id: Some(subscription_id.to_string()),
        // One initial activation per gateway subscription; the id doubles
        // as the dedupe key until the first sale webhook arrives.
        gateway_payment_id: subscription_id.to_string(),
        gateway_signature: None,
        amount_minor,
        currency,
        interval: req.interval.unwrap_or(plan.interval),
        autopay_enabled: true,
        mandate_status: MandateStatus::Active,
        country: req.country.clone().or(profile.country.clone()),
        now: queries::now(),
    };

    match billing::activate_subscription(&mut conn, &input) {
        Ok(subscription) => Ok(Json(VerifyResponse {
            success: true,
            message: "Subscription verified".into(),
            subscription: Some(subscription),
        })),
        Err(e) => {
            warn!(
                subscription_id,
                profile_id = %profile.id,
                "Verified subscription but bookkeeping failed, needs reconciliation: {}", e
            );
            Ok(Json(VerifyResponse {
                success: true,
                message: "Subscription verified; records pending reconciliation".into(),
                subscription: None,
            }))
        }
    }
}
