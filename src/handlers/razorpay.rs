//! Razorpay checkout endpoints: order/subscription creation and the
//! synchronous payment verification callback.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::{self, ActivateSubscription};
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::gateways::{RazorpayOrder, RazorpaySubscription, SignatureFormat};
use crate::models::*;
use crate::plan_cache;

/// Default mandate length in cycles when the client does not specify one.
/// Razorpay requires a finite total_count per subscription.
fn default_total_count(interval: BillingInterval) -> i64 {
    match interval {
        BillingInterval::Monthly => 120,
        BillingInterval::Yearly => 10,
    }
}

/// Major-unit amount from the client, converted to minor units.
fn to_minor(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Major currency units (e.g. 299.0 for INR 299).
    pub amount: f64,
    pub currency: Option<String>,
    pub receipt: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<RazorpayOrder>> {
    let amount_minor = to_minor(req.amount);
    if amount_minor < 100 {
        return Err(AppError::BadRequest(
            "Amount must be at least 100 minor units".into(),
        ));
    }

    let currency = req.currency.unwrap_or_else(|| "INR".to_string());
    let receipt = req
        .receipt
        .unwrap_or_else(|| format!("rcpt_{}", Uuid::new_v4().simple()));

    let order = state
        .razorpay
        .create_order(amount_minor, &currency, &receipt)
        .await?;
    info!(order_id = %order.id, amount_minor, %currency, "Razorpay order created");
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub amount: f64,
    pub currency: Option<String>,
    pub interval: BillingInterval,
    pub plan_name: Option<String>,
    pub total_count: Option<i64>,
}

pub async fn create_subscription(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<Json<RazorpaySubscription>> {
    let amount_minor = to_minor(req.amount);
    if amount_minor < 100 {
        return Err(AppError::BadRequest(
            "Amount must be at least 100 minor units".into(),
        ));
    }

    let currency = req.currency.unwrap_or_else(|| "INR".to_string());
    let plan_name = req
        .plan_name
        .unwrap_or_else(|| format!("{} {} plan", currency, req.amount));

    let key = PlanKey {
        gateway: Gateway::Razorpay,
        amount_minor,
        currency,
        period: req.interval,
        interval_count: 1,
    };
    let gateway_plan_id =
        plan_cache::get_or_create_plan(&state.db, &state.razorpay, &key, &plan_name).await?;

    let total_count = req
        .total_count
        .unwrap_or_else(|| default_total_count(req.interval));
    let subscription = state
        .razorpay
        .create_subscription(&gateway_plan_id, total_count, true, None)
        .await?;

    info!(
        subscription_id = %subscription.id,
        plan_id = %gateway_plan_id,
        "Razorpay subscription created"
    );
    Ok(Json(subscription))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_subscription_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
    pub assignment_id: Option<String>,
    /// Major currency units; falls back to the plan's country price.
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub interval: Option<BillingInterval>,
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

/// Verify a completed Razorpay checkout.
///
/// Signature mismatch is a hard 400 and nothing is recorded. Once the
/// signature checks out the money has moved, so every later persistence
/// failure is logged for reconciliation and the response still reports
/// success.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let payment_id = req
        .razorpay_payment_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("razorpay_payment_id".into()))?;
    let signature = req
        .razorpay_signature
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingFields("razorpay_signature".into()))?;
    let order_or_subscription_id = req
        .razorpay_order_id
        .as_deref()
        .or(req.razorpay_subscription_id.as_deref())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::MissingFields("razorpay_order_id or razorpay_subscription_id".into())
        })?;

    match state
        .razorpay
        .verify_payment_signature(order_or_subscription_id, payment_id, signature)?
    {
        None => {
            warn!(payment_id, "Razorpay signature verification failed");
            return Err(AppError::BadRequest("Invalid payment signature".into()));
        }
        Some(SignatureFormat::Primary) => {}
        Some(format) => {
            // The gateway's documented contract signs `id|payment_id`; any
            // other match means the signing convention has drifted.
            warn!(
                payment_id,
                ?format,
                "Razorpay signature matched a non-primary format"
            );
        }
    }

    // Mentor payments are classified before any subscription logic and must
    // never fall through into it.
    let mut conn = state.db.get()?;
    let mentor_payment = match queries::find_mentor_payment_by_order(
        &conn,
        Gateway::Razorpay,
        order_or_subscription_id,
    )? {
        Some(p) => Some(p),
        None => match &req.assignment_id {
            Some(aid) => queries::find_pending_mentor_payment_by_assignment(&conn, aid)?,
            None => None,
        },
    };

    if let Some(payment) = mentor_payment {
        if let Err(e) = queries::complete_mentor_payment(&mut conn, &payment.id, payment_id) {
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
    let interval = req.interval.unwrap_or(plan.interval);
    let autopay = req.razorpay_subscription_id.is_some();

    let input = ActivateSubscription {
        profile_id: profile.id.clone(),
        plan_id: plan.id.clone(),
        plan_tier: plan.tier,
        gateway: Gateway::Razorpay,
        gateway_order_id: req.razorpay_order_id.clone(),
        gateway_subscription_id: req.razorpay_subscription_id.clone(),
        gateway_payment_id: payment_id.to_string(),
        gateway_signature: Some(signature.to_string()),
        amount_minor,
        currency,
        interval,
        autopay_enabled: autopay,
        mandate_status: if autopay {
            MandateStatus::Active
        } else {
            MandateStatus::Cancelled
        },
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
            // The payment is authentic and captured; failing the request now
            // would tell the user their money vanished.
            warn!(
                payment_id,
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
