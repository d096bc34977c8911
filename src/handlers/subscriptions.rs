//! Subscription lifecycle endpoints: upgrade, downgrade, stop-autopay, and
//! the current-subscription lookup.

use axum::{
    extract::{Query, State},
    Json,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::billing::{self, DowngradeOutcome, TierChange};
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::plan_cache;

/// Resolve the incoming user id to the profile holding an active
/// subscription. The id may be a profile id or an auth identity owning
/// several profiles.
fn find_active_subscription(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<(Profile, Subscription)>> {
    if let Some(profile) = queries::get_profile_by_id(conn, user_id)? {
        if let Some(sub) = queries::get_active_subscription(conn, &profile.id)? {
            return Ok(Some((profile, sub)));
        }
        return Ok(None);
    }

    for profile in queries::list_profiles_by_auth(conn, user_id)? {
        if let Some(sub) = queries::get_active_subscription(conn, &profile.id)? {
            return Ok(Some((profile, sub)));
        }
    }
    Ok(None)
}

/// Cancel the gateway-side mandate, best-effort. A failure here risks a
/// double charge, so it is logged loudly, but it never blocks the local
/// transition.
async fn cancel_gateway_mandate(state: &AppState, sub: &Subscription) {
    let Some(gateway_subscription_id) = &sub.gateway_subscription_id else {
        return;
    };

    let result = match sub.gateway {
        Gateway::Razorpay => state
            .razorpay
            .cancel_subscription(gateway_subscription_id)
            .await
            .map(|_| ()),
        Gateway::Paypal => {
            state
                .paypal
                .cancel_subscription(gateway_subscription_id, "Plan change requested")
                .await
        }
    };

    if let Err(e) = result {
        warn!(
            subscription_id = %sub.id,
            gateway = %sub.gateway,
            gateway_subscription_id = %gateway_subscription_id,
            "Failed to cancel gateway mandate, double-charge risk until resolved: {}", e
        );
    }
}

/// For Razorpay the replacement mandate can be created server-side; the
/// client then authorizes it during checkout. PayPal requires a fresh
/// client-side approval, so no gateway object exists yet.
async fn create_replacement_mandate(
    state: &AppState,
    gateway: Gateway,
    plan_name: &str,
    amount_minor: i64,
    currency: &str,
    interval: BillingInterval,
) -> Option<String> {
    if gateway != Gateway::Razorpay {
        return None;
    }

    let key = PlanKey {
        gateway,
        amount_minor,
        currency: currency.to_string(),
        period: interval,
        interval_count: 1,
    };
    let gateway_plan_id =
        match plan_cache::get_or_create_plan(&state.db, &state.razorpay, &key, plan_name).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to create gateway plan for tier change: {}", e);
                return None;
            }
        };

    let total_count = match interval {
        BillingInterval::Monthly => 120,
        BillingInterval::Yearly => 10,
    };
    match state
        .razorpay
        .create_subscription(&gateway_plan_id, total_count, true, None)
        .await
    {
        Ok(sub) => Some(sub.id),
        Err(e) => {
            warn!("Failed to create replacement gateway subscription: {}", e);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TierChangeRequest {
    pub user_id: String,
    pub new_plan_tier: PlanTier,
    pub interval: Option<BillingInterval>,
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TierChangeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Json(req): Json<TierChangeRequest>,
) -> Result<Json<TierChangeResponse>> {
    let conn = state.db.get()?;
    let (profile, old) = find_active_subscription(&conn, &req.user_id)?
        .ok_or_else(|| AppError::NotFound("No active subscription".into()))?;

    if req.new_plan_tier.rank() <= old.plan_tier.rank() {
        return Err(AppError::BadRequest(format!(
            "Cannot upgrade from {} to {}",
            old.plan_tier, req.new_plan_tier
        )));
    }

    let interval = req.interval.unwrap_or(old.interval);
    let plan = queries::get_plan_by_tier(&conn, req.new_plan_tier, &profile.role, interval)?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No {} {} plan for {}",
                req.new_plan_tier, interval, profile.role
            ))
        })?;
    let country = req.country.as_deref().or(old.country.as_deref());
    let (amount_minor, currency) = queries::price_for_country(&conn, &plan, country)?;
    drop(conn);

    cancel_gateway_mandate(&state, &old).await;

    let gateway_subscription_id = create_replacement_mandate(
        &state,
        old.gateway,
        &plan.name,
        amount_minor,
        &currency,
        interval,
    )
    .await;

    let mut conn = state.db.get()?;
    let new_sub = billing::upgrade_subscription(
        &mut conn,
        &old,
        &TierChange {
            new_plan_id: plan.id.clone(),
            new_tier: req.new_plan_tier,
            amount_minor,
            currency,
            interval,
            gateway: old.gateway,
            gateway_subscription_id,
            // The replacement mandate needs a fresh client authorization
            // before it starts charging.
            mandate_status: MandateStatus::Pending,
            now: queries::now(),
        },
    )?;

    Ok(Json(TierChangeResponse {
        success: true,
        message: "Subscription upgraded".into(),
        subscription: Some(new_sub),
    }))
}

pub async fn downgrade(
    State(state): State<AppState>,
    Json(req): Json<TierChangeRequest>,
) -> Result<Json<TierChangeResponse>> {
    let conn = state.db.get()?;
    let (profile, old) = find_active_subscription(&conn, &req.user_id)?
        .ok_or_else(|| AppError::NotFound("No active subscription".into()))?;

    if old.plan_tier == PlanTier::Free {
        return Err(AppError::BadRequest(
            "Cannot downgrade from free plan".into(),
        ));
    }
    if req.new_plan_tier.rank() >= old.plan_tier.rank() {
        return Err(AppError::BadRequest(format!(
            "Cannot downgrade from {} to {}",
            old.plan_tier, req.new_plan_tier
        )));
    }

    if req.new_plan_tier == PlanTier::Free {
        drop(conn);
        cancel_gateway_mandate(&state, &old).await;

        let mut conn = state.db.get()?;
        billing::downgrade_subscription(
            &mut conn,
            &old,
            &TierChange {
                new_plan_id: old.plan_id.clone(),
                new_tier: PlanTier::Free,
                amount_minor: 0,
                currency: old.currency.clone(),
                interval: old.interval,
                gateway: old.gateway,
                gateway_subscription_id: None,
                mandate_status: MandateStatus::Cancelled,
                now: queries::now(),
            },
        )?;
        // Re-read so the response shows autopay off, not the stale row
        let subscription = queries::get_subscription_by_id(&conn, &old.id)?;
        return Ok(Json(TierChangeResponse {
            success: true,
            message: "Downgraded to free; paid access runs to period end".into(),
            subscription,
        }));
    }

    let interval = req.interval.unwrap_or(old.interval);
    let plan = queries::get_plan_by_tier(&conn, req.new_plan_tier, &profile.role, interval)?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No {} {} plan for {}",
                req.new_plan_tier, interval, profile.role
            ))
        })?;
    let country = req.country.as_deref().or(old.country.as_deref());
    let (amount_minor, currency) = queries::price_for_country(&conn, &plan, country)?;
    drop(conn);

    cancel_gateway_mandate(&state, &old).await;

    let gateway_subscription_id = create_replacement_mandate(
        &state,
        old.gateway,
        &plan.name,
        amount_minor,
        &currency,
        interval,
    )
    .await;

    let mut conn = state.db.get()?;
    let outcome = billing::downgrade_subscription(
        &mut conn,
        &old,
        &TierChange {
            new_plan_id: plan.id.clone(),
            new_tier: req.new_plan_tier,
            amount_minor,
            currency,
            interval,
            gateway: old.gateway,
            gateway_subscription_id,
            mandate_status: MandateStatus::Pending,
            now: queries::now(),
        },
    )?;

    let subscription = match outcome {
        DowngradeOutcome::Replaced(sub) => Some(sub),
        // Not reachable with a paid target tier; answer with the fresh row
        DowngradeOutcome::ToFree => queries::get_subscription_by_id(&conn, &old.id)?,
    };

    Ok(Json(TierChangeResponse {
        success: true,
        message: "Subscription downgraded".into(),
        subscription,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StopAutopayRequest {
    pub user_id: String,
}

pub async fn stop_autopay(
    State(state): State<AppState>,
    Json(req): Json<StopAutopayRequest>,
) -> Result<Json<TierChangeResponse>> {
    let conn = state.db.get()?;
    let (_, sub) = find_active_subscription(&conn, &req.user_id)?
        .ok_or_else(|| AppError::NotFound("No active subscription".into()))?;
    drop(conn);

    cancel_gateway_mandate(&state, &sub).await;

    let mut conn = state.db.get()?;
    billing::stop_autopay(&mut conn, &sub)?;

    let updated = queries::get_subscription_by_id(&conn, &sub.id)?;
    Ok(Json(TierChangeResponse {
        success: true,
        message: "Autopay stopped; subscription active until period end".into(),
        subscription: updated,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CurrentQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

pub async fn current(
    State(state): State<AppState>,
    Query(query): Query<CurrentQuery>,
) -> Result<Json<CurrentResponse>> {
    let conn = state.db.get()?;
    let subscription = find_active_subscription(&conn, &query.user_id)?.map(|(_, s)| s);
    Ok(Json(CurrentResponse {
        success: true,
        subscription,
    }))
}
