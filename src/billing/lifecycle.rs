//! Lifecycle transitions past initial activation: recurring charges, tier
//! changes, autopay revocation, and failure handling.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::*;

/// Record a successful recurring charge reported by a webhook.
///
/// Returns false when the event id or gateway payment id was already
/// recorded (webhook redelivery), in which case nothing is mutated.
/// Otherwise one transaction claims the event id, bumps the cycle count,
/// appends to total paid, moves the period window, and inserts the
/// transaction plus billing cycle N+1. The claim lives inside the same
/// transaction so a failure past it rolls the claim back and the gateway's
/// redelivery gets a clean retry. The billing_cycles
/// UNIQUE(subscription_id, cycle_number) constraint makes a skipped or
/// repeated number impossible even if two deliveries race past the dedupe
/// read.
pub fn record_recurring_charge(
    conn: &mut Connection,
    subscription: &Subscription,
    event_id: Option<&str>,
    gateway_payment_id: &str,
    amount_minor: i64,
    period_start: i64,
    period_end: i64,
) -> Result<bool> {
    let tx = conn.transaction()?;

    if let Some(event_id) = event_id {
        if !queries::try_record_webhook_event(&tx, subscription.gateway, event_id)? {
            info!(
                subscription_id = %subscription.id,
                event_id,
                "Recurring charge event already processed, skipping"
            );
            return Ok(false);
        }
    }

    if queries::get_transaction_by_gateway_payment(&tx, subscription.gateway, gateway_payment_id)?
        .is_some()
    {
        info!(
            subscription_id = %subscription.id,
            payment_id = %gateway_payment_id,
            "Recurring charge already recorded, skipping"
        );
        return Ok(false);
    }

    let next_cycle = queries::max_cycle_number(&tx, &subscription.id)? + 1;

    queries::apply_recurring_charge(
        &tx,
        &subscription.id,
        amount_minor,
        period_start,
        period_end,
    )?;

    let transaction = queries::insert_payment_transaction(
        &tx,
        &CreatePaymentTransaction {
            profile_id: subscription.profile_id.clone(),
            subscription_id: Some(subscription.id.clone()),
            gateway: subscription.gateway,
            gateway_order_id: None,
            gateway_payment_id: gateway_payment_id.to_string(),
            gateway_signature: None,
            amount_minor,
            currency: subscription.currency.clone(),
            status: PaymentStatus::Success,
            payment_type: PaymentType::Recurring,
            autopay: true,
            plan_tier: Some(subscription.plan_tier),
        },
    )?;

    queries::insert_billing_cycle(
        &tx,
        &subscription.id,
        next_cycle,
        period_start,
        period_end,
        amount_minor,
        CycleStatus::Paid,
        Some(&transaction.id),
    )?;

    tx.commit()?;

    info!(
        subscription_id = %subscription.id,
        cycle = next_cycle,
        amount_minor,
        "Recurring charge recorded"
    );
    Ok(true)
}

/// Bank or UPI-initiated mandate revocation: autopay stops but the paid
/// period keeps running. The expiry sweep lapses the row later.
pub fn apply_autopay_revocation(conn: &Connection, subscription_id: &str) -> Result<()> {
    queries::disable_autopay(conn, subscription_id)?;
    info!(subscription_id, "Autopay revoked, subscription continues to period end");
    Ok(())
}

/// Gateway-reported cancellation. If autopay was still on the cancellation
/// originated outside the app, so grant grace until period end; if autopay
/// was already off the user asked for this, mark terminal immediately.
pub fn apply_gateway_cancellation(conn: &Connection, subscription: &Subscription) -> Result<()> {
    if subscription.autopay_enabled {
        queries::disable_autopay(conn, &subscription.id)?;
        info!(
            subscription_id = %subscription.id,
            "Gateway cancellation with autopay on: grace until period end"
        );
    } else {
        queries::set_subscription_status(conn, &subscription.id, SubscriptionStatus::Cancelled)?;
        info!(subscription_id = %subscription.id, "Subscription cancelled");
    }
    Ok(())
}

/// Recurring charge failed. Access policy for past_due rows belongs to the
/// surrounding application, not here.
pub fn mark_past_due(conn: &Connection, subscription_id: &str) -> Result<()> {
    queries::set_subscription_status(conn, subscription_id, SubscriptionStatus::PastDue)?;
    warn!(subscription_id, "Recurring charge failed, subscription past_due");
    Ok(())
}

/// Inputs for the datastore half of a tier change. Gateway-side work
/// (mandate cancellation, new plan/subscription creation) happens in the
/// handler before this runs.
#[derive(Debug, Clone)]
pub struct TierChange {
    pub new_plan_id: String,
    pub new_tier: PlanTier,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub gateway: Gateway,
    pub gateway_subscription_id: Option<String>,
    pub mandate_status: MandateStatus,
    pub now: i64,
}

fn replace_subscription(
    conn: &mut Connection,
    old: &Subscription,
    change: &TierChange,
    change_type: ChangeType,
) -> Result<Subscription> {
    let period_start = change.now;
    let period_end = change.now + change.interval.period_secs();

    let tx = conn.transaction()?;

    queries::disable_autopay(&tx, &old.id)?;
    queries::deactivate_active_subscriptions(&tx, &old.profile_id)?;

    let new_sub = queries::insert_subscription(
        &tx,
        &CreateSubscription {
            profile_id: old.profile_id.clone(),
            plan_id: change.new_plan_id.clone(),
            plan_tier: change.new_tier,
            current_period_start: period_start,
            current_period_end: period_end,
            amount_minor: change.amount_minor,
            currency: change.currency.clone(),
            interval: change.interval,
            autopay_enabled: change.mandate_status == MandateStatus::Active,
            mandate_status: change.mandate_status,
            gateway: change.gateway,
            gateway_subscription_id: change.gateway_subscription_id.clone(),
            storage_used_mb: old.storage_used_mb,
            country: old.country.clone(),
            previous_plan_tier: Some(old.plan_tier),
            previous_subscription_id: Some(old.id.clone()),
        },
        SubscriptionStatus::Active,
        0,
        0,
    )?;

    queries::insert_subscription_change(
        &tx,
        &queries::RecordChange {
            profile_id: &old.profile_id,
            old_subscription_id: &old.id,
            new_subscription_id: Some(&new_sub.id),
            change_type,
            from_tier: old.plan_tier,
            to_tier: change.new_tier,
            from_amount_minor: old.amount_minor,
            to_amount_minor: change.amount_minor,
            period_start,
            period_end,
        },
    )?;

    tx.commit()?;
    Ok(new_sub)
}

/// Upgrade the profile's active subscription to a higher tier.
///
/// The old row keeps its history; the new row carries `previous_plan_tier`
/// and `previous_subscription_id` plus the accumulated storage metering.
pub fn upgrade_subscription(
    conn: &mut Connection,
    old: &Subscription,
    change: &TierChange,
) -> Result<Subscription> {
    if change.new_tier.rank() <= old.plan_tier.rank() {
        return Err(AppError::BadRequest(format!(
            "Cannot upgrade from {} to {}",
            old.plan_tier, change.new_tier
        )));
    }

    let new_sub = replace_subscription(conn, old, change, ChangeType::Upgrade)?;
    info!(
        profile_id = %old.profile_id,
        from = %old.plan_tier,
        to = %change.new_tier,
        new_subscription_id = %new_sub.id,
        "Subscription upgraded"
    );
    Ok(new_sub)
}

/// What a downgrade produced.
#[derive(Debug)]
pub enum DowngradeOutcome {
    /// Downgrade-to-free: no replacement row, old subscription keeps running
    /// with autopay off until the paid period ends.
    ToFree,
    /// Paid-to-paid downgrade: a replacement subscription row.
    Replaced(Subscription),
}

/// Downgrade the profile's active subscription.
///
/// Valid directions are premium -> basic or any paid tier -> free. A free
/// subscription cannot be downgraded, and basic -> premium must go through
/// the upgrade path.
pub fn downgrade_subscription(
    conn: &mut Connection,
    old: &Subscription,
    change: &TierChange,
) -> Result<DowngradeOutcome> {
    if old.plan_tier == PlanTier::Free {
        return Err(AppError::BadRequest(
            "Cannot downgrade from free plan".into(),
        ));
    }
    if change.new_tier.rank() >= old.plan_tier.rank() {
        return Err(AppError::BadRequest(format!(
            "Cannot downgrade from {} to {}",
            old.plan_tier, change.new_tier
        )));
    }

    if change.new_tier == PlanTier::Free {
        // No replacement row: autopay off, period runs out, the expiry
        // sweep lapses the subscription later.
        let tx = conn.transaction()?;
        queries::disable_autopay(&tx, &old.id)?;
        queries::insert_subscription_change(
            &tx,
            &queries::RecordChange {
                profile_id: &old.profile_id,
                old_subscription_id: &old.id,
                new_subscription_id: None,
                change_type: ChangeType::Downgrade,
                from_tier: old.plan_tier,
                to_tier: PlanTier::Free,
                from_amount_minor: old.amount_minor,
                to_amount_minor: 0,
                period_start: old.current_period_start,
                period_end: old.current_period_end,
            },
        )?;
        tx.commit()?;
        info!(
            profile_id = %old.profile_id,
            subscription_id = %old.id,
            "Downgraded to free: autopay off, runs to period end"
        );
        return Ok(DowngradeOutcome::ToFree);
    }

    let new_sub = replace_subscription(conn, old, change, ChangeType::Downgrade)?;
    info!(
        profile_id = %old.profile_id,
        from = %old.plan_tier,
        to = %change.new_tier,
        new_subscription_id = %new_sub.id,
        "Subscription downgraded"
    );
    Ok(DowngradeOutcome::Replaced(new_sub))
}

/// User-requested autopay stop: mandate off, status stays active until the
/// current period's end.
pub fn stop_autopay(conn: &mut Connection, subscription: &Subscription) -> Result<()> {
    let tx = conn.transaction()?;
    queries::disable_autopay(&tx, &subscription.id)?;
    queries::insert_subscription_change(
        &tx,
        &queries::RecordChange {
            profile_id: &subscription.profile_id,
            old_subscription_id: &subscription.id,
            new_subscription_id: None,
            change_type: ChangeType::AutopayStop,
            from_tier: subscription.plan_tier,
            to_tier: subscription.plan_tier,
            from_amount_minor: subscription.amount_minor,
            to_amount_minor: subscription.amount_minor,
            period_start: subscription.current_period_start,
            period_end: subscription.current_period_end,
        },
    )?;
    tx.commit()?;
    info!(
        subscription_id = %subscription.id,
        "Autopay stopped, active until period end"
    );
    Ok(())
}
