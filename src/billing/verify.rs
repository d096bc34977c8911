//! Post-verification bookkeeping for the initial subscription payment.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::queries;
use crate::error::Result;
use crate::models::*;

/// Facts established by the verification handler before bookkeeping runs:
/// the payment is authentic and the money has moved.
#[derive(Debug, Clone)]
pub struct ActivateSubscription {
    pub profile_id: String,
    pub plan_id: String,
    pub plan_tier: PlanTier,
    pub gateway: Gateway,
    pub gateway_order_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_payment_id: String,
    pub gateway_signature: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub autopay_enabled: bool,
    pub mandate_status: MandateStatus,
    pub country: Option<String>,
    pub now: i64,
}

/// Activate a subscription for a verified initial payment.
///
/// Runs as one transaction: supersede any active subscription, insert the
/// new row with cycle count 1 and total paid = payment amount, record the
/// payment transaction, and insert billing cycle #1. Redelivery of the same
/// payment id is a no-op returning the subscription recorded the first time.
pub fn activate_subscription(
    conn: &mut Connection,
    input: &ActivateSubscription,
) -> Result<Subscription> {
    // Dedupe point: gateway_payment_id is unique per gateway.
    if let Some(existing) =
        queries::get_transaction_by_gateway_payment(conn, input.gateway, &input.gateway_payment_id)?
    {
        warn!(
            gateway = %input.gateway,
            payment_id = %input.gateway_payment_id,
            "Duplicate verification for an already-recorded payment"
        );
        if let Some(sub_id) = &existing.subscription_id {
            if let Some(sub) = queries::get_subscription_by_id(conn, sub_id)? {
                return Ok(sub);
            }
        }
        if let Some(sub) = queries::get_active_subscription(conn, &input.profile_id)? {
            return Ok(sub);
        }
    }

    let period_start = input.now;
    let period_end = input.now + input.interval.period_secs();

    let tx = conn.transaction()?;

    // Storage metering survives tier transitions.
    let previous = queries::get_active_subscription(&tx, &input.profile_id)?;
    let storage_used_mb = previous.as_ref().map(|s| s.storage_used_mb).unwrap_or(0);

    let superseded = queries::deactivate_active_subscriptions(&tx, &input.profile_id)?;
    if superseded > 0 {
        info!(
            profile_id = %input.profile_id,
            "Superseded previous active subscription"
        );
    }

    let subscription = queries::insert_subscription(
        &tx,
        &CreateSubscription {
            profile_id: input.profile_id.clone(),
            plan_id: input.plan_id.clone(),
            plan_tier: input.plan_tier,
            current_period_start: period_start,
            current_period_end: period_end,
            amount_minor: input.amount_minor,
            currency: input.currency.clone(),
            interval: input.interval,
            autopay_enabled: input.autopay_enabled,
            mandate_status: input.mandate_status,
            gateway: input.gateway,
            gateway_subscription_id: input.gateway_subscription_id.clone(),
            storage_used_mb,
            country: input.country.clone(),
            previous_plan_tier: previous.as_ref().map(|s| s.plan_tier),
            previous_subscription_id: previous.as_ref().map(|s| s.id.clone()),
        },
        SubscriptionStatus::Active,
        1,
        input.amount_minor,
    )?;

    let transaction = queries::insert_payment_transaction(
        &tx,
        &CreatePaymentTransaction {
            profile_id: input.profile_id.clone(),
            subscription_id: Some(subscription.id.clone()),
            gateway: input.gateway,
            gateway_order_id: input.gateway_order_id.clone(),
            gateway_payment_id: input.gateway_payment_id.clone(),
            gateway_signature: input.gateway_signature.clone(),
            amount_minor: input.amount_minor,
            currency: input.currency.clone(),
            status: PaymentStatus::Success,
            payment_type: PaymentType::Initial,
            autopay: input.autopay_enabled,
            plan_tier: Some(input.plan_tier),
        },
    )?;

    queries::insert_billing_cycle(
        &tx,
        &subscription.id,
        1,
        period_start,
        period_end,
        input.amount_minor,
        CycleStatus::Paid,
        Some(&transaction.id),
    )?;

    tx.commit()?;

    info!(
        subscription_id = %subscription.id,
        profile_id = %input.profile_id,
        tier = %input.plan_tier,
        gateway = %input.gateway,
        "Subscription activated"
    );

    Ok(subscription)
}
