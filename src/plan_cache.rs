//! Gateway plan cache: one gateway-side plan per set of pricing terms.
//!
//! Gateways treat plans as immutable billing templates, so creating one per
//! checkout would litter the dashboard with duplicates. The cache maps
//! `(gateway, amount, currency, period, interval_count)` to the gateway plan
//! id; concurrent creators for the same key are resolved by the table's
//! UNIQUE constraint, with the loser adopting the winner's row.

use tracing::{debug, info};

use crate::db::{queries, DbPool};
use crate::error::{AppError, Result};
use crate::gateways::RazorpayClient;
use crate::models::PlanKey;

/// Look up a cached gateway plan for the pricing terms, creating one at the
/// gateway on miss. Returns the gateway plan id.
pub async fn get_or_create_plan(
    db: &DbPool,
    razorpay: &RazorpayClient,
    key: &PlanKey,
    plan_name: &str,
) -> Result<String> {
    {
        let conn = db.get()?;
        if let Some(entry) = queries::find_plan_mapping(&conn, key)? {
            debug!(
                gateway_plan_id = %entry.gateway_plan_id,
                amount_minor = key.amount_minor,
                currency = %key.currency,
                "Plan cache hit"
            );
            return Ok(entry.gateway_plan_id);
        }
    }

    // Cache miss: create at the gateway first, then record the mapping. If
    // the gateway call fails the cache is left untouched.
    let plan = razorpay
        .create_plan(
            plan_name,
            key.amount_minor,
            &key.currency,
            key.period.as_str(),
            key.interval_count,
        )
        .await?;

    info!(
        gateway_plan_id = %plan.id,
        amount_minor = key.amount_minor,
        currency = %key.currency,
        period = %key.period,
        "Created gateway plan"
    );

    let conn = db.get()?;
    if queries::try_insert_plan_mapping(&conn, key, &plan.id)? {
        return Ok(plan.id);
    }

    // A concurrent creator won the insert race. Adopt its plan id; ours
    // becomes an orphan on the gateway side, which is harmless.
    let existing = queries::find_plan_mapping(&conn, key)?.ok_or_else(|| {
        AppError::Internal("Plan cache insert conflicted but no row found".into())
    })?;
    info!(
        ours = %plan.id,
        theirs = %existing.gateway_plan_id,
        "Lost plan cache insert race, adopting existing plan"
    );
    Ok(existing.gateway_plan_id)
}
