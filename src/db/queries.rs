use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    query_all, query_one, BILLING_CYCLE_COLS, MENTOR_ASSIGNMENT_COLS, MENTOR_PAYMENT_COLS,
    PLAN_CACHE_COLS, PLAN_COLS, PLAN_PRICE_COLS, PROFILE_COLS, SUBSCRIPTION_CHANGE_COLS,
    SUBSCRIPTION_COLS, TRANSACTION_COLS,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Profiles ============

pub fn create_profile(conn: &Connection, input: &CreateProfile) -> Result<Profile> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO profiles (id, auth_user_id, role, country, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, &input.auth_user_id, &input.role, &input.country, now],
    )?;

    Ok(Profile {
        id,
        auth_user_id: input.auth_user_id.clone(),
        role: input.role.clone(),
        country: input.country.clone(),
        created_at: now,
    })
}

pub fn get_profile_by_id(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLS),
        &[&id],
    )
}

pub fn list_profiles_by_auth(conn: &Connection, auth_user_id: &str) -> Result<Vec<Profile>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM profiles WHERE auth_user_id = ?1 ORDER BY created_at",
            PROFILE_COLS
        ),
        &[&auth_user_id],
    )
}

/// Resolve an incoming user identifier to a billing profile.
///
/// The caller-supplied id may be a profile id or an auth identity id. When it
/// is an auth id owning several profiles, prefer the one whose role matches
/// the plan's target user type.
pub fn resolve_profile(
    conn: &Connection,
    user_id: &str,
    target_user_type: &str,
) -> Result<Option<Profile>> {
    if let Some(profile) = get_profile_by_id(conn, user_id)? {
        return Ok(Some(profile));
    }

    let candidates = list_profiles_by_auth(conn, user_id)?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let matched = candidates
        .iter()
        .find(|p| p.role == target_user_type)
        .or_else(|| candidates.first())
        .cloned();
    Ok(matched)
}

// ============ Plans ============

pub struct CreatePlan {
    pub name: String,
    pub tier: PlanTier,
    pub user_type: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
}

pub fn create_plan(conn: &Connection, input: &CreatePlan) -> Result<Plan> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO plans (id, name, tier, user_type, amount_minor, currency, interval, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            &input.name,
            input.tier.as_str(),
            &input.user_type,
            input.amount_minor,
            &input.currency,
            input.interval.as_str(),
            now
        ],
    )?;

    Ok(Plan {
        id,
        name: input.name.clone(),
        tier: input.tier,
        user_type: input.user_type.clone(),
        amount_minor: input.amount_minor,
        currency: input.currency.clone(),
        interval: input.interval,
        created_at: now,
    })
}

pub fn get_plan_by_id(conn: &Connection, id: &str) -> Result<Option<Plan>> {
    query_one(
        conn,
        &format!("SELECT {} FROM plans WHERE id = ?1", PLAN_COLS),
        &[&id],
    )
}

pub fn get_plan_by_tier(
    conn: &Connection,
    tier: PlanTier,
    user_type: &str,
    interval: BillingInterval,
) -> Result<Option<Plan>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM plans WHERE tier = ?1 AND user_type = ?2 AND interval = ?3",
            PLAN_COLS
        ),
        &[&tier.as_str(), &user_type, &interval.as_str()],
    )
}

pub fn set_plan_price(
    conn: &Connection,
    plan_id: &str,
    country: &str,
    amount_minor: i64,
    currency: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO plan_prices (plan_id, country, amount_minor, currency)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(plan_id, country) DO UPDATE SET amount_minor = ?3, currency = ?4",
        params![plan_id, country, amount_minor, currency],
    )?;
    Ok(())
}

/// Price a plan for a country: country override first, plan base otherwise.
pub fn price_for_country(
    conn: &Connection,
    plan: &Plan,
    country: Option<&str>,
) -> Result<(i64, String)> {
    if let Some(country) = country {
        let price: Option<PlanPrice> = query_one(
            conn,
            &format!(
                "SELECT {} FROM plan_prices WHERE plan_id = ?1 AND country = ?2",
                PLAN_PRICE_COLS
            ),
            &[&plan.id, &country],
        )?;
        if let Some(p) = price {
            return Ok((p.amount_minor, p.currency));
        }
    }
    Ok((plan.amount_minor, plan.currency.clone()))
}

// ============ Gateway plan cache ============

pub fn find_plan_mapping(conn: &Connection, key: &PlanKey) -> Result<Option<PlanCacheEntry>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM gateway_plan_cache
             WHERE gateway = ?1 AND amount_minor = ?2 AND currency = ?3
               AND period = ?4 AND interval_count = ?5",
            PLAN_CACHE_COLS
        ),
        &[
            &key.gateway.as_str(),
            &key.amount_minor,
            &key.currency,
            &key.period.as_str(),
            &key.interval_count,
        ],
    )
}

/// Insert a plan mapping. Returns false when a concurrent creator already
/// inserted the same key (the caller should re-query and adopt that row).
pub fn try_insert_plan_mapping(
    conn: &Connection,
    key: &PlanKey,
    gateway_plan_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO gateway_plan_cache
         (id, gateway, amount_minor, currency, period, interval_count, gateway_plan_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            gen_id(),
            key.gateway.as_str(),
            key.amount_minor,
            &key.currency,
            key.period.as_str(),
            key.interval_count,
            gateway_plan_id,
            now()
        ],
    )?;
    Ok(affected > 0)
}

// ============ Subscriptions ============

/// Insert a subscription row. Callers are responsible for running this inside
/// the same transaction that deactivates the previous active row.
pub fn insert_subscription(
    conn: &Connection,
    input: &CreateSubscription,
    status: SubscriptionStatus,
    billing_cycle_count: i64,
    total_paid_minor: i64,
) -> Result<Subscription> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO user_subscriptions
         (id, profile_id, plan_id, plan_tier, status, current_period_start, current_period_end,
          amount_minor, currency, interval, autopay_enabled, mandate_status, gateway,
          gateway_subscription_id, billing_cycle_count, total_paid_minor, storage_used_mb,
          country, previous_plan_tier, previous_subscription_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
        params![
            &id,
            &input.profile_id,
            &input.plan_id,
            input.plan_tier.as_str(),
            status.as_str(),
            input.current_period_start,
            input.current_period_end,
            input.amount_minor,
            &input.currency,
            input.interval.as_str(),
            input.autopay_enabled,
            input.mandate_status.as_str(),
            input.gateway.as_str(),
            &input.gateway_subscription_id,
            billing_cycle_count,
            total_paid_minor,
            input.storage_used_mb,
            &input.country,
            input.previous_plan_tier.map(|t| t.as_str()),
            &input.previous_subscription_id,
            now,
            now
        ],
    )?;

    Ok(Subscription {
        id,
        profile_id: input.profile_id.clone(),
        plan_id: input.plan_id.clone(),
        plan_tier: input.plan_tier,
        status,
        current_period_start: input.current_period_start,
        current_period_end: input.current_period_end,
        amount_minor: input.amount_minor,
        currency: input.currency.clone(),
        interval: input.interval,
        autopay_enabled: input.autopay_enabled,
        mandate_status: input.mandate_status,
        gateway: input.gateway,
        gateway_subscription_id: input.gateway_subscription_id.clone(),
        billing_cycle_count,
        total_paid_minor,
        storage_used_mb: input.storage_used_mb,
        country: input.country.clone(),
        previous_plan_tier: input.previous_plan_tier,
        previous_subscription_id: input.previous_subscription_id.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_subscription_by_id(conn: &Connection, id: &str) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!("SELECT {} FROM user_subscriptions WHERE id = ?1", SUBSCRIPTION_COLS),
        &[&id],
    )
}

pub fn get_active_subscription(conn: &Connection, profile_id: &str) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM user_subscriptions WHERE profile_id = ?1 AND status = 'active'",
            SUBSCRIPTION_COLS
        ),
        &[&profile_id],
    )
}

pub fn get_subscription_by_gateway_id(
    conn: &Connection,
    gateway: Gateway,
    gateway_subscription_id: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM user_subscriptions
             WHERE gateway = ?1 AND gateway_subscription_id = ?2
             ORDER BY created_at DESC LIMIT 1",
            SUBSCRIPTION_COLS
        ),
        &[&gateway.as_str(), &gateway_subscription_id],
    )
}

pub fn list_subscriptions_for_profile(
    conn: &Connection,
    profile_id: &str,
) -> Result<Vec<Subscription>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM user_subscriptions WHERE profile_id = ?1 ORDER BY created_at DESC",
            SUBSCRIPTION_COLS
        ),
        &[&profile_id],
    )
}

/// Flip any active subscription for the profile to inactive. Returns the
/// number of rows touched (0 or 1 given the partial unique index).
pub fn deactivate_active_subscriptions(conn: &Connection, profile_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE user_subscriptions SET status = 'inactive', updated_at = ?2
         WHERE profile_id = ?1 AND status = 'active'",
        params![profile_id, now()],
    )?;
    Ok(affected)
}

pub fn set_subscription_status(
    conn: &Connection,
    id: &str,
    status: SubscriptionStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE user_subscriptions SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), now()],
    )?;
    Ok(affected > 0)
}

/// Disable autopay and mark the mandate cancelled, leaving status untouched.
pub fn disable_autopay(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE user_subscriptions
         SET autopay_enabled = 0, mandate_status = 'cancelled', updated_at = ?2
         WHERE id = ?1",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

/// Apply a successful recurring charge: cycle count +1, running total, and
/// fresh period bounds. Must run inside the caller's transaction.
pub fn apply_recurring_charge(
    conn: &Connection,
    id: &str,
    amount_minor: i64,
    period_start: i64,
    period_end: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE user_subscriptions
         SET billing_cycle_count = billing_cycle_count + 1,
             total_paid_minor = total_paid_minor + ?2,
             current_period_start = ?3,
             current_period_end = ?4,
             status = 'active',
             updated_at = ?5
         WHERE id = ?1",
        params![id, amount_minor, period_start, period_end, now()],
    )?;
    Ok(affected > 0)
}

/// Expiry sweep: lapse active subscriptions whose paid period ended and
/// whose autopay is off (nothing will renew them). Returns rows affected.
pub fn expire_lapsed_subscriptions(conn: &Connection, as_of: i64) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE user_subscriptions SET status = 'inactive', updated_at = ?1
         WHERE status = 'active' AND autopay_enabled = 0 AND current_period_end < ?1",
        params![as_of],
    )?;
    Ok(affected)
}

// ============ Payment transactions ============

pub fn insert_payment_transaction(
    conn: &Connection,
    input: &CreatePaymentTransaction,
) -> Result<PaymentTransaction> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payment_transactions
         (id, profile_id, subscription_id, gateway, gateway_order_id, gateway_payment_id,
          gateway_signature, amount_minor, currency, status, payment_type, autopay, plan_tier, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            &id,
            &input.profile_id,
            &input.subscription_id,
            input.gateway.as_str(),
            &input.gateway_order_id,
            &input.gateway_payment_id,
            &input.gateway_signature,
            input.amount_minor,
            &input.currency,
            input.status.as_str(),
            input.payment_type.as_str(),
            input.autopay,
            input.plan_tier.map(|t| t.as_str()),
            now
        ],
    )?;

    Ok(PaymentTransaction {
        id,
        profile_id: input.profile_id.clone(),
        subscription_id: input.subscription_id.clone(),
        gateway: input.gateway,
        gateway_order_id: input.gateway_order_id.clone(),
        gateway_payment_id: input.gateway_payment_id.clone(),
        gateway_signature: input.gateway_signature.clone(),
        amount_minor: input.amount_minor,
        currency: input.currency.clone(),
        status: input.status,
        payment_type: input.payment_type,
        autopay: input.autopay,
        plan_tier: input.plan_tier,
        created_at: now,
    })
}

pub fn get_transaction_by_gateway_payment(
    conn: &Connection,
    gateway: Gateway,
    gateway_payment_id: &str,
) -> Result<Option<PaymentTransaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_transactions WHERE gateway = ?1 AND gateway_payment_id = ?2",
            TRANSACTION_COLS
        ),
        &[&gateway.as_str(), &gateway_payment_id],
    )
}

pub fn list_transactions_for_subscription(
    conn: &Connection,
    subscription_id: &str,
) -> Result<Vec<PaymentTransaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_transactions WHERE subscription_id = ?1 ORDER BY created_at",
            TRANSACTION_COLS
        ),
        &[&subscription_id],
    )
}

pub fn set_transaction_status(
    conn: &Connection,
    gateway: Gateway,
    gateway_payment_id: &str,
    status: PaymentStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_transactions SET status = ?3
         WHERE gateway = ?1 AND gateway_payment_id = ?2",
        params![gateway.as_str(), gateway_payment_id, status.as_str()],
    )?;
    Ok(affected > 0)
}

// ============ Billing cycles ============

pub fn insert_billing_cycle(
    conn: &Connection,
    subscription_id: &str,
    cycle_number: i64,
    period_start: i64,
    period_end: i64,
    amount_minor: i64,
    status: CycleStatus,
    transaction_id: Option<&str>,
) -> Result<BillingCycle> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO billing_cycles
         (id, subscription_id, cycle_number, period_start, period_end, amount_minor, status, transaction_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            subscription_id,
            cycle_number,
            period_start,
            period_end,
            amount_minor,
            status.as_str(),
            transaction_id,
            now
        ],
    )?;

    Ok(BillingCycle {
        id,
        subscription_id: subscription_id.to_string(),
        cycle_number,
        period_start,
        period_end,
        amount_minor,
        status,
        transaction_id: transaction_id.map(String::from),
        created_at: now,
    })
}

pub fn list_billing_cycles(conn: &Connection, subscription_id: &str) -> Result<Vec<BillingCycle>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM billing_cycles WHERE subscription_id = ?1 ORDER BY cycle_number",
            BILLING_CYCLE_COLS
        ),
        &[&subscription_id],
    )
}

pub fn max_cycle_number(conn: &Connection, subscription_id: &str) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(cycle_number) FROM billing_cycles WHERE subscription_id = ?1",
        params![subscription_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

// ============ Mentor payments ============

pub fn create_mentor_assignment(
    conn: &Connection,
    mentor_profile_id: &str,
    startup_profile_id: &str,
) -> Result<MentorAssignment> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO mentor_assignments (id, mentor_profile_id, startup_profile_id, status, created_at)
         VALUES (?1, ?2, ?3, 'pending', ?4)",
        params![&id, mentor_profile_id, startup_profile_id, now],
    )?;

    Ok(MentorAssignment {
        id,
        mentor_profile_id: mentor_profile_id.to_string(),
        startup_profile_id: startup_profile_id.to_string(),
        status: AssignmentStatus::Pending,
        created_at: now,
    })
}

pub fn get_mentor_assignment(conn: &Connection, id: &str) -> Result<Option<MentorAssignment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM mentor_assignments WHERE id = ?1",
            MENTOR_ASSIGNMENT_COLS
        ),
        &[&id],
    )
}

pub fn create_mentor_payment(
    conn: &Connection,
    assignment_id: &str,
    profile_id: &str,
    gateway: Gateway,
    gateway_order_id: Option<&str>,
    amount_minor: i64,
    currency: &str,
) -> Result<MentorPayment> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO mentor_payments
         (id, assignment_id, profile_id, gateway, gateway_order_id, amount_minor, currency, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
        params![
            &id,
            assignment_id,
            profile_id,
            gateway.as_str(),
            gateway_order_id,
            amount_minor,
            currency,
            now
        ],
    )?;

    Ok(MentorPayment {
        id,
        assignment_id: assignment_id.to_string(),
        profile_id: profile_id.to_string(),
        gateway,
        gateway_order_id: gateway_order_id.map(String::from),
        gateway_payment_id: None,
        amount_minor,
        currency: currency.to_string(),
        status: MentorPaymentStatus::Pending,
        created_at: now,
        completed_at: None,
    })
}

pub fn find_mentor_payment_by_order(
    conn: &Connection,
    gateway: Gateway,
    gateway_order_id: &str,
) -> Result<Option<MentorPayment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM mentor_payments WHERE gateway = ?1 AND gateway_order_id = ?2",
            MENTOR_PAYMENT_COLS
        ),
        &[&gateway.as_str(), &gateway_order_id],
    )
}

pub fn find_mentor_payment_by_payment_id(
    conn: &Connection,
    gateway: Gateway,
    gateway_payment_id: &str,
) -> Result<Option<MentorPayment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM mentor_payments WHERE gateway = ?1 AND gateway_payment_id = ?2",
            MENTOR_PAYMENT_COLS
        ),
        &[&gateway.as_str(), &gateway_payment_id],
    )
}

pub fn find_pending_mentor_payment_by_assignment(
    conn: &Connection,
    assignment_id: &str,
) -> Result<Option<MentorPayment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM mentor_payments
             WHERE assignment_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC LIMIT 1",
            MENTOR_PAYMENT_COLS
        ),
        &[&assignment_id],
    )
}

// ============ Subscription changes ============

pub struct RecordChange<'a> {
    pub profile_id: &'a str,
    pub old_subscription_id: &'a str,
    pub new_subscription_id: Option<&'a str>,
    pub change_type: ChangeType,
    pub from_tier: PlanTier,
    pub to_tier: PlanTier,
    pub from_amount_minor: i64,
    pub to_amount_minor: i64,
    pub period_start: i64,
    pub period_end: i64,
}

pub fn insert_subscription_change(conn: &Connection, input: &RecordChange) -> Result<String> {
    let id = gen_id();

    conn.execute(
        "INSERT INTO subscription_changes
         (id, profile_id, old_subscription_id, new_subscription_id, change_type,
          from_tier, to_tier, from_amount_minor, to_amount_minor, period_start, period_end, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &id,
            input.profile_id,
            input.old_subscription_id,
            input.new_subscription_id,
            input.change_type.as_str(),
            input.from_tier.as_str(),
            input.to_tier.as_str(),
            input.from_amount_minor,
            input.to_amount_minor,
            input.period_start,
            input.period_end,
            now()
        ],
    )?;
    Ok(id)
}

pub fn list_subscription_changes(
    conn: &Connection,
    profile_id: &str,
) -> Result<Vec<SubscriptionChange>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM subscription_changes WHERE profile_id = ?1 ORDER BY created_at DESC",
            SUBSCRIPTION_CHANGE_COLS
        ),
        &[&profile_id],
    )
}

// ============ Webhook events ============

/// Record a webhook event id, returning false if it was already seen.
/// Gateways redeliver webhooks; this is the first line of idempotency.
pub fn try_record_webhook_event(conn: &Connection, gateway: Gateway, event_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, gateway, event_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![gen_id(), gateway.as_str(), event_id, now()],
    )?;
    Ok(affected > 0)
}

/// Purge old webhook events beyond the retention period. These exist only
/// for redelivery dedupe (gateways retry for a few days at most).
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

/// Complete a mentor payment and activate its assignment, atomically.
pub fn complete_mentor_payment(
    conn: &mut Connection,
    payment_id: &str,
    gateway_payment_id: &str,
) -> Result<()> {
    let tx = conn.transaction()?;
    apply_mentor_payment_completion(&tx, payment_id, gateway_payment_id)?;
    tx.commit()?;
    Ok(())
}

/// Completion steps without transaction management, for callers that need
/// them inside a wider transaction (the webhook dispatcher claims the event
/// id in the same one).
pub fn apply_mentor_payment_completion(
    conn: &Connection,
    payment_id: &str,
    gateway_payment_id: &str,
) -> Result<()> {
    let now = now();

    conn.execute(
        "UPDATE mentor_payments
         SET status = 'completed', gateway_payment_id = ?2, completed_at = ?3
         WHERE id = ?1 AND status != 'completed'",
        params![payment_id, gateway_payment_id, now],
    )?;

    let assignment_id: Option<String> = conn
        .query_row(
            "SELECT assignment_id FROM mentor_payments WHERE id = ?1",
            params![payment_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(assignment_id) = assignment_id {
        conn.execute(
            "UPDATE mentor_assignments SET status = 'active' WHERE id = ?1 AND status = 'pending'",
            params![&assignment_id],
        )?;
    }

    Ok(())
}
