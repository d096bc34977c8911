//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PROFILE_COLS: &str = "id, auth_user_id, role, country, created_at";

pub const PLAN_COLS: &str = "id, name, tier, user_type, amount_minor, currency, interval, created_at";

pub const PLAN_PRICE_COLS: &str = "plan_id, country, amount_minor, currency";

pub const PLAN_CACHE_COLS: &str =
    "id, gateway, amount_minor, currency, period, interval_count, gateway_plan_id, created_at";

pub const SUBSCRIPTION_COLS: &str = "id, profile_id, plan_id, plan_tier, status, current_period_start, current_period_end, amount_minor, currency, interval, autopay_enabled, mandate_status, gateway, gateway_subscription_id, billing_cycle_count, total_paid_minor, storage_used_mb, country, previous_plan_tier, previous_subscription_id, created_at, updated_at";

pub const TRANSACTION_COLS: &str = "id, profile_id, subscription_id, gateway, gateway_order_id, gateway_payment_id, gateway_signature, amount_minor, currency, status, payment_type, autopay, plan_tier, created_at";

pub const BILLING_CYCLE_COLS: &str = "id, subscription_id, cycle_number, period_start, period_end, amount_minor, status, transaction_id, created_at";

pub const MENTOR_PAYMENT_COLS: &str = "id, assignment_id, profile_id, gateway, gateway_order_id, gateway_payment_id, amount_minor, currency, status, created_at, completed_at";

pub const MENTOR_ASSIGNMENT_COLS: &str =
    "id, mentor_profile_id, startup_profile_id, status, created_at";

pub const SUBSCRIPTION_CHANGE_COLS: &str = "id, profile_id, old_subscription_id, new_subscription_id, change_type, from_tier, to_tier, from_amount_minor, to_amount_minor, period_start, period_end, created_at";

// ============ FromRow Implementations ============

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            id: row.get(0)?,
            auth_user_id: row.get(1)?,
            role: row.get(2)?,
            country: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Plan {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Plan {
            id: row.get(0)?,
            name: row.get(1)?,
            tier: parse_enum(row, 2, "tier")?,
            user_type: row.get(3)?,
            amount_minor: row.get(4)?,
            currency: row.get(5)?,
            interval: parse_enum(row, 6, "interval")?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for PlanPrice {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PlanPrice {
            plan_id: row.get(0)?,
            country: row.get(1)?,
            amount_minor: row.get(2)?,
            currency: row.get(3)?,
        })
    }
}

impl FromRow for PlanCacheEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PlanCacheEntry {
            id: row.get(0)?,
            gateway: parse_enum(row, 1, "gateway")?,
            amount_minor: row.get(2)?,
            currency: row.get(3)?,
            period: parse_enum(row, 4, "period")?,
            interval_count: row.get(5)?,
            gateway_plan_id: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let previous_plan_tier: Option<PlanTier> = row
            .get::<_, Option<String>>(18)?
            .and_then(|s| s.parse().ok());
        Ok(Subscription {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            plan_id: row.get(2)?,
            plan_tier: parse_enum(row, 3, "plan_tier")?,
            status: parse_enum(row, 4, "status")?,
            current_period_start: row.get(5)?,
            current_period_end: row.get(6)?,
            amount_minor: row.get(7)?,
            currency: row.get(8)?,
            interval: parse_enum(row, 9, "interval")?,
            autopay_enabled: row.get(10)?,
            mandate_status: parse_enum(row, 11, "mandate_status")?,
            gateway: parse_enum(row, 12, "gateway")?,
            gateway_subscription_id: row.get(13)?,
            billing_cycle_count: row.get(14)?,
            total_paid_minor: row.get(15)?,
            storage_used_mb: row.get(16)?,
            country: row.get(17)?,
            previous_plan_tier,
            previous_subscription_id: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }
}

impl FromRow for PaymentTransaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let plan_tier: Option<PlanTier> = row
            .get::<_, Option<String>>(12)?
            .and_then(|s| s.parse().ok());
        Ok(PaymentTransaction {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            subscription_id: row.get(2)?,
            gateway: parse_enum(row, 3, "gateway")?,
            gateway_order_id: row.get(4)?,
            gateway_payment_id: row.get(5)?,
            gateway_signature: row.get(6)?,
            amount_minor: row.get(7)?,
            currency: row.get(8)?,
            status: parse_enum(row, 9, "status")?,
            payment_type: parse_enum(row, 10, "payment_type")?,
            autopay: row.get(11)?,
            plan_tier,
            created_at: row.get(13)?,
        })
    }
}

impl FromRow for BillingCycle {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BillingCycle {
            id: row.get(0)?,
            subscription_id: row.get(1)?,
            cycle_number: row.get(2)?,
            period_start: row.get(3)?,
            period_end: row.get(4)?,
            amount_minor: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            transaction_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for MentorPayment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(MentorPayment {
            id: row.get(0)?,
            assignment_id: row.get(1)?,
            profile_id: row.get(2)?,
            gateway: parse_enum(row, 3, "gateway")?,
            gateway_order_id: row.get(4)?,
            gateway_payment_id: row.get(5)?,
            amount_minor: row.get(6)?,
            currency: row.get(7)?,
            status: parse_enum(row, 8, "status")?,
            created_at: row.get(9)?,
            completed_at: row.get(10)?,
        })
    }
}

impl FromRow for MentorAssignment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(MentorAssignment {
            id: row.get(0)?,
            mentor_profile_id: row.get(1)?,
            startup_profile_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for SubscriptionChange {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SubscriptionChange {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            old_subscription_id: row.get(2)?,
            new_subscription_id: row.get(3)?,
            change_type: parse_enum(row, 4, "change_type")?,
            from_tier: parse_enum(row, 5, "from_tier")?,
            to_tier: parse_enum(row, 6, "to_tier")?,
            from_amount_minor: row.get(7)?,
            to_amount_minor: row.get(8)?,
            period_start: row.get(9)?,
            period_end: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}
