//! Test utilities and fixtures for Payrail integration tests

#![allow(dead_code)]

use rusqlite::Connection;

pub use payrail::billing::{self, ActivateSubscription, TierChange};
pub use payrail::db::{init_db, queries};
pub use payrail::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

pub fn create_test_profile(conn: &Connection, auth_user_id: &str, role: &str) -> Profile {
    queries::create_profile(
        conn,
        &CreateProfile {
            auth_user_id: auth_user_id.to_string(),
            role: role.to_string(),
            country: Some("IN".to_string()),
        },
    )
    .expect("Failed to create test profile")
}

pub fn create_test_plan(
    conn: &Connection,
    tier: PlanTier,
    amount_minor: i64,
    interval: BillingInterval,
) -> Plan {
    queries::create_plan(
        conn,
        &queries::CreatePlan {
            name: format!("{} {}", tier, interval),
            tier,
            user_type: "founder".to_string(),
            amount_minor,
            currency: "INR".to_string(),
            interval,
        },
    )
    .expect("Failed to create test plan")
}

/// Standard verified-payment input for activating a subscription.
pub fn activation_input(
    profile: &Profile,
    plan: &Plan,
    payment_id: &str,
    now: i64,
) -> ActivateSubscription {
    ActivateSubscription {
        profile_id: profile.id.clone(),
        plan_id: plan.id.clone(),
        plan_tier: plan.tier,
        gateway: Gateway::Razorpay,
        gateway_order_id: Some(format!("order_{}", payment_id)),
        gateway_subscription_id: Some(format!("sub_{}", payment_id)),
        gateway_payment_id: payment_id.to_string(),
        gateway_signature: Some("sig".to_string()),
        amount_minor: plan.amount_minor,
        currency: plan.currency.clone(),
        interval: plan.interval,
        autopay_enabled: true,
        mandate_status: MandateStatus::Active,
        country: Some("IN".to_string()),
        now,
    }
}

/// Activate a subscription for the profile via the verified-payment path.
pub fn activate_test_subscription(
    conn: &mut Connection,
    profile: &Profile,
    plan: &Plan,
    payment_id: &str,
) -> Subscription {
    billing::activate_subscription(conn, &activation_input(profile, plan, payment_id, 1_700_000_000))
        .expect("Failed to activate test subscription")
}

pub fn create_test_assignment_with_payment(
    conn: &Connection,
    mentor: &Profile,
    startup: &Profile,
    order_id: &str,
) -> (MentorAssignment, MentorPayment) {
    let assignment = queries::create_mentor_assignment(conn, &mentor.id, &startup.id)
        .expect("Failed to create test assignment");
    let payment = queries::create_mentor_payment(
        conn,
        &assignment.id,
        &startup.id,
        Gateway::Razorpay,
        Some(order_id),
        500000,
        "INR",
    )
    .expect("Failed to create test mentor payment");
    (assignment, payment)
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}
