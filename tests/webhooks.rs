//! Webhook-driven bookkeeping: recurring charges, gateway-side status
//! transitions, and event-level dedupe.

mod common;

use common::*;

#[test]
fn recurring_charge_advances_cycle_and_period() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    let period_start = sub.current_period_end;
    let period_end = period_start + 30 * 86400;
    let recorded = billing::record_recurring_charge(
        &mut conn,
        &sub,
        Some("evt_charge_1"),
        "pay_2",
        29900,
        period_start,
        period_end,
    )
    .unwrap();
    assert!(recorded);

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.billing_cycle_count, 2);
    assert_eq!(sub.total_paid_minor, 59800);
    assert_eq!(sub.current_period_start, period_start);
    assert_eq!(sub.current_period_end, period_end);
    assert_eq!(sub.status, SubscriptionStatus::Active);

    let cycles = queries::list_billing_cycles(&conn, &sub.id).unwrap();
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].cycle_number, 2);
    assert_eq!(cycles[1].status, CycleStatus::Paid);

    let txs = queries::list_transactions_for_subscription(&conn, &sub.id).unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().any(|t| t.payment_type == PaymentType::Recurring
        && t.gateway_payment_id == "pay_2"));
}

#[test]
fn redelivered_charge_records_exactly_one_cycle() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    let period_start = sub.current_period_end;
    let period_end = period_start + 30 * 86400;

    // Redelivery arrives under a fresh event id but the same payment id
    let first = billing::record_recurring_charge(
        &mut conn,
        &sub,
        Some("evt_a"),
        "pay_2",
        29900,
        period_start,
        period_end,
    )
    .unwrap();
    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    let second = billing::record_recurring_charge(
        &mut conn,
        &sub,
        Some("evt_b"),
        "pay_2",
        29900,
        period_start,
        period_end,
    )
    .unwrap();

    assert!(first);
    assert!(!second);

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.billing_cycle_count, 2);
    assert_eq!(sub.total_paid_minor, 59800);

    // Cycle numbers stay gapless
    let cycles = queries::list_billing_cycles(&conn, &sub.id).unwrap();
    let numbers: Vec<i64> = cycles.iter().map(|c| c.cycle_number).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn redelivered_event_id_is_acknowledged_without_reprocessing() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    let period_start = sub.current_period_end;
    let period_end = period_start + 30 * 86400;

    let first = billing::record_recurring_charge(
        &mut conn,
        &sub,
        Some("evt_1"),
        "pay_2",
        29900,
        period_start,
        period_end,
    )
    .unwrap();
    // Same event id again, even with a different payment id in the payload
    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    let second = billing::record_recurring_charge(
        &mut conn,
        &sub,
        Some("evt_1"),
        "pay_2_retry",
        29900,
        period_start,
        period_end,
    )
    .unwrap();

    assert!(first);
    assert!(!second);
    assert_eq!(count_rows(&conn, "billing_cycles"), 2);
    assert_eq!(count_rows(&conn, "payment_transactions"), 2);
}

#[test]
fn failed_charge_recording_releases_the_event_claim() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    let period_start = sub.current_period_end;
    let period_end = period_start + 30 * 86400;

    // Occupy cycle number 2 so the insert hits the UNIQUE constraint and
    // the whole transaction rolls back
    queries::insert_billing_cycle(
        &conn,
        &sub.id,
        2,
        period_start,
        period_end,
        29900,
        CycleStatus::Pending,
        None,
    )
    .unwrap();

    let result = billing::record_recurring_charge(
        &mut conn,
        &sub,
        Some("evt_1"),
        "pay_2",
        29900,
        period_start,
        period_end,
    );
    assert!(result.is_err());

    // The claim must roll back with the failed mutation; otherwise the
    // gateway's redelivery would be answered "Already processed" and the
    // charge would never be recorded.
    assert_eq!(count_rows(&conn, "webhook_events"), 0);
    assert!(queries::try_record_webhook_event(&conn, Gateway::Razorpay, "evt_1").unwrap());
    assert_eq!(count_rows(&conn, "payment_transactions"), 1);
}

#[test]
fn autopay_revocation_keeps_subscription_active_until_period_end() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    billing::apply_autopay_revocation(&conn, &sub.id).unwrap();

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(!sub.autopay_enabled);
    assert_eq!(sub.mandate_status, MandateStatus::Cancelled);
}

#[test]
fn gateway_cancellation_with_autopay_on_grants_grace() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    billing::apply_gateway_cancellation(&conn, &sub).unwrap();

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(!sub.autopay_enabled);
}

#[test]
fn gateway_cancellation_with_autopay_off_is_terminal() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    billing::apply_autopay_revocation(&conn, &sub.id).unwrap();
    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    billing::apply_gateway_cancellation(&conn, &sub).unwrap();

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);
}

#[test]
fn failed_charge_marks_subscription_past_due() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let sub = activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    billing::mark_past_due(&conn, &sub.id).unwrap();

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::PastDue);
}

#[test]
fn webhook_event_claim_succeeds_once_per_event_id() {
    let conn = setup_test_db();

    assert!(queries::try_record_webhook_event(&conn, Gateway::Razorpay, "evt_1").unwrap());
    assert!(!queries::try_record_webhook_event(&conn, Gateway::Razorpay, "evt_1").unwrap());

    // Same id under a different gateway is a distinct event
    assert!(queries::try_record_webhook_event(&conn, Gateway::Paypal, "evt_1").unwrap());
    assert!(queries::try_record_webhook_event(&conn, Gateway::Razorpay, "evt_2").unwrap());
}

#[test]
fn webhook_event_purge_drops_only_old_rows() {
    let conn = setup_test_db();

    assert!(queries::try_record_webhook_event(&conn, Gateway::Razorpay, "evt_old").unwrap());
    conn.execute(
        "UPDATE webhook_events SET created_at = ?1 WHERE event_id = 'evt_old'",
        rusqlite::params![queries::now() - 40 * 86400],
    )
    .unwrap();
    assert!(queries::try_record_webhook_event(&conn, Gateway::Razorpay, "evt_new").unwrap());

    let purged = queries::purge_old_webhook_events(&conn, 30).unwrap();
    assert_eq!(purged, 1);
    assert_eq!(count_rows(&conn, "webhook_events"), 1);
}
