//! Payment verification bookkeeping: subscription activation, idempotency,
//! and mentor-payment classification.

mod common;

use common::*;

#[test]
fn verified_payment_creates_subscription_transaction_and_first_cycle() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    let sub = billing::activate_subscription(
        &mut conn,
        &activation_input(&profile, &plan, "pay_1", 1_700_000_000),
    )
    .unwrap();

    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.plan_tier, PlanTier::Basic);
    assert_eq!(sub.billing_cycle_count, 1);
    assert_eq!(sub.total_paid_minor, 29900);
    assert_eq!(sub.current_period_end, 1_700_000_000 + 30 * 86400);

    let txs = queries::list_transactions_for_subscription(&conn, &sub.id).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].status, PaymentStatus::Success);
    assert_eq!(txs[0].payment_type, PaymentType::Initial);
    assert_eq!(txs[0].gateway_payment_id, "pay_1");

    let cycles = queries::list_billing_cycles(&conn, &sub.id).unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].cycle_number, 1);
    assert_eq!(cycles[0].status, CycleStatus::Paid);
    assert_eq!(cycles[0].transaction_id.as_deref(), Some(txs[0].id.as_str()));
}

#[test]
fn duplicate_payment_id_does_not_create_second_subscription() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    let first = billing::activate_subscription(
        &mut conn,
        &activation_input(&profile, &plan, "pay_1", 1_700_000_000),
    )
    .unwrap();
    let second = billing::activate_subscription(
        &mut conn,
        &activation_input(&profile, &plan, "pay_1", 1_700_000_100),
    )
    .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(count_rows(&conn, "user_subscriptions"), 1);
    assert_eq!(count_rows(&conn, "payment_transactions"), 1);
    assert_eq!(count_rows(&conn, "billing_cycles"), 1);
}

#[test]
fn new_subscription_supersedes_previous_active_one() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let premium = create_test_plan(&conn, PlanTier::Premium, 59900, BillingInterval::Monthly);

    let old = activate_test_subscription(&mut conn, &profile, &basic, "pay_1");
    conn.execute(
        "UPDATE user_subscriptions SET storage_used_mb = 420 WHERE id = ?1",
        rusqlite::params![&old.id],
    )
    .unwrap();

    let new = billing::activate_subscription(
        &mut conn,
        &activation_input(&profile, &premium, "pay_2", 1_700_100_000),
    )
    .unwrap();

    let old = queries::get_subscription_by_id(&conn, &old.id).unwrap().unwrap();
    assert_eq!(old.status, SubscriptionStatus::Inactive);
    assert_eq!(new.status, SubscriptionStatus::Active);
    assert_eq!(new.previous_plan_tier, Some(PlanTier::Basic));
    assert_eq!(new.previous_subscription_id, Some(old.id.clone()));
    // Storage metering carries across the transition
    assert_eq!(new.storage_used_mb, 420);

    let active = queries::get_active_subscription(&conn, &profile.id).unwrap().unwrap();
    assert_eq!(active.id, new.id);
}

#[test]
fn one_active_subscription_invariant_enforced_by_schema() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    activate_test_subscription(&mut conn, &profile, &plan, "pay_1");

    // Bypass the transaction logic and try to force a second active row;
    // the partial unique index must reject it.
    let result = conn.execute(
        "INSERT INTO user_subscriptions
         (id, profile_id, plan_id, plan_tier, status, current_period_start, current_period_end,
          amount_minor, currency, interval, autopay_enabled, mandate_status, gateway,
          billing_cycle_count, total_paid_minor, storage_used_mb, created_at, updated_at)
         VALUES ('dup', ?1, ?2, 'basic', 'active', 0, 1, 29900, 'INR', 'monthly', 1, 'active',
                 'razorpay', 1, 29900, 0, 0, 0)",
        rusqlite::params![&profile.id, &plan.id],
    );
    assert!(result.is_err());
}

#[test]
fn profile_resolution_prefers_role_matching_plan_user_type() {
    let conn = setup_test_db();
    let founder = create_test_profile(&conn, "auth_shared", "founder");
    let mentor = create_test_profile(&conn, "auth_shared", "mentor");

    let resolved = queries::resolve_profile(&conn, "auth_shared", "mentor")
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, mentor.id);

    let resolved = queries::resolve_profile(&conn, "auth_shared", "founder")
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, founder.id);

    // A direct profile id wins over auth resolution
    let resolved = queries::resolve_profile(&conn, &mentor.id, "founder")
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, mentor.id);
}

#[test]
fn mentor_payment_never_enters_payment_transactions() {
    let mut conn = setup_test_db();
    let mentor = create_test_profile(&conn, "auth_m1", "mentor");
    let startup = create_test_profile(&conn, "auth_s1", "founder");
    let (assignment, payment) =
        create_test_assignment_with_payment(&conn, &mentor, &startup, "order_m1");

    queries::complete_mentor_payment(&mut conn, &payment.id, "pay_m1").unwrap();

    let payment = queries::find_mentor_payment_by_payment_id(&conn, Gateway::Razorpay, "pay_m1")
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, MentorPaymentStatus::Completed);

    let assignment = queries::get_mentor_assignment(&conn, &assignment.id)
        .unwrap()
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Active);

    assert_eq!(count_rows(&conn, "payment_transactions"), 0);
    assert_eq!(count_rows(&conn, "user_subscriptions"), 0);
}

#[test]
fn completing_mentor_payment_twice_is_idempotent() {
    let mut conn = setup_test_db();
    let mentor = create_test_profile(&conn, "auth_m1", "mentor");
    let startup = create_test_profile(&conn, "auth_s1", "founder");
    let (_, payment) = create_test_assignment_with_payment(&conn, &mentor, &startup, "order_m1");

    queries::complete_mentor_payment(&mut conn, &payment.id, "pay_m1").unwrap();
    queries::complete_mentor_payment(&mut conn, &payment.id, "pay_m1").unwrap();

    let completed = queries::find_mentor_payment_by_order(&conn, Gateway::Razorpay, "order_m1")
        .unwrap()
        .unwrap();
    assert_eq!(completed.status, MentorPaymentStatus::Completed);
    assert_eq!(completed.gateway_payment_id.as_deref(), Some("pay_m1"));
}

#[test]
fn country_price_overrides_fall_back_to_plan_base() {
    let conn = setup_test_db();
    let plan = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    queries::set_plan_price(&conn, &plan.id, "US", 999, "USD").unwrap();

    let (amount, currency) = queries::price_for_country(&conn, &plan, Some("US")).unwrap();
    assert_eq!((amount, currency.as_str()), (999, "USD"));

    let (amount, currency) = queries::price_for_country(&conn, &plan, Some("DE")).unwrap();
    assert_eq!((amount, currency.as_str()), (29900, "INR"));

    let (amount, currency) = queries::price_for_country(&conn, &plan, None).unwrap();
    assert_eq!((amount, currency.as_str()), (29900, "INR"));
}
