//! Subscription lifecycle: upgrades, downgrades, autopay stop, expiry sweep.

mod common;

use common::*;

fn tier_change(plan: &Plan, now: i64) -> TierChange {
    TierChange {
        new_plan_id: plan.id.clone(),
        new_tier: plan.tier,
        amount_minor: plan.amount_minor,
        currency: plan.currency.clone(),
        interval: plan.interval,
        gateway: Gateway::Razorpay,
        gateway_subscription_id: Some(format!("sub_new_{}", now)),
        mandate_status: MandateStatus::Pending,
        now,
    }
}

#[test]
fn upgrade_basic_to_premium() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);
    let premium = create_test_plan(&conn, PlanTier::Premium, 59900, BillingInterval::Monthly);

    let old = activate_test_subscription(&mut conn, &profile, &basic, "pay_1");
    conn.execute(
        "UPDATE user_subscriptions SET storage_used_mb = 1024 WHERE id = ?1",
        rusqlite::params![&old.id],
    )
    .unwrap();
    let old = queries::get_subscription_by_id(&conn, &old.id).unwrap().unwrap();

    let new_sub =
        billing::upgrade_subscription(&mut conn, &old, &tier_change(&premium, 1_700_100_000))
            .unwrap();

    let old = queries::get_subscription_by_id(&conn, &old.id).unwrap().unwrap();
    assert_eq!(old.status, SubscriptionStatus::Inactive);
    assert!(!old.autopay_enabled);
    assert_eq!(old.mandate_status, MandateStatus::Cancelled);

    assert_eq!(new_sub.status, SubscriptionStatus::Active);
    assert_eq!(new_sub.plan_tier, PlanTier::Premium);
    assert_eq!(new_sub.previous_plan_tier, Some(PlanTier::Basic));
    assert_eq!(new_sub.previous_subscription_id, Some(old.id.clone()));
    assert_eq!(new_sub.storage_used_mb, 1024);

    let changes = queries::list_subscription_changes(&conn, &profile.id).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::Upgrade);
    assert_eq!(changes[0].from_tier, PlanTier::Basic);
    assert_eq!(changes[0].to_tier, PlanTier::Premium);
    assert_eq!(changes[0].from_amount_minor, 29900);
    assert_eq!(changes[0].to_amount_minor, 59900);
}

#[test]
fn upgrade_rejects_same_or_lower_tier() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let premium = create_test_plan(&conn, PlanTier::Premium, 59900, BillingInterval::Monthly);
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    let old = activate_test_subscription(&mut conn, &profile, &premium, "pay_1");

    let err = billing::upgrade_subscription(&mut conn, &old, &tier_change(&basic, 1_700_100_000))
        .unwrap_err();
    assert!(err.to_string().contains("Cannot upgrade"));
    assert_eq!(count_rows(&conn, "subscription_changes"), 0);
}

#[test]
fn downgrade_premium_to_basic_creates_replacement() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let premium = create_test_plan(&conn, PlanTier::Premium, 59900, BillingInterval::Monthly);
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    let old = activate_test_subscription(&mut conn, &profile, &premium, "pay_1");

    let outcome =
        billing::downgrade_subscription(&mut conn, &old, &tier_change(&basic, 1_700_100_000))
            .unwrap();

    let new_sub = match outcome {
        billing::DowngradeOutcome::Replaced(s) => s,
        other => panic!("expected replacement, got {:?}", other),
    };
    assert_eq!(new_sub.plan_tier, PlanTier::Basic);
    assert_eq!(new_sub.previous_plan_tier, Some(PlanTier::Premium));

    let old = queries::get_subscription_by_id(&conn, &old.id).unwrap().unwrap();
    assert_eq!(old.status, SubscriptionStatus::Inactive);

    let changes = queries::list_subscription_changes(&conn, &profile.id).unwrap();
    assert_eq!(changes[0].change_type, ChangeType::Downgrade);
}

#[test]
fn downgrade_to_free_keeps_subscription_until_period_end() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    let old = activate_test_subscription(&mut conn, &profile, &basic, "pay_1");

    let change = TierChange {
        new_plan_id: old.plan_id.clone(),
        new_tier: PlanTier::Free,
        amount_minor: 0,
        currency: old.currency.clone(),
        interval: old.interval,
        gateway: old.gateway,
        gateway_subscription_id: None,
        mandate_status: MandateStatus::Cancelled,
        now: 1_700_100_000,
    };
    let outcome = billing::downgrade_subscription(&mut conn, &old, &change).unwrap();
    assert!(matches!(outcome, billing::DowngradeOutcome::ToFree));

    // The pre-downgrade struct is stale; callers must re-read to see the
    // autopay flag drop
    assert!(old.autopay_enabled);

    // No replacement row; the paid subscription stays active with autopay off
    assert_eq!(count_rows(&conn, "user_subscriptions"), 1);
    let sub = queries::get_subscription_by_id(&conn, &old.id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(!sub.autopay_enabled);
    assert_eq!(sub.mandate_status, MandateStatus::Cancelled);

    let changes = queries::list_subscription_changes(&conn, &profile.id).unwrap();
    assert_eq!(changes[0].to_tier, PlanTier::Free);
    assert_eq!(changes[0].new_subscription_id, None);
}

#[test]
fn downgrade_from_free_is_rejected() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let free = create_test_plan(&conn, PlanTier::Free, 0, BillingInterval::Monthly);

    let old = activate_test_subscription(&mut conn, &profile, &free, "pay_1");

    let change = TierChange {
        new_plan_id: old.plan_id.clone(),
        new_tier: PlanTier::Free,
        amount_minor: 0,
        currency: old.currency.clone(),
        interval: old.interval,
        gateway: old.gateway,
        gateway_subscription_id: None,
        mandate_status: MandateStatus::Cancelled,
        now: 1_700_100_000,
    };
    let err = billing::downgrade_subscription(&mut conn, &old, &change).unwrap_err();
    assert!(err.to_string().contains("Cannot downgrade from free plan"));
}

#[test]
fn stop_autopay_leaves_subscription_active() {
    let mut conn = setup_test_db();
    let profile = create_test_profile(&conn, "auth_u1", "founder");
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    let sub = activate_test_subscription(&mut conn, &profile, &basic, "pay_1");
    billing::stop_autopay(&mut conn, &sub).unwrap();

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert!(!sub.autopay_enabled);
    assert_eq!(sub.mandate_status, MandateStatus::Cancelled);

    let changes = queries::list_subscription_changes(&conn, &profile.id).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::AutopayStop);
}

#[test]
fn expiry_sweep_lapses_only_period_ended_autopay_off_rows() {
    let mut conn = setup_test_db();
    let p1 = create_test_profile(&conn, "auth_u1", "founder");
    let p2 = create_test_profile(&conn, "auth_u2", "founder");
    let p3 = create_test_profile(&conn, "auth_u3", "founder");
    let basic = create_test_plan(&conn, PlanTier::Basic, 29900, BillingInterval::Monthly);

    // Lapsed: period over, autopay off
    let s1 = activate_test_subscription(&mut conn, &p1, &basic, "pay_1");
    billing::stop_autopay(&mut conn, &s1).unwrap();
    // Renewing: period over but autopay still on
    let s2 = activate_test_subscription(&mut conn, &p2, &basic, "pay_2");
    // Current: period not over yet, autopay off
    let s3 = activate_test_subscription(&mut conn, &p3, &basic, "pay_3");
    billing::stop_autopay(&mut conn, &s3).unwrap();

    let after_period = 1_700_000_000 + 31 * 86400;
    conn.execute(
        "UPDATE user_subscriptions SET current_period_end = ?2 WHERE id = ?1",
        rusqlite::params![&s3.id, after_period + 86400],
    )
    .unwrap();

    let expired = queries::expire_lapsed_subscriptions(&conn, after_period).unwrap();
    assert_eq!(expired, 1);

    let s1 = queries::get_subscription_by_id(&conn, &s1.id).unwrap().unwrap();
    let s2 = queries::get_subscription_by_id(&conn, &s2.id).unwrap().unwrap();
    let s3 = queries::get_subscription_by_id(&conn, &s3.id).unwrap().unwrap();
    assert_eq!(s1.status, SubscriptionStatus::Inactive);
    assert_eq!(s2.status, SubscriptionStatus::Active);
    assert_eq!(s3.status, SubscriptionStatus::Active);
}
