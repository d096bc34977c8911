//! Gateway plan cache: one gateway plan per distinct pricing terms.

mod common;

use common::*;

fn key(amount_minor: i64, period: BillingInterval) -> PlanKey {
    PlanKey {
        gateway: Gateway::Razorpay,
        amount_minor,
        currency: "INR".to_string(),
        period,
        interval_count: 1,
    }
}

#[test]
fn first_insert_wins_for_identical_terms() {
    let conn = setup_test_db();
    let k = key(29900, BillingInterval::Monthly);

    assert!(queries::try_insert_plan_mapping(&conn, &k, "plan_A").unwrap());
    // A concurrent creator losing the race must not overwrite the mapping
    assert!(!queries::try_insert_plan_mapping(&conn, &k, "plan_B").unwrap());

    let entry = queries::find_plan_mapping(&conn, &k).unwrap().unwrap();
    assert_eq!(entry.gateway_plan_id, "plan_A");
}

#[test]
fn distinct_terms_map_to_distinct_plans() {
    let conn = setup_test_db();

    let monthly = key(29900, BillingInterval::Monthly);
    let yearly = key(29900, BillingInterval::Yearly);
    let pricier = key(59900, BillingInterval::Monthly);

    assert!(queries::try_insert_plan_mapping(&conn, &monthly, "plan_m").unwrap());
    assert!(queries::try_insert_plan_mapping(&conn, &yearly, "plan_y").unwrap());
    assert!(queries::try_insert_plan_mapping(&conn, &pricier, "plan_p").unwrap());

    assert_eq!(
        queries::find_plan_mapping(&conn, &monthly).unwrap().unwrap().gateway_plan_id,
        "plan_m"
    );
    assert_eq!(
        queries::find_plan_mapping(&conn, &yearly).unwrap().unwrap().gateway_plan_id,
        "plan_y"
    );
    assert_eq!(
        queries::find_plan_mapping(&conn, &pricier).unwrap().unwrap().gateway_plan_id,
        "plan_p"
    );
}

#[test]
fn unknown_terms_miss() {
    let conn = setup_test_db();
    assert!(queries::find_plan_mapping(&conn, &key(12345, BillingInterval::Monthly))
        .unwrap()
        .is_none());
}
