//! Subscription lifecycle core.
//!
//! Everything here is pure datastore logic: handlers do the gateway I/O
//! (signature checks, order fetches, mandate cancellations) and then call in
//! with the verified facts. Cross-row invariants (one active subscription per
//! profile, gapless billing cycles) are enforced with single transactions
//! backed by the schema's unique indexes.

pub mod lifecycle;
pub mod verify;

pub use lifecycle::{
    apply_autopay_revocation, apply_gateway_cancellation, downgrade_subscription, mark_past_due,
    record_recurring_charge, stop_autopay, upgrade_subscription, DowngradeOutcome, TierChange,
};
pub use verify::{activate_subscription, ActivateSubscription};
