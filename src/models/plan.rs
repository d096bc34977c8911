use serde::{Deserialize, Serialize};

use super::{BillingInterval, Gateway, PlanTier};

/// Application-side plan catalog entry (what a user subscribes to).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub tier: PlanTier,
    /// Profile role this plan targets (founder, mentor, investor).
    pub user_type: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub created_at: i64,
}

/// Country-specific price override for a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPrice {
    pub plan_id: String,
    pub country: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Composite key identifying one set of gateway recurring-billing terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanKey {
    pub gateway: Gateway,
    pub amount_minor: i64,
    pub currency: String,
    pub period: BillingInterval,
    pub interval_count: i64,
}

/// Cached mapping from pricing terms to a gateway-side plan identifier,
/// preventing duplicate gateway plan creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCacheEntry {
    pub id: String,
    pub gateway: Gateway,
    pub amount_minor: i64,
    pub currency: String,
    pub period: BillingInterval,
    pub interval_count: i64,
    pub gateway_plan_id: String,
    pub created_at: i64,
}
