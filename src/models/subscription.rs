use serde::{Deserialize, Serialize};

use super::Gateway;

/// A user's billing relationship with the platform.
///
/// At most one subscription per profile is `active` at any time; superseded
/// rows are flipped to `inactive` and kept as history, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub profile_id: String,
    pub plan_id: String,
    pub plan_tier: PlanTier,
    pub status: SubscriptionStatus,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub autopay_enabled: bool,
    pub mandate_status: MandateStatus,
    pub gateway: Gateway,
    pub gateway_subscription_id: Option<String>,
    pub billing_cycle_count: i64,
    pub total_paid_minor: i64,
    /// Accumulated storage metering, carried across tier changes.
    pub storage_used_mb: i64,
    pub country: Option<String>,
    pub previous_plan_tier: Option<PlanTier>,
    pub previous_subscription_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to insert a new subscription row.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub profile_id: String,
    pub plan_id: String,
    pub plan_tier: PlanTier,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub autopay_enabled: bool,
    pub mandate_status: MandateStatus,
    pub gateway: Gateway,
    pub gateway_subscription_id: Option<String>,
    pub storage_used_mb: i64,
    pub country: Option<String>,
    pub previous_plan_tier: Option<PlanTier>,
    pub previous_subscription_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    PastDue,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Cancelled => "cancelled",
            Self::PastDue => "past_due",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "cancelled" => Ok(Self::Cancelled),
            "past_due" => Ok(Self::PastDue),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Basic,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }

    /// Ordering used for upgrade/downgrade direction checks.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Basic => 1,
            Self::Premium => 2,
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Period length in seconds, used when the gateway does not supply
    /// authoritative period bounds.
    pub fn period_secs(&self) -> i64 {
        match self {
            Self::Monthly => 30 * 86400,
            Self::Yearly => 365 * 86400,
        }
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of the gateway-side recurring-debit authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MandateStatus {
    Active,
    /// Created locally, awaiting gateway-side confirmation (e.g. a PayPal
    /// approval the client has not completed yet).
    Pending,
    Cancelled,
}

impl MandateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for MandateStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MandateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
