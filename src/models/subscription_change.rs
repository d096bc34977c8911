use serde::{Deserialize, Serialize};

use super::PlanTier;

/// Audit record of a tier transition (upgrade, downgrade, autopay stop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionChange {
    pub id: String,
    pub profile_id: String,
    pub old_subscription_id: String,
    /// None for downgrade-to-free, which creates no replacement row.
    pub new_subscription_id: Option<String>,
    pub change_type: ChangeType,
    pub from_tier: PlanTier,
    pub to_tier: PlanTier,
    pub from_amount_minor: i64,
    pub to_amount_minor: i64,
    pub period_start: i64,
    pub period_end: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Upgrade,
    Downgrade,
    AutopayStop,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
            Self::AutopayStop => "autopay_stop",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upgrade" => Ok(Self::Upgrade),
            "downgrade" => Ok(Self::Downgrade),
            "autopay_stop" => Ok(Self::AutopayStop),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
