use serde::{Deserialize, Serialize};

/// One discrete period of paid service within a subscription's lifetime.
///
/// `cycle_number` starts at 1 and increases by exactly 1 per successful
/// charge; UNIQUE(subscription_id, cycle_number) keeps the sequence gapless
/// under webhook redelivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCycle {
    pub id: String,
    pub subscription_id: String,
    pub cycle_number: i64,
    pub period_start: i64,
    pub period_end: i64,
    pub amount_minor: i64,
    pub status: CycleStatus,
    /// Payment transaction that paid for this cycle.
    pub transaction_id: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Paid,
    Pending,
    Failed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CycleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
