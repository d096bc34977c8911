use serde::{Deserialize, Serialize};

use super::{Gateway, PlanTier};

/// Immutable record of one gateway payment event.
///
/// Rows are created once per payment attempt and never mutated except for
/// status transitions (pending -> success/failed/refunded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub profile_id: String,
    /// Nullable until the subscription row exists (linked after creation).
    pub subscription_id: Option<String>,
    pub gateway: Gateway,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: String,
    pub gateway_signature: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub autopay: bool,
    pub plan_tier: Option<PlanTier>,
    pub created_at: i64,
}

/// Data required to create a new payment transaction.
#[derive(Debug, Clone)]
pub struct CreatePaymentTransaction {
    pub profile_id: String,
    pub subscription_id: Option<String>,
    pub gateway: Gateway,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: String,
    pub gateway_signature: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub autopay: bool,
    pub plan_tier: Option<PlanTier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why this payment happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Initial,
    Recurring,
    Upgrade,
    Downgrade,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Recurring => "recurring",
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "recurring" => Ok(Self::Recurring),
            "upgrade" => Ok(Self::Upgrade),
            "downgrade" => Ok(Self::Downgrade),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
