mod billing_cycle;
mod mentor_payment;
mod plan;
mod profile;
mod subscription;
mod subscription_change;
mod transaction;

pub use billing_cycle::*;
pub use mentor_payment::*;
pub use plan::*;
pub use profile::*;
pub use subscription::*;
pub use subscription_change::*;
pub use transaction::*;

/// Payment gateway a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    Razorpay,
    Paypal,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Razorpay => "razorpay",
            Self::Paypal => "paypal",
        }
    }
}

impl std::str::FromStr for Gateway {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "razorpay" => Ok(Self::Razorpay),
            "paypal" => Ok(Self::Paypal),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
