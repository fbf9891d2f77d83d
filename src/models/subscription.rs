use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::util::SECONDS_PER_DAY;

/// One purchase/renewal attempt, correlated to the gateway by `transaction_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    /// Unique reference handed to the payment gateway at checkout
    pub transaction_ref: String,
    pub user_id: String,
    /// Bound content item; None means a platform-wide subscription
    pub content_id: Option<String>,
    pub plan: Plan,
    /// Amount paid, minor currency units
    pub amount_minor: i64,
    pub payment_status: PaymentStatus,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    /// active implies payment_status = Approved and now < period_end
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscription {
    pub user_id: String,
    #[serde(default)]
    pub content_id: Option<String>,
    pub plan: Plan,
    pub amount_minor: i64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Plan {
    Monthly,
    Yearly,
}

impl Plan {
    /// Billing period length in seconds.
    pub fn period_secs(&self) -> i64 {
        match self {
            Self::Monthly => 30 * SECONDS_PER_DAY,
            Self::Yearly => 365 * SECONDS_PER_DAY,
        }
    }
}

/// Subscription payment state machine: `Pending -> Approved | Rejected | Cancelled`.
///
/// A `Rejected`/`Cancelled` subscription never becomes `Approved` again. An
/// `Approved` subscription may still move to `Rejected`/`Cancelled` through
/// the chargeback path, which also reverses any allocated commissions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}
