use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// A creator's revenue share from one approved payment.
///
/// `amount_minor = floor(original_amount * applied_percent / 100)`. Created at
/// the moment a subscription is approved; cancelled if the subscription is
/// later rejected or charged back before payout; moved to `Paid` only by the
/// payout subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: String,
    pub creator_id: String,
    pub subscription_id: String,
    pub content_id: Option<String>,
    pub amount_minor: i64,
    /// Commission percent in effect when the allocation was made
    pub applied_percent: i64,
    pub status: CommissionStatus,
    pub generated_at: i64,
    pub available_at: Option<i64>,
    pub paid_at: Option<i64>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Available,
    Paid,
    Cancelled,
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}
