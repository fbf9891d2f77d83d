use serde::{Deserialize, Serialize};

/// A platform account: viewer, creator, or both.
///
/// Creator balance fields live directly on the user record. They are running
/// sums over the commission ledger and must stay recomputable from it:
/// `available_balance` = sum of `Available` commissions, `lifetime_earned` =
/// sum of non-cancelled commissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_creator: bool,
    /// Premium-access flag; flips only on terminal reconciliation outcomes
    pub premium: bool,
    /// Revenue-share percent applied to this creator's allocations (0-100)
    pub commission_percent: i64,
    /// Minor currency units available for payout
    pub available_balance: i64,
    /// Minor currency units earned over the account lifetime (non-cancelled)
    pub lifetime_earned: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Default revenue share for new creators.
pub const DEFAULT_COMMISSION_PERCENT: i64 = 70;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub is_creator: bool,
    /// Defaults to [`DEFAULT_COMMISSION_PERCENT`] when omitted
    #[serde(default)]
    pub commission_percent: Option<i64>,
}
