//! Prefixed ID generation for Splitstream entities.
//!
//! All IDs use an `ss_` brand prefix to guarantee collision avoidance with
//! gateway-assigned identifiers (webhook event ids, transaction references).
//!
//! Format: `ss_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["ss_usr_", "ss_cnt_", "ss_sub_", "ss_com_", "ss_txr_"];

/// Validate that a string is a valid Splitstream prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `ss_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Splitstream.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Content,
    Subscription,
    Commission,
    /// Transaction references handed to the payment gateway at checkout
    TransactionRef,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "ss_usr",
            Self::Content => "ss_cnt",
            Self::Subscription => "ss_sub",
            Self::Commission => "ss_com",
            Self::TransactionRef => "ss_txr",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
