use serde::{Deserialize, Serialize};

/// A piece of published content (hosted externally; only metadata lives here).
///
/// Content resolves the beneficiary of a content-bound subscription, and
/// `published_at` drives the "recently active creators" pool for
/// platform-wide revenue splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub published_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContent {
    pub creator_id: String,
    pub title: String,
    pub published_at: i64,
}
