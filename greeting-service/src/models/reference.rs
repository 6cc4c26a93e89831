use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lookup-table record curated out-of-band (by migration), never audited per user.
///
/// `expires_at = None` means the record never expires.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferenceEntity {
    pub id: i64,
    pub code: String,
    pub label: String,
    pub ordinal: i32,
    pub effective_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReferenceEntity {
    /// Whether the record's validity window contains `at` (start inclusive, end exclusive).
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_at <= at && self.expires_at.map_or(true, |expires| at < expires)
    }
}
