use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Read-only view of a post as the feeds and profiles present it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_avatar_url: Option<String>,
    pub caption: Option<String>,
    pub reaction_count: i64,
    pub is_pinned: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
