use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Follower/following counts, always aggregated from the edge table at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(flatten)]
    pub stats: ProfileStats,
}

/// Public fields of a user shown next to edges and requests.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

const MAX_HANDLE_LEN: usize = 30;

/// Path segments that shadow `/users/{handle}` routes.
const RESERVED_HANDLES: &[&str] = &["me"];

pub fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && !RESERVED_HANDLES.contains(&handle)
        && handle.len() <= MAX_HANDLE_LEN
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
