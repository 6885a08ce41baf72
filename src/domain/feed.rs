use thiserror::Error;
use time::{Duration, OffsetDateTime};

const MAX_WINDOW_HOURS: i64 = 30 * 24;

/// Rolling time window shared by the personal and global feeds.
///
/// A post is eligible when `now - window <= created_at <= now`. Calendar-day
/// boundaries are never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow(Duration);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedWindowError {
    #[error("window must be at least one hour")]
    TooShort,
    #[error("window must be at most 720 hours")]
    TooLong,
}

impl FeedWindow {
    pub fn hours(hours: i64) -> Result<Self, FeedWindowError> {
        if hours < 1 {
            return Err(FeedWindowError::TooShort);
        }
        if hours > MAX_WINDOW_HOURS {
            return Err(FeedWindowError::TooLong);
        }
        Ok(Self(Duration::hours(hours)))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn bounds(&self, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        (now - self.0, now)
    }
}

impl Default for FeedWindow {
    fn default() -> Self {
        Self(Duration::hours(24))
    }
}
