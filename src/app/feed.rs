use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::app::error::ServiceResult;
use crate::app::posts::{post_from_row, POST_COLUMNS};
use crate::app::social::SocialService;
use crate::domain::feed::FeedWindow;
use crate::domain::post::Post;
use crate::infra::db::Db;

pub const GLOBAL_FEED_MAX_LIMIT: i64 = 100;

/// Read-only feed composition over follow edges and posts.
#[derive(Clone)]
pub struct FeedService {
    db: Db,
    social: SocialService,
}

impl FeedService {
    pub fn new(db: Db, social: SocialService) -> Self {
        Self { db, social }
    }

    /// Posts by accounts `user_id` follows, newest first, limited to `window`.
    ///
    /// Returns at most `limit` posts plus the cursor of the next page.
    pub async fn personal_feed(
        &self,
        user_id: Uuid,
        window: FeedWindow,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> ServiceResult<(Vec<Post>, Option<(OffsetDateTime, Uuid)>)> {
        // Materialize the followee set first; the post query filters on the concrete ids.
        let followee_ids = self.social.followee_ids(user_id).await?;
        if followee_ids.is_empty() {
            return Ok((Vec::new(), None));
        }

        let (since, until) = window.bounds(OffsetDateTime::now_utc());
        let limit_plus = limit + 1;

        let rows = match cursor {
            Some((created_at, post_id)) => {
                let query = format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.owner_id \
                     WHERE p.owner_id = ANY($1) \
                       AND p.created_at >= $2 AND p.created_at <= $3 \
                       AND (p.created_at < $4 OR (p.created_at = $4 AND p.id < $5)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $6"
                );
                sqlx::query(&query)
                    .bind(followee_ids.as_slice())
                    .bind(since)
                    .bind(until)
                    .bind(created_at)
                    .bind(post_id)
                    .bind(limit_plus)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {POST_COLUMNS} \
                     FROM posts p \
                     JOIN users u ON u.id = p.owner_id \
                     WHERE p.owner_id = ANY($1) \
                       AND p.created_at >= $2 AND p.created_at <= $3 \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4"
                );
                sqlx::query(&query)
                    .bind(followee_ids.as_slice())
                    .bind(since)
                    .bind(until)
                    .bind(limit_plus)
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        let mut posts: Vec<Post> = rows.iter().map(post_from_row).collect();

        let next_cursor = if posts.len() > limit as usize {
            posts.pop();
            posts.last().map(|last| (last.created_at, last.id))
        } else {
            None
        };

        debug!(
            user_id = %user_id,
            followees = followee_ids.len(),
            posts = posts.len(),
            "personal feed composed"
        );

        Ok((posts, next_cursor))
    }

    /// Most-reacted posts inside `window`; ties go to the newer post.
    pub async fn global_feed(&self, limit: i64, window: FeedWindow) -> ServiceResult<Vec<Post>> {
        let (since, until) = window.bounds(OffsetDateTime::now_utc());

        let query = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.created_at >= $1 AND p.created_at <= $2 \
             ORDER BY p.reaction_count DESC, p.created_at DESC, p.id DESC \
             LIMIT $3"
        );
        let rows = sqlx::query(&query)
            .bind(since)
            .bind(until)
            .bind(limit.clamp(1, GLOBAL_FEED_MAX_LIMIT))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }
}
