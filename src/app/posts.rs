use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Columns expected by [`post_from_row`]; `p` is `posts`, `u` the owning `users` row.
pub(crate) const POST_COLUMNS: &str = "p.id, p.owner_id, u.handle AS owner_handle, \
     u.avatar_url AS owner_avatar_url, p.caption, p.reaction_count, p.is_pinned, p.created_at";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        owner_handle: row.get("owner_handle"),
        owner_avatar_url: row.get("owner_avatar_url"),
        caption: row.get("caption"),
        reaction_count: row.get("reaction_count"),
        is_pinned: row.get("is_pinned"),
        created_at: row.get("created_at"),
    }
}

/// Read access to posts, plus the pin flag shown on profiles.
/// Post creation and deletion belong to the content service.
#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_pinned(&self, owner_id: Uuid) -> ServiceResult<Vec<Post>> {
        let query = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.owner_id = $1 AND p.is_pinned \
             ORDER BY p.created_at DESC, p.id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> ServiceResult<Vec<Post>> {
        let query = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.owner_id \
             WHERE p.owner_id = $1 \
             ORDER BY p.created_at DESC, p.id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn set_pinned(&self, owner_id: Uuid, post_id: Uuid, pinned: bool) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE posts SET is_pinned = $3 WHERE id = $1 AND owner_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .bind(pinned)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("post not found"));
        }
        Ok(())
    }
}
