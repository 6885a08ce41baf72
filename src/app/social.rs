use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::app::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::app::profiles::ProfileDirectory;
use crate::domain::profile::{ProfileStats, ProfileSummary};
use crate::domain::social_graph::{
    Follow, FollowRequest, FollowRequestStatus, PendingFollowRequest, SocialUserEdge,
};
use crate::infra::db::Db;

const FOLLOWS_PKEY: &str = "follows_pkey";
const PENDING_REQUEST_KEY: &str = "follow_requests_pending_key";

const REQUEST_COLUMNS: &str =
    "id, sender_id, receiver_id, status::text AS status, created_at, resolved_at";

/// Owner of the follow edge set and the follow-request state machine.
///
/// Follower/following counts are never stored; [`SocialService::stats`]
/// aggregates them from `follows`, so they cannot drift from the edge set.
#[derive(Clone)]
pub struct SocialService {
    db: Db,
    profiles: ProfileDirectory,
}

impl SocialService {
    pub fn new(db: Db, profiles: ProfileDirectory) -> Self {
        Self { db, profiles }
    }

    pub async fn follow(&self, actor_id: Uuid, target_handle: &str) -> ServiceResult<Follow> {
        let target = self.profiles.resolve_by_handle(target_handle).await?;
        if target.id == actor_id {
            return Err(ServiceError::conflict("cannot follow yourself"));
        }

        let row = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) \
             VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING follower_id, followee_id, created_at",
        )
        .bind(actor_id)
        .bind(target.id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(follow_insert_error)?;

        let row = row.ok_or_else(|| ServiceError::conflict("already following"))?;
        debug!(follower_id = %actor_id, followee_id = %target.id, "follow edge created");

        Ok(Follow {
            follower_id: row.get("follower_id"),
            followee_id: row.get("followee_id"),
            created_at: row.get("created_at"),
        })
    }

    /// Removes the edge if present. Returns whether an edge was deleted.
    pub async fn unfollow(&self, actor_id: Uuid, target_handle: &str) -> ServiceResult<bool> {
        // A self-edge cannot exist, so unfollowing yourself is the no-edge case.
        let target = self.profiles.resolve_by_handle(target_handle).await?;
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(actor_id)
            .bind(target.id)
            .execute(self.db.pool())
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            debug!(follower_id = %actor_id, followee_id = %target.id, "follow edge removed");
        }
        Ok(removed)
    }

    pub async fn send_follow_request(
        &self,
        actor_id: Uuid,
        target_handle: &str,
    ) -> ServiceResult<FollowRequest> {
        let target = self.profiles.resolve_by_handle(target_handle).await?;
        if target.id == actor_id {
            return Err(ServiceError::conflict("cannot request to follow yourself"));
        }

        let already_following: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(actor_id)
        .bind(target.id)
        .fetch_one(self.db.pool())
        .await?;
        if already_following {
            return Err(ServiceError::conflict("already following"));
        }

        // The partial unique index admits one pending row per ordered pair.
        let query = format!(
            "INSERT INTO follow_requests (sender_id, receiver_id) \
             VALUES ($1, $2) \
             ON CONFLICT (sender_id, receiver_id) WHERE status = 'pending' DO NOTHING \
             RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(actor_id)
            .bind(target.id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(request_insert_error)?;

        match row {
            Some(row) => request_from_row(&row),
            None => Err(duplicate_request()),
        }
    }

    pub async fn list_pending_requests(
        &self,
        actor_id: Uuid,
    ) -> ServiceResult<Vec<PendingFollowRequest>> {
        let rows = sqlx::query(
            "SELECT r.id, r.created_at, u.id AS sender_id, u.handle, u.display_name, u.avatar_url \
             FROM follow_requests r \
             JOIN users u ON u.id = r.sender_id \
             WHERE r.receiver_id = $1 AND r.status = 'pending' \
             ORDER BY r.created_at ASC, r.id ASC",
        )
        .bind(actor_id)
        .fetch_all(self.db.pool())
        .await?;

        let items = rows
            .into_iter()
            .map(|row| PendingFollowRequest {
                id: row.get("id"),
                sender: ProfileSummary {
                    id: row.get("sender_id"),
                    handle: row.get("handle"),
                    display_name: row.get("display_name"),
                    avatar_url: row.get("avatar_url"),
                },
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(items)
    }

    /// Moves the pending request from `sender_handle` to `actor_id` into
    /// `accepted` and creates the edge sender → actor.
    pub async fn accept_follow_request(
        &self,
        actor_id: Uuid,
        sender_handle: &str,
    ) -> ServiceResult<FollowRequest> {
        self.resolve_request(actor_id, sender_handle, FollowRequestStatus::Accepted)
            .await
    }

    pub async fn reject_follow_request(
        &self,
        actor_id: Uuid,
        sender_handle: &str,
    ) -> ServiceResult<FollowRequest> {
        self.resolve_request(actor_id, sender_handle, FollowRequestStatus::Rejected)
            .await
    }

    async fn resolve_request(
        &self,
        actor_id: Uuid,
        sender_handle: &str,
        outcome: FollowRequestStatus,
    ) -> ServiceResult<FollowRequest> {
        debug_assert!(outcome.is_terminal());
        let sender = self.profiles.resolve_by_handle(sender_handle).await?;

        let mut tx = self.db.pool().begin().await?;

        // The row lock serializes concurrent accept/reject of the same request.
        let request_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM follow_requests \
             WHERE sender_id = $1 AND receiver_id = $2 AND status = 'pending' \
             FOR UPDATE",
        )
        .bind(sender.id)
        .bind(actor_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request_id) = request_id else {
            tx.rollback().await?;
            return Err(ServiceError::not_found("no pending follow request"));
        };

        let query = format!(
            "UPDATE follow_requests \
             SET status = $2::follow_request_status, resolved_at = now() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {REQUEST_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(request_id)
            .bind(outcome.as_db())
            .fetch_one(&mut *tx)
            .await?;
        let request = request_from_row(&row)?;

        if outcome == FollowRequestStatus::Accepted {
            sqlx::query(
                "INSERT INTO follows (follower_id, followee_id) \
                 VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(sender.id)
            .bind(actor_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            request_id = %request.id,
            sender_id = %sender.id,
            receiver_id = %actor_id,
            status = outcome.as_db(),
            "follow request resolved"
        );

        Ok(request)
    }

    pub async fn list_followers(
        &self,
        target_handle: &str,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> ServiceResult<Vec<SocialUserEdge>> {
        let target = self.profiles.resolve_by_handle(target_handle).await?;

        let rows = match cursor {
            Some((created_at, follower_id)) => {
                sqlx::query(
                    "SELECT u.id, u.handle, u.display_name, u.avatar_url, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.follower_id \
                     WHERE f.followee_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.follower_id < $3)) \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $4",
                )
                .bind(target.id)
                .bind(created_at)
                .bind(follower_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT u.id, u.handle, u.display_name, u.avatar_url, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.follower_id \
                     WHERE f.followee_id = $1 \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $2",
                )
                .bind(target.id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(edge_from_row).collect())
    }

    pub async fn list_following(
        &self,
        target_handle: &str,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> ServiceResult<Vec<SocialUserEdge>> {
        let target = self.profiles.resolve_by_handle(target_handle).await?;

        let rows = match cursor {
            Some((created_at, followee_id)) => {
                sqlx::query(
                    "SELECT u.id, u.handle, u.display_name, u.avatar_url, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.followee_id \
                     WHERE f.follower_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.followee_id < $3)) \
                     ORDER BY f.created_at DESC, f.followee_id DESC \
                     LIMIT $4",
                )
                .bind(target.id)
                .bind(created_at)
                .bind(followee_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT u.id, u.handle, u.display_name, u.avatar_url, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN users u ON u.id = f.followee_id \
                     WHERE f.follower_id = $1 \
                     ORDER BY f.created_at DESC, f.followee_id DESC \
                     LIMIT $2",
                )
                .bind(target.id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(edge_from_row).collect())
    }

    pub async fn followee_ids(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT followee_id FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(ids)
    }

    pub async fn stats(&self, user_id: Uuid) -> ServiceResult<ProfileStats> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM follows WHERE followee_id = $1) AS followers_count, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following_count",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ProfileStats {
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
        })
    }
}

fn duplicate_request() -> ServiceError {
    ServiceError::conflict_with_status("follow request already exists", FollowRequestStatus::Pending)
}

fn follow_insert_error(err: sqlx::Error) -> ServiceError {
    if is_unique_violation(&err, FOLLOWS_PKEY) {
        return ServiceError::conflict("already following");
    }
    ServiceError::from(err)
}

fn request_insert_error(err: sqlx::Error) -> ServiceError {
    if is_unique_violation(&err, PENDING_REQUEST_KEY) {
        return duplicate_request();
    }
    ServiceError::from(err)
}

fn edge_from_row(row: &PgRow) -> SocialUserEdge {
    SocialUserEdge {
        user: ProfileSummary {
            id: row.get("id"),
            handle: row.get("handle"),
            display_name: row.get("display_name"),
            avatar_url: row.get("avatar_url"),
        },
        followed_at: row.get("followed_at"),
    }
}

fn request_from_row(row: &PgRow) -> ServiceResult<FollowRequest> {
    let status: String = row.get("status");
    let status = FollowRequestStatus::from_db(&status).ok_or_else(|| {
        ServiceError::Store(sqlx::Error::Decode(
            format!("unknown follow request status: {}", status).into(),
        ))
    })?;

    Ok(FollowRequest {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        status,
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    })
}
