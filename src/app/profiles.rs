use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::app::error::{is_unique_violation, ServiceError, ServiceResult};
use crate::domain::profile::{Profile, ProfileChanges};
use crate::infra::{cache::RedisCache, db::Db};

const PROFILE_COLUMNS: &str = "id, handle, display_name, bio, avatar_url, created_at";

fn cache_key(handle: &str) -> String {
    format!("profile:handle:{}", handle)
}

fn profile_from_row(row: &PgRow) -> Profile {
    Profile {
        id: row.get("id"),
        handle: row.get("handle"),
        display_name: row.get("display_name"),
        bio: row.get("bio"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
    }
}

/// Handle → identity lookups, with cache-aside on the handle.
///
/// Handles can change, so every profile write invalidates both the old and
/// the new handle's cache entry.
#[derive(Clone)]
pub struct ProfileDirectory {
    db: Db,
    cache: RedisCache,
    cache_ttl_seconds: u64,
}

impl ProfileDirectory {
    pub fn new(db: Db, cache: RedisCache, cache_ttl_seconds: u64) -> Self {
        Self {
            db,
            cache,
            cache_ttl_seconds,
        }
    }

    pub async fn resolve_by_handle(&self, handle: &str) -> ServiceResult<Profile> {
        let key = cache_key(handle);
        if let Some(profile) = self.cache.get_json::<Profile>(&key).await {
            return Ok(profile);
        }

        let query = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE handle = $1");
        let row = sqlx::query(&query)
            .bind(handle)
            .fetch_optional(self.db.pool())
            .await?;

        let profile = row
            .as_ref()
            .map(profile_from_row)
            .ok_or_else(|| ServiceError::not_found("user not found"))?;

        self.cache
            .set_json(&key, &profile, self.cache_ttl_seconds)
            .await;

        Ok(profile)
    }

    pub async fn get_by_id(&self, user_id: Uuid) -> ServiceResult<Profile> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref()
            .map(profile_from_row)
            .ok_or_else(|| ServiceError::not_found("user not found"))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> ServiceResult<Profile> {
        let previous = self.get_by_id(user_id).await?;

        let query = format!(
            "UPDATE users \
             SET handle = COALESCE($2, handle), \
                 display_name = COALESCE($3, display_name), \
                 bio = COALESCE($4, bio), \
                 avatar_url = COALESCE($5, avatar_url) \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(changes.handle)
            .bind(changes.display_name)
            .bind(changes.bio)
            .bind(changes.avatar_url)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|err| {
                if is_unique_violation(&err, "users_handle_key") {
                    return ServiceError::conflict("handle already taken");
                }
                ServiceError::from(err)
            })?;

        let updated = row
            .as_ref()
            .map(profile_from_row)
            .ok_or_else(|| ServiceError::not_found("user not found"))?;

        let mut stale = vec![cache_key(&previous.handle)];
        if updated.handle != previous.handle {
            stale.push(cache_key(&updated.handle));
        }
        self.cache.delete(&stale).await;
        debug!(user_id = %user_id, handle = %updated.handle, "profile updated, cache invalidated");

        Ok(updated)
    }
}
